//! Restriction trees for `where` and `with` clauses.
//!
//! A [`RestrictionClause`] pairs a [`Restriction`] with an [`Applicability`]
//! predicate. Applicability is evaluated at compile time against the literal
//! and named-parameter values the restriction carries; a clause that does
//! not apply is dropped from the output together with its parameters.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::expressions::Operand;
use super::scope::ScopeId;
use crate::value::Value;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `like`
    Like,
    /// `not like`
    NotLike,
}

impl Comparison {
    /// Returns the operator text.
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "like",
            Self::NotLike => "not like",
        }
    }
}

/// How the members of a group are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    /// All members must hold.
    And,
    /// Any member may hold.
    Or,
}

impl Junction {
    /// Returns the separator placed between members.
    pub const fn separator(self) -> &'static str {
        match self {
            Self::And => " and ",
            Self::Or => " or ",
        }
    }
}

/// Decides at compile time whether a restriction is emitted.
#[derive(Clone, Default)]
pub enum Applicability {
    /// Always emitted.
    #[default]
    Always,
    /// Emitted when every value is non-null.
    NotNull,
    /// Emitted when every value is non-null and non-empty.
    NotEmpty,
    /// Emitted when the predicate accepts every value.
    Custom(Rc<dyn Fn(&Value) -> bool>),
}

impl Applicability {
    /// Wraps a predicate.
    pub fn custom(predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        Self::Custom(Rc::new(predicate))
    }

    /// Tests one value.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Always => true,
            Self::NotNull => !value.is_null(),
            Self::NotEmpty => !value.is_empty(),
            Self::Custom(predicate) => predicate(value),
        }
    }

    /// Returns `true` for [`Applicability::Always`].
    pub const fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }
}

impl fmt::Debug for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::NotNull => f.write_str("NotNull"),
            Self::NotEmpty => f.write_str("NotEmpty"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One restriction.
#[derive(Debug, Clone)]
pub enum Restriction {
    /// `left op right`.
    Compare {
        /// Left operand.
        left: Operand,
        /// Operator.
        op: Comparison,
        /// Right operand.
        right: Operand,
    },
    /// `operand between low and high`.
    Between {
        /// Tested operand.
        operand: Operand,
        /// Lower bound.
        low: Operand,
        /// Upper bound.
        high: Operand,
    },
    /// `operand [not] in (v1, v2, ...)`.
    In {
        /// Tested operand.
        operand: Operand,
        /// Candidate values.
        values: Vec<Operand>,
        /// `not in` when set.
        negated: bool,
    },
    /// `operand [not] in (sub-query)`.
    InSubquery {
        /// Tested operand.
        operand: Operand,
        /// The sub-query scope.
        subquery: ScopeId,
        /// `not in` when set.
        negated: bool,
    },
    /// `[not] exists (sub-query)`.
    Exists {
        /// The sub-query scope.
        subquery: ScopeId,
        /// `not exists` when set.
        negated: bool,
    },
    /// `operand is [not] null`.
    Null {
        /// Tested operand.
        operand: Operand,
        /// `is not null` when set.
        negated: bool,
    },
    /// A parenthesized group.
    Group {
        /// How members combine.
        junction: Junction,
        /// Group members.
        members: Vec<RestrictionClause>,
    },
}

/// A restriction plus the predicate deciding whether it is emitted.
#[derive(Debug, Clone)]
pub struct RestrictionClause {
    /// The restriction.
    pub restriction: Restriction,
    /// When to emit it.
    pub applicability: Applicability,
}

impl RestrictionClause {
    /// A clause that is always emitted.
    pub fn new(restriction: Restriction) -> Self {
        Self {
            restriction,
            applicability: Applicability::Always,
        }
    }

    /// A clause emitted under `applicability`.
    pub const fn when(restriction: Restriction, applicability: Applicability) -> Self {
        Self {
            restriction,
            applicability,
        }
    }

    /// Whether the clause is emitted given the bound named parameters.
    ///
    /// The values tested are the right-hand side of a comparison, both
    /// bounds of a `between`, and the candidate list of an `in`. Groups
    /// apply when any member applies. Restrictions without literal or
    /// parameter values (sub-queries, null checks) always apply.
    pub fn applies(&self, bindings: &HashMap<String, Value>) -> bool {
        if let Restriction::Group { members, .. } = &self.restriction {
            return members.iter().any(|m| m.applies(bindings));
        }
        if self.applicability.is_always() {
            return true;
        }
        self.checked_values(bindings)
            .iter()
            .all(|v| self.applicability.accepts(v))
    }

    fn checked_values(&self, bindings: &HashMap<String, Value>) -> Vec<Value> {
        let resolve = |operand: &Operand| match operand {
            Operand::Value(v) => Some(v.clone()),
            Operand::Parameter(name) => Some(bindings.get(name).cloned().unwrap_or(Value::Null)),
            Operand::Node(_) | Operand::Expression(_) => None,
        };
        match &self.restriction {
            Restriction::Compare { right, .. } => resolve(right).into_iter().collect(),
            Restriction::Between { low, high, .. } => {
                [low, high].into_iter().filter_map(resolve).collect()
            }
            Restriction::In { values, .. } => {
                vec![Value::List(values.iter().filter_map(resolve).collect())]
            }
            Restriction::InSubquery { .. }
            | Restriction::Exists { .. }
            | Restriction::Null { .. }
            | Restriction::Group { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(right: Operand, applicability: Applicability) -> RestrictionClause {
        RestrictionClause::when(
            Restriction::Compare {
                left: Operand::Value(Value::Int(0)),
                op: Comparison::Eq,
                right,
            },
            applicability,
        )
    }

    #[test]
    fn test_symbols() {
        assert_eq!(Comparison::Ne.symbol(), "<>");
        assert_eq!(Comparison::NotLike.symbol(), "not like");
        assert_eq!(Junction::Or.separator(), " or ");
    }

    #[test]
    fn test_not_null_applicability() {
        let bindings = HashMap::new();
        assert!(!compare(Operand::Value(Value::Null), Applicability::NotNull).applies(&bindings));
        assert!(compare(Operand::value(""), Applicability::NotNull).applies(&bindings));
        assert!(!compare(Operand::value(""), Applicability::NotEmpty).applies(&bindings));
    }

    #[test]
    fn test_unbound_parameter_counts_as_null() {
        let mut bindings = HashMap::new();
        let clause = compare(Operand::parameter("name"), Applicability::NotNull);
        assert!(!clause.applies(&bindings));
        bindings.insert("name".to_string(), Value::from("Paris"));
        assert!(clause.applies(&bindings));
    }

    #[test]
    fn test_custom_applicability() {
        let positive = Applicability::custom(|v| matches!(v, Value::Int(i) if *i > 0));
        let bindings = HashMap::new();
        assert!(compare(Operand::value(5), positive.clone()).applies(&bindings));
        let clause = RestrictionClause::when(
            Restriction::Compare {
                left: Operand::value(5),
                op: Comparison::Eq,
                right: Operand::value(-1),
            },
            positive,
        );
        assert!(!clause.applies(&bindings));
    }

    #[test]
    fn test_in_list_not_empty() {
        let bindings = HashMap::new();
        let empty = RestrictionClause::when(
            Restriction::In {
                operand: Operand::value(1),
                values: Vec::new(),
                negated: false,
            },
            Applicability::NotEmpty,
        );
        assert!(!empty.applies(&bindings));
    }

    #[test]
    fn test_group_applies_if_any_member_applies() {
        let bindings = HashMap::new();
        let group = RestrictionClause::new(Restriction::Group {
            junction: Junction::Or,
            members: vec![
                compare(Operand::Value(Value::Null), Applicability::NotNull),
                compare(Operand::value(1), Applicability::NotNull),
            ],
        });
        assert!(group.applies(&bindings));
        let none = RestrictionClause::new(Restriction::Group {
            junction: Junction::And,
            members: vec![compare(Operand::Value(Value::Null), Applicability::NotNull)],
        });
        assert!(!none.applies(&bindings));
    }

    #[test]
    fn test_applicability_debug() {
        assert_eq!(format!("{:?}", Applicability::custom(|_| true)), "Custom(..)");
    }
}
