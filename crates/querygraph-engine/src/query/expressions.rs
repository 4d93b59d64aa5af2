//! Value expressions and the render context they write into.
//!
//! Anything that can stand where a property would (a projection, a
//! group or order item, either side of a restriction) is an [`Operand`]. The
//! open extension point is [`ValueExpression`]: an expression renders its
//! text against a [`RenderContext`], pushing bound values into the context's
//! ordered [`ParameterList`] as it goes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use querygraph_core::{ParameterStyle, QueryError, QueryResult};

use super::graph::{NodeId, QueryGraph};
use crate::value::Value;

/// A bound parameter of a compiled query.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Parameter {
    /// The parameter name: the user-given name for named parameters,
    /// `p1`, `p2`, ... otherwise.
    pub name: String,
    /// The bound value.
    pub value: Value,
}

/// Parameters in the order their placeholders appear in the text.
#[derive(Debug, Clone)]
pub struct ParameterList {
    style: ParameterStyle,
    entries: Vec<Parameter>,
    user_named: Vec<bool>,
    reserved: HashSet<String>,
    next_generated: usize,
}

impl ParameterList {
    /// Creates an empty list using the given placeholder style.
    pub fn new(style: ParameterStyle) -> Self {
        Self::with_reserved(style, std::iter::empty::<String>())
    }

    /// Creates an empty list whose generated names avoid `reserved`, the
    /// names user parameters may take.
    pub fn with_reserved<I, S>(style: ParameterStyle, reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            style,
            entries: Vec::new(),
            user_named: Vec::new(),
            reserved: reserved.into_iter().map(Into::into).collect(),
            next_generated: 1,
        }
    }

    /// Appends a parameter and returns its placeholder text.
    ///
    /// With [`ParameterStyle::Named`], a user-named parameter that is already
    /// in the list is referenced again instead of being bound twice. Values
    /// without a name get `p1`, `p2`, ..., skipping reserved names and names
    /// already in the list.
    pub fn push(&mut self, name: Option<&str>, value: Value) -> String {
        let position = self.entries.len() + 1;
        let user_named = name.is_some();
        let name = match name {
            Some(name) => name.to_string(),
            None => self.generate_name(),
        };
        let placeholder = match self.style {
            ParameterStyle::Positional => "?".to_string(),
            ParameterStyle::Numbered => format!("?{position}"),
            ParameterStyle::Named => {
                let placeholder = format!(":{name}");
                let bound = self
                    .entries
                    .iter()
                    .zip(&self.user_named)
                    .any(|(p, named)| *named && p.name == name);
                if user_named && bound {
                    return placeholder;
                }
                placeholder
            }
        };
        self.entries.push(Parameter { name, value });
        self.user_named.push(user_named);
        placeholder
    }

    fn generate_name(&mut self) -> String {
        loop {
            let candidate = format!("p{}", self.next_generated);
            self.next_generated += 1;
            if !self.reserved.contains(&candidate)
                && !self.entries.iter().any(|p| p.name == candidate)
            {
                return candidate;
            }
        }
    }

    /// Number of bound parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the list.
    pub fn into_vec(self) -> Vec<Parameter> {
        self.entries
    }
}

/// Everything an expression needs while rendering.
#[derive(Debug)]
pub struct RenderContext<'a> {
    graph: &'a QueryGraph,
    bindings: &'a HashMap<String, Value>,
    parameters: ParameterList,
}

impl<'a> RenderContext<'a> {
    /// Creates a context over a graph and the late-bound named parameters.
    pub fn new(
        graph: &'a QueryGraph,
        bindings: &'a HashMap<String, Value>,
        style: ParameterStyle,
    ) -> Self {
        Self {
            graph,
            bindings,
            parameters: ParameterList::with_reserved(style, bindings.keys().cloned()),
        }
    }

    /// The query graph being rendered.
    pub const fn graph(&self) -> &'a QueryGraph {
        self.graph
    }

    /// The text that refers to `node`.
    pub fn reference(&self, node: NodeId) -> String {
        self.graph.reference(node)
    }

    /// Binds a literal value and returns its placeholder.
    pub fn bind_value(&mut self, value: Value) -> String {
        self.parameters.push(None, value)
    }

    /// Binds a named parameter and returns its placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnboundParameter`] if no value was set for `name`.
    pub fn bind_named(&mut self, name: &str) -> QueryResult<String> {
        let value = self
            .bindings
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::UnboundParameter(name.to_string()))?;
        Ok(self.parameters.push(Some(name), value))
    }

    /// The value an operand stands for, if it is a literal or a named
    /// parameter. Unbound parameters resolve to [`Value::Null`].
    pub fn resolve(&self, operand: &Operand) -> Option<Value> {
        match operand {
            Operand::Value(v) => Some(v.clone()),
            Operand::Parameter(name) => Some(self.bindings.get(name).cloned().unwrap_or(Value::Null)),
            Operand::Node(_) | Operand::Expression(_) => None,
        }
    }

    /// Renders an operand, binding any value it carries.
    ///
    /// # Errors
    ///
    /// Propagates [`QueryError::UnboundParameter`] and expression errors.
    pub fn render_operand(&mut self, operand: &Operand) -> QueryResult<String> {
        match operand {
            Operand::Node(node) => Ok(self.reference(*node)),
            Operand::Value(value) => Ok(self.bind_value(value.clone())),
            Operand::Parameter(name) => self.bind_named(name),
            Operand::Expression(expr) => expr.render(self),
        }
    }

    /// Parameters bound so far.
    pub const fn parameters(&self) -> &ParameterList {
        &self.parameters
    }

    /// Consumes the context, returning the ordered parameters.
    pub fn into_parameters(self) -> Vec<Parameter> {
        self.parameters.into_vec()
    }
}

/// A renderable value expression.
///
/// # Examples
///
/// ```
/// use querygraph_engine::query::expressions::{RenderContext, ValueExpression};
/// use querygraph_engine::query::graph::QueryGraph;
/// use querygraph_core::{ParameterStyle, QueryResult};
///
/// #[derive(Debug)]
/// struct CurrentDate;
///
/// impl ValueExpression for CurrentDate {
///     fn render(&self, _ctx: &mut RenderContext<'_>) -> QueryResult<String> {
///         Ok("current_date()".to_string())
///     }
/// }
///
/// let graph = QueryGraph::new();
/// let bindings = Default::default();
/// let mut ctx = RenderContext::new(&graph, &bindings, ParameterStyle::Positional);
/// assert_eq!(CurrentDate.render(&mut ctx).unwrap(), "current_date()");
/// ```
pub trait ValueExpression: fmt::Debug {
    /// Renders the expression text, binding parameters into `ctx` in text order.
    fn render(&self, ctx: &mut RenderContext<'_>) -> QueryResult<String>;
}

/// One side of a restriction, a projection, or a group/order item.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A captured query node.
    Node(NodeId),
    /// A literal, bound as a parameter.
    Value(Value),
    /// A named parameter bound later with `set_parameter`.
    Parameter(String),
    /// An arbitrary expression.
    Expression(Rc<dyn ValueExpression>),
}

impl Operand {
    /// A literal operand.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// A named parameter operand.
    pub fn parameter(name: impl Into<String>) -> Self {
        Self::Parameter(name.into())
    }

    /// An expression operand.
    pub fn expression(expr: impl ValueExpression + 'static) -> Self {
        Self::Expression(Rc::new(expr))
    }

    /// The node behind the operand, if any.
    pub const fn node(&self) -> Option<NodeId> {
        match self {
            Self::Node(node) => Some(*node),
            _ => None,
        }
    }
}

// ── Aggregates ──────────────────────────────────────────────────────────

/// Aggregate functions available in projections and expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    /// `count`.
    Count,
    /// `sum`.
    Sum,
    /// `avg`.
    Avg,
    /// `min`.
    Min,
    /// `max`.
    Max,
}

impl AggregateFunc {
    /// Returns the function name as written in query text.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// An aggregate over one operand, e.g. `count(distinct hobj1)`.
#[derive(Debug, Clone)]
pub struct Aggregate {
    func: AggregateFunc,
    distinct: bool,
    operand: Operand,
}

impl Aggregate {
    /// Creates an aggregate.
    pub const fn new(func: AggregateFunc, operand: Operand) -> Self {
        Self {
            func,
            distinct: false,
            operand,
        }
    }

    /// Aggregates distinct values only.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

impl ValueExpression for Aggregate {
    fn render(&self, ctx: &mut RenderContext<'_>) -> QueryResult<String> {
        let inner = ctx.render_operand(&self.operand)?;
        let distinct = if self.distinct { "distinct " } else { "" };
        Ok(format!("{}({distinct}{inner})", self.func.name()))
    }
}

// ── Functions, literals and raw text ────────────────────────────────────

/// A function call, e.g. `upper(hobj1.name)`.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    args: Vec<Operand>,
}

impl Function {
    /// Creates a call of `name` over `args`.
    pub fn new(name: impl Into<String>, args: Vec<Operand>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl ValueExpression for Function {
    fn render(&self, ctx: &mut RenderContext<'_>) -> QueryResult<String> {
        let args = self
            .args
            .iter()
            .map(|arg| ctx.render_operand(arg))
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(format!("{}({})", self.name, args.join(", ")))
    }
}

/// A literal value rendered as a bound parameter.
#[derive(Debug, Clone)]
pub struct Literal(pub Value);

impl ValueExpression for Literal {
    fn render(&self, ctx: &mut RenderContext<'_>) -> QueryResult<String> {
        Ok(ctx.bind_value(self.0.clone()))
    }
}

/// Raw query text. Each `?` in the text is replaced, in order, by the
/// placeholder of the corresponding value.
#[derive(Debug, Clone)]
pub struct Raw {
    text: String,
    params: Vec<Value>,
}

impl Raw {
    /// Creates raw text without parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Adds a value for the next `?` marker.
    #[must_use]
    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

impl ValueExpression for Raw {
    fn render(&self, ctx: &mut RenderContext<'_>) -> QueryResult<String> {
        let markers = self.text.matches('?').count();
        if markers != self.params.len() {
            return Err(QueryError::InvalidQuery(format!(
                "Raw expression '{}' has {markers} markers but {} values",
                self.text,
                self.params.len()
            )));
        }
        let mut out = String::with_capacity(self.text.len());
        let mut values = self.params.iter();
        for ch in self.text.chars() {
            if ch != '?' {
                out.push(ch);
            } else if let Some(value) = values.next() {
                out.push_str(&ctx.bind_value(value.clone()));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::alias::AliasProvider;
    use crate::query::scope::ScopeId;

    fn graph() -> (QueryGraph, NodeId) {
        let mut graph = QueryGraph::new();
        let mut aliases = AliasProvider::new("hobj");
        let root = graph.add_root("Person", aliases.next_alias(), ScopeId::ROOT);
        (graph, root)
    }

    // ── Parameter styles ────────────────────────────────────────────

    #[test]
    fn test_positional_placeholders() {
        let mut list = ParameterList::new(ParameterStyle::Positional);
        assert_eq!(list.push(None, Value::Int(1)), "?");
        assert_eq!(list.push(Some("name"), Value::from("x")), "?");
        let params = list.into_vec();
        assert_eq!(params[0].name, "p1");
        assert_eq!(params[1].name, "name");
    }

    #[test]
    fn test_numbered_placeholders() {
        let mut list = ParameterList::new(ParameterStyle::Numbered);
        assert_eq!(list.push(None, Value::Int(1)), "?1");
        assert_eq!(list.push(None, Value::Int(2)), "?2");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_generated_names_skip_reserved_names() {
        let mut list = ParameterList::with_reserved(ParameterStyle::Named, ["p1"]);
        assert_eq!(list.push(None, Value::Int(30)), ":p2");
        assert_eq!(list.push(Some("p1"), Value::from("Alice")), ":p1");
        assert_eq!(list.push(None, Value::Int(40)), ":p3");
        let params = list.into_vec();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].value, Value::Int(30));
        assert_eq!(params[1].value, Value::from("Alice"));
    }

    #[test]
    fn test_named_placeholders_reuse_user_names() {
        let mut list = ParameterList::new(ParameterStyle::Named);
        assert_eq!(list.push(None, Value::Int(1)), ":p1");
        assert_eq!(list.push(Some("town"), Value::from("Paris")), ":town");
        assert_eq!(list.push(Some("town"), Value::from("Paris")), ":town");
        assert_eq!(list.len(), 2);
    }

    // ── Render context ──────────────────────────────────────────────

    #[test]
    fn test_unbound_parameter_fails() {
        let (graph, _) = graph();
        let bindings = HashMap::new();
        let mut ctx = RenderContext::new(&graph, &bindings, ParameterStyle::Positional);
        assert_eq!(
            ctx.render_operand(&Operand::parameter("missing")).unwrap_err(),
            QueryError::UnboundParameter("missing".to_string())
        );
        assert_eq!(ctx.resolve(&Operand::parameter("missing")), Some(Value::Null));
    }

    #[test]
    fn test_render_operands_in_order() {
        let (graph, root) = graph();
        let mut bindings = HashMap::new();
        bindings.insert("n".to_string(), Value::Int(3));
        let mut ctx = RenderContext::new(&graph, &bindings, ParameterStyle::Numbered);
        assert_eq!(ctx.render_operand(&Operand::Node(root)).unwrap(), "hobj1");
        assert_eq!(ctx.render_operand(&Operand::value("a")).unwrap(), "?1");
        assert_eq!(ctx.render_operand(&Operand::parameter("n")).unwrap(), "?2");
        let params = ctx.into_parameters();
        assert_eq!(params[0].value, Value::from("a"));
        assert_eq!(params[1], Parameter { name: "n".into(), value: Value::Int(3) });
    }

    // ── Expressions ─────────────────────────────────────────────────

    #[test]
    fn test_function_and_aggregate() {
        let (graph, root) = graph();
        let bindings = HashMap::new();
        let mut ctx = RenderContext::new(&graph, &bindings, ParameterStyle::Positional);

        let upper = Function::new("concat", vec![Operand::Node(root), Operand::value("!")]);
        assert_eq!(upper.render(&mut ctx).unwrap(), "concat(hobj1, ?)");

        let count = Aggregate::new(AggregateFunc::Count, Operand::Node(root)).distinct();
        assert_eq!(count.render(&mut ctx).unwrap(), "count(distinct hobj1)");
        assert_eq!(ctx.parameters().len(), 1);
    }

    #[test]
    fn test_raw_binds_markers() {
        let (graph, _) = graph();
        let bindings = HashMap::new();
        let mut ctx = RenderContext::new(&graph, &bindings, ParameterStyle::Numbered);
        let raw = Raw::new("mod(?, ?)").param(10).param(3);
        assert_eq!(raw.render(&mut ctx).unwrap(), "mod(?1, ?2)");
        assert_eq!(Literal(Value::Bool(true)).render(&mut ctx).unwrap(), "?3");
    }

    #[test]
    fn test_raw_marker_mismatch() {
        let (graph, _) = graph();
        let bindings = HashMap::new();
        let mut ctx = RenderContext::new(&graph, &bindings, ParameterStyle::Positional);
        assert!(matches!(
            Raw::new("abs(?)").render(&mut ctx),
            Err(QueryError::InvalidQuery(_))
        ));
    }
}
