//! Compiles a query graph and its clauses into text plus ordered parameters.
//!
//! Sections are rendered in text order (`select`, `from` with its joins and
//! their `with` clauses, `where`, `group by`, `order by`), and sub-queries
//! are rendered inline where they are referenced, so the parameter list
//! always matches the order of placeholders in the final text.

use std::collections::HashMap;
use std::fmt;

use querygraph_core::{ParameterStyle, QueryError, QueryResult};

use super::clauses::{Clauses, Projection};
use super::expressions::{Aggregate, AggregateFunc, Operand, Parameter, RenderContext, ValueExpression};
use super::graph::{NodeId, NodeKind, QueryGraph};
use super::restrictions::{Restriction, RestrictionClause};
use super::scope::{ScopeId, ScopeTracker};
use crate::metadata::Metadata;
use crate::value::Value;

/// What each result row of a compiled query holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// One entity of the named type.
    Entity(String),
    /// One scalar of the named type.
    Scalar(String),
    /// A tuple of the given arity.
    Tuple(usize),
}

/// The output of compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// `select ...`, or empty.
    pub select: String,
    /// `from ...` with its joins.
    pub from: String,
    /// `where ...`, or empty.
    pub where_clause: String,
    /// `group by ...`, or empty.
    pub group_by: String,
    /// `order by ...`, or empty.
    pub order_by: String,
    /// Parameters in placeholder order.
    pub parameters: Vec<Parameter>,
    /// The row shape, when it can be determined from the projections.
    pub result_shape: Option<ResultShape>,
}

impl CompiledQuery {
    /// The full query text: non-empty sections joined by single spaces.
    pub fn text(&self) -> String {
        join_sections(&[
            &self.select,
            &self.from,
            &self.where_clause,
            &self.group_by,
            &self.order_by,
        ])
    }

    /// The parameter values in placeholder order.
    pub fn values(&self) -> Vec<Value> {
        self.parameters.iter().map(|p| p.value.clone()).collect()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn join_sections(sections: &[&str]) -> String {
    sections
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
struct Sections {
    select: String,
    from: String,
    where_clause: String,
    group_by: String,
    order_by: String,
}

impl Sections {
    fn text(&self) -> String {
        join_sections(&[
            &self.select,
            &self.from,
            &self.where_clause,
            &self.group_by,
            &self.order_by,
        ])
    }
}

/// Renders a query graph, scope by scope.
pub struct QueryCompiler<'a> {
    graph: &'a QueryGraph,
    scopes: &'a ScopeTracker,
    clauses: &'a [Clauses],
    metadata: &'a dyn Metadata,
    bindings: &'a HashMap<String, Value>,
    style: ParameterStyle,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler. `clauses` is indexed by scope.
    pub fn new(
        graph: &'a QueryGraph,
        scopes: &'a ScopeTracker,
        clauses: &'a [Clauses],
        metadata: &'a dyn Metadata,
        bindings: &'a HashMap<String, Value>,
        style: ParameterStyle,
    ) -> Self {
        Self {
            graph,
            scopes,
            clauses,
            metadata,
            bindings,
            style,
        }
    }

    /// Compiles the outermost scope.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::JoinTypeRequired`] for implicit joins off an
    /// enclosing query's nodes, [`QueryError::UnboundParameter`] for
    /// unconditional restrictions on unbound parameters, and
    /// [`QueryError::InvalidQuery`] for scopes without a `from` entry.
    pub fn compile(&self) -> QueryResult<CompiledQuery> {
        let mut ctx = RenderContext::new(self.graph, self.bindings, self.style);
        let sections = self.compile_scope(ScopeId::ROOT, &mut ctx)?;
        let compiled = CompiledQuery {
            select: sections.select,
            from: sections.from,
            where_clause: sections.where_clause,
            group_by: sections.group_by,
            order_by: sections.order_by,
            parameters: ctx.into_parameters(),
            result_shape: self.result_shape(ScopeId::ROOT),
        };
        tracing::debug!(
            parameters = compiled.parameters.len(),
            "Compiled query: {}",
            compiled.text()
        );
        Ok(compiled)
    }

    fn clauses(&self, scope: ScopeId) -> QueryResult<&'a Clauses> {
        self.clauses
            .get(scope.index())
            .ok_or_else(|| QueryError::InvalidQuery(format!("unknown scope {}", scope.index())))
    }

    fn compile_scope(&self, scope: ScopeId, ctx: &mut RenderContext<'_>) -> QueryResult<Sections> {
        let clauses = self.clauses(scope)?;
        let select = self.render_select(scope, clauses, ctx)?;
        let from = self.render_from(scope, clauses, ctx)?;
        let where_clause = self
            .render_conjunction(&clauses.restrictions, ctx)?
            .map(|w| format!("where {w}"))
            .unwrap_or_default();

        let group_by = if clauses.group_by.is_empty() {
            String::new()
        } else {
            let items = clauses
                .group_by
                .iter()
                .map(|item| ctx.render_operand(item))
                .collect::<QueryResult<Vec<_>>>()?;
            format!("group by {}", items.join(", "))
        };

        let order_by = if clauses.order_by.is_empty() {
            String::new()
        } else {
            let items = clauses
                .order_by
                .iter()
                .map(|item| {
                    ctx.render_operand(&item.operand)
                        .map(|text| format!("{text} {}", item.direction.keyword()))
                })
                .collect::<QueryResult<Vec<_>>>()?;
            format!("order by {}", items.join(", "))
        };

        Ok(Sections {
            select,
            from,
            where_clause,
            group_by,
            order_by,
        })
    }

    // ── select ──────────────────────────────────────────────────────

    fn render_select(
        &self,
        scope: ScopeId,
        clauses: &Clauses,
        ctx: &mut RenderContext<'_>,
    ) -> QueryResult<String> {
        let distinct = if clauses.distinct { "distinct " } else { "" };
        if clauses.projections.is_empty() {
            if !clauses.distinct {
                return Ok(String::new());
            }
            let roots: Vec<String> = self
                .scopes
                .scope(scope)
                .roots()
                .iter()
                .map(|root| self.graph.reference(*root))
                .collect();
            return Ok(format!("select distinct {}", roots.join(", ")));
        }
        let items = clauses
            .projections
            .iter()
            .map(|projection| match projection {
                Projection::Node(node) => Ok(self.graph.reference(*node)),
                Projection::Aggregate {
                    func,
                    distinct,
                    node,
                } => {
                    let aggregate = Aggregate::new(*func, Operand::Node(*node));
                    let aggregate = if *distinct { aggregate.distinct() } else { aggregate };
                    aggregate.render(ctx)
                }
                Projection::Expression(operand) => ctx.render_operand(operand),
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(format!("select {distinct}{}", items.join(", ")))
    }

    // ── from ────────────────────────────────────────────────────────

    fn render_from(
        &self,
        scope: ScopeId,
        clauses: &Clauses,
        ctx: &mut RenderContext<'_>,
    ) -> QueryResult<String> {
        let data = self.scopes.scope(scope);
        if data.roots().is_empty() {
            return Err(QueryError::InvalidQuery(
                "a query needs at least one from entry".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(data.roots().len());
        for root in data.roots() {
            let type_name = self.graph.node(*root).target_type();
            let entity_name = self
                .metadata
                .entity_name(type_name)
                .ok_or_else(|| QueryError::UnknownEntity(type_name.to_string()))?;
            let mut entry = format!("{entity_name} {}", self.graph.reference(*root));
            for node in self.graph.depth_first(*root).into_iter().skip(1) {
                if let Some(join) = self.render_join(scope, node, clauses, ctx)? {
                    entry.push(' ');
                    entry.push_str(&join);
                }
            }
            entries.push(entry);
        }

        let mut from = format!("from {}", entries.join(", "));
        for attached in data.attached() {
            for node in self.graph.depth_first(*attached) {
                if let Some(join) = self.render_join(scope, node, clauses, ctx)? {
                    from.push(' ');
                    from.push_str(&join);
                }
            }
        }
        Ok(from)
    }

    fn render_join(
        &self,
        scope: ScopeId,
        id: NodeId,
        clauses: &Clauses,
        ctx: &mut RenderContext<'_>,
    ) -> QueryResult<Option<String>> {
        let node = self.graph.node(id);
        if node.scope() != scope || node.kind() == NodeKind::Root || !self.graph.owns_alias(id) {
            return Ok(None);
        }
        if let Some(parent) = node.parent() {
            let owner = self.graph.nearest_entity(parent);
            if self.graph.node(owner).scope() != scope && node.explicit_join_type().is_none() {
                return Err(QueryError::JoinTypeRequired {
                    path: self.graph.describe(id),
                });
            }
        }
        let Some(keyword) = self.graph.resolve_join_type(id).keyword() else {
            return Ok(None);
        };
        let mut text = format!(
            "{keyword} {} {}",
            self.graph.join_path(id),
            self.graph.reference(id)
        );
        if let Some(condition) = self.render_conjunction(clauses.conditions_for(id), ctx)? {
            text.push_str(" with ");
            text.push_str(&condition);
        }
        Ok(Some(text))
    }

    // ── restrictions ────────────────────────────────────────────────

    fn render_conjunction(
        &self,
        restrictions: &[RestrictionClause],
        ctx: &mut RenderContext<'_>,
    ) -> QueryResult<Option<String>> {
        let mut parts = Vec::new();
        for clause in restrictions {
            if clause.applies(self.bindings) {
                parts.push(self.render_restriction(&clause.restriction, ctx)?);
            } else {
                tracing::trace!("Skipping inapplicable restriction {:?}", clause.restriction);
            }
        }
        Ok((!parts.is_empty()).then(|| parts.join(" and ")))
    }

    fn render_restriction(
        &self,
        restriction: &Restriction,
        ctx: &mut RenderContext<'_>,
    ) -> QueryResult<String> {
        match restriction {
            Restriction::Compare { left, op, right } => {
                let left = ctx.render_operand(left)?;
                let right = ctx.render_operand(right)?;
                Ok(format!("{left} {} {right}", op.symbol()))
            }
            Restriction::Between { operand, low, high } => {
                let operand = ctx.render_operand(operand)?;
                let low = ctx.render_operand(low)?;
                let high = ctx.render_operand(high)?;
                Ok(format!("{operand} between {low} and {high}"))
            }
            Restriction::In {
                values, negated, ..
            } if values.is_empty() => Ok(if *negated { "1=1" } else { "1=0" }.to_string()),
            Restriction::In {
                operand,
                values,
                negated,
            } => {
                let operand = ctx.render_operand(operand)?;
                let values = values
                    .iter()
                    .map(|v| ctx.render_operand(v))
                    .collect::<QueryResult<Vec<_>>>()?;
                let keyword = if *negated { "not in" } else { "in" };
                Ok(format!("{operand} {keyword} ({})", values.join(", ")))
            }
            Restriction::InSubquery {
                operand,
                subquery,
                negated,
            } => {
                let operand = ctx.render_operand(operand)?;
                let sub = self.compile_scope(*subquery, ctx)?.text();
                let keyword = if *negated { "not in" } else { "in" };
                Ok(format!("{operand} {keyword} ({sub})"))
            }
            Restriction::Exists { subquery, negated } => {
                let sub = self.compile_scope(*subquery, ctx)?.text();
                let keyword = if *negated { "not exists" } else { "exists" };
                Ok(format!("{keyword} ({sub})"))
            }
            Restriction::Null { operand, negated } => {
                let operand = ctx.render_operand(operand)?;
                let keyword = if *negated { "is not null" } else { "is null" };
                Ok(format!("{operand} {keyword}"))
            }
            Restriction::Group { junction, members } => {
                let mut parts = Vec::new();
                for member in members.iter().filter(|m| m.applies(self.bindings)) {
                    parts.push(self.render_restriction(&member.restriction, ctx)?);
                }
                match parts.len() {
                    1 => Ok(parts.remove(0)),
                    _ => Ok(format!("({})", parts.join(junction.separator()))),
                }
            }
        }
    }

    // ── result shape ────────────────────────────────────────────────

    fn result_shape(&self, scope: ScopeId) -> Option<ResultShape> {
        let clauses = self.clauses.get(scope.index())?;
        match clauses.projections.as_slice() {
            [] => match self.scopes.scope(scope).roots() {
                [root] => Some(ResultShape::Entity(
                    self.graph.node(*root).target_type().to_string(),
                )),
                roots => Some(ResultShape::Tuple(roots.len())),
            },
            [Projection::Node(node)] => {
                let node = self.graph.node(*node);
                let type_name = node.target_type().to_string();
                if node.kind().is_entity() {
                    Some(ResultShape::Entity(type_name))
                } else {
                    Some(ResultShape::Scalar(type_name))
                }
            }
            [Projection::Aggregate { func, node, .. }] => Some(ResultShape::Scalar(match func {
                AggregateFunc::Count => "i64".to_string(),
                AggregateFunc::Avg => "f64".to_string(),
                AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => {
                    self.graph.node(*node).target_type().to_string()
                }
            })),
            [Projection::Expression(_)] => None,
            items => Some(ResultShape::Tuple(items.len())),
        }
    }
}
