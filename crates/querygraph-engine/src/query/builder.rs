//! The query builder.
//!
//! A [`Query`] owns the node arena, the alias provider, the pending-access
//! buffer and the scope tracker shared by a root query and all of its
//! sub-queries. Property paths are recorded through [`Query::get`]; every
//! consuming operation (join, restriction, projection, grouping, ordering)
//! drains exactly one pending access and checks that it matches the
//! placeholder it was given.
//!
//! # Examples
//!
//! ```
//! use querygraph_core::Settings;
//! use querygraph_engine::metadata::{EntityMeta, MetadataRegistry, PropertyDef};
//! use querygraph_engine::query::Query;
//!
//! let mut registry = MetadataRegistry::new();
//! registry
//!     .register_meta(
//!         EntityMeta::entity("Person")
//!             .identifier("id")
//!             .property(PropertyDef::reference("town", "Town")),
//!     )
//!     .register_meta(
//!         EntityMeta::entity("Town")
//!             .identifier("id")
//!             .property(PropertyDef::scalar("id", "i64"))
//!             .property(PropertyDef::scalar("name", "String")),
//!     );
//!
//! let mut q = Query::with_settings(&registry, Settings::default());
//! let person = q.from_type("Person").unwrap();
//! let town = q.get(person, "town").unwrap();
//! let name = q.get(town, "name").unwrap();
//! q.filter(name).unwrap().eq("Paris").unwrap();
//!
//! let compiled = q.compile().unwrap();
//! assert_eq!(
//!     compiled.text(),
//!     "from Person hobj1 join hobj1.town hobj2 where hobj2.name = ?"
//! );
//! ```

use std::collections::HashMap;

use querygraph_core::logging::query_span;
use querygraph_core::{QueryError, QueryResult, Settings, SETTINGS};
use tracing::Instrument;

use super::alias::AliasProvider;
use super::capture::{PendingAccesses, Placeholder};
use super::clauses::{Clauses, Direction, OrderItem, Projection};
use super::compiler::{CompiledQuery, QueryCompiler};
use super::expressions::{AggregateFunc, Operand, ValueExpression};
use super::graph::{JoinType, NodeId, NodeKind, NodeSpec, QueryGraph};
use super::restrictions::{Applicability, Comparison, Junction, Restriction, RestrictionClause};
use super::scope::{ScopeId, ScopeTracker};
use crate::executor::{Row, Session};
use crate::metadata::{Entity, Metadata};
use crate::value::Value;

/// Handle on a sub-query built with [`Query::subquery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubQuery {
    scope: ScopeId,
}

impl SubQuery {
    /// The scope of the sub-query.
    pub const fn scope(self) -> ScopeId {
        self.scope
    }
}

/// Where a restriction lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseTarget {
    Where,
    Join(NodeId),
}

/// A type-checked query under construction.
pub struct Query<'m> {
    metadata: &'m dyn Metadata,
    settings: Settings,
    graph: QueryGraph,
    aliases: AliasProvider,
    pending: PendingAccesses,
    scopes: ScopeTracker,
    clauses: Vec<Clauses>,
    groups: Vec<Vec<RestrictionClause>>,
    bindings: HashMap<String, Value>,
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("nodes", &self.graph.len())
            .field("scopes", &self.scopes.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<'m> Query<'m> {
    /// Creates a query using the global settings, or the defaults when none
    /// are configured.
    pub fn new(metadata: &'m dyn Metadata) -> Self {
        Self::with_settings(metadata, SETTINGS.get_or_default())
    }

    /// Creates a query with explicit settings.
    pub fn with_settings(metadata: &'m dyn Metadata, settings: Settings) -> Self {
        let aliases = AliasProvider::new(settings.alias_prefix.clone());
        Self {
            metadata,
            settings,
            graph: QueryGraph::new(),
            aliases,
            pending: PendingAccesses::new(),
            scopes: ScopeTracker::new(),
            clauses: vec![Clauses::default()],
            groups: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    /// The node graph built so far.
    pub const fn graph(&self) -> &QueryGraph {
        &self.graph
    }

    /// The settings this query compiles with.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Property accesses not yet consumed.
    pub const fn pending(&self) -> &PendingAccesses {
        &self.pending
    }

    /// The scope under construction.
    pub const fn current_scope(&self) -> ScopeId {
        self.scopes.current()
    }

    // ── Roots and property access ───────────────────────────────────

    /// Adds a `from` entry for an entity type.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownEntity`] if the type is not mapped.
    pub fn from<E: Entity>(&mut self) -> QueryResult<Placeholder> {
        self.from_type(E::type_name())
    }

    /// Adds a `from` entry for an entity type given by name.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::UnknownEntity`] if the type is not mapped.
    pub fn from_type(&mut self, type_name: &str) -> QueryResult<Placeholder> {
        if !self.metadata.is_known_entity_type(type_name) {
            return Err(QueryError::UnknownEntity(type_name.to_string()));
        }
        let scope = self.scopes.current();
        let alias = self.aliases.next_alias();
        tracing::debug!("Adding root {type_name} as {alias}");
        let node = self.graph.add_root(type_name, alias, scope);
        self.scopes.add_root(node);
        Ok(Placeholder::new(node, NodeKind::Root))
    }

    /// Accesses `property` of the node behind `owner`, recording a pending
    /// access.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::PropertyOnScalar`] for plain properties,
    /// [`QueryError::UnknownProperty`] if the property is not mapped, and
    /// [`QueryError::OutOfScope`] if `owner` is not visible here.
    pub fn get(&mut self, owner: Placeholder, property: &str) -> QueryResult<Placeholder> {
        let owner_id = self.check_placeholder(owner)?;
        let owner_node = self.graph.node(owner_id);
        if !owner_node.kind().has_placeholder() {
            return Err(QueryError::PropertyOnScalar {
                path: self.graph.describe(owner_id),
            });
        }
        self.ensure_visible(owner_id, None)?;

        let scope = self.scopes.current();
        let existing = self
            .graph
            .find_child(owner_id, property, |s| self.scopes.encloses(s, scope));
        let child = match existing {
            Some(child) => child,
            None => self.create_child(owner_id, property, scope)?,
        };

        self.pending.record(owner_id, child);
        Ok(Placeholder::new(child, self.graph.node(child).kind()))
    }

    /// Drains every pending access.
    pub fn dequeue_pending(&mut self) -> Vec<NodeId> {
        self.pending.dequeue_pending()
    }

    /// Consumes the pending access for `placeholder` and returns it as an
    /// operand for a [`ValueExpression`].
    ///
    /// # Errors
    ///
    /// Returns the capture and scope errors of [`Query::select`].
    pub fn operand(&mut self, placeholder: Placeholder) -> QueryResult<Operand> {
        self.capture(placeholder, "expression").map(Operand::Node)
    }

    // ── Joins ───────────────────────────────────────────────────────

    /// Joins the node behind `placeholder` with an inner join.
    ///
    /// # Errors
    ///
    /// See [`Query::join_with_type`].
    pub fn inner_join(&mut self, placeholder: Placeholder) -> QueryResult<Placeholder> {
        self.join_with_type(placeholder, JoinType::Inner)
    }

    /// Joins with a left outer join.
    ///
    /// # Errors
    ///
    /// See [`Query::join_with_type`].
    pub fn left_join(&mut self, placeholder: Placeholder) -> QueryResult<Placeholder> {
        self.join_with_type(placeholder, JoinType::Left)
    }

    /// Joins with a right outer join.
    ///
    /// # Errors
    ///
    /// See [`Query::join_with_type`].
    pub fn right_join(&mut self, placeholder: Placeholder) -> QueryResult<Placeholder> {
        self.join_with_type(placeholder, JoinType::Right)
    }

    /// Joins with an inner fetch join.
    ///
    /// # Errors
    ///
    /// See [`Query::join_with_type`].
    pub fn fetch_join(&mut self, placeholder: Placeholder) -> QueryResult<Placeholder> {
        self.join_with_type(placeholder, JoinType::Fetch)
    }

    /// Joins with a left outer fetch join.
    ///
    /// # Errors
    ///
    /// See [`Query::join_with_type`].
    pub fn left_fetch_join(&mut self, placeholder: Placeholder) -> QueryResult<Placeholder> {
        self.join_with_type(placeholder, JoinType::LeftFetch)
    }

    /// Sets the join type of the node behind `placeholder` and returns the
    /// same placeholder, which can be used for further property access.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::JoinOnScalar`] for plain properties,
    /// [`QueryError::InvalidJoin`] for roots and for nodes materialized by an
    /// enclosing query, and capture errors if `placeholder` is not the one
    /// pending access.
    pub fn join_with_type(
        &mut self,
        placeholder: Placeholder,
        join_type: JoinType,
    ) -> QueryResult<Placeholder> {
        let node = self.capture(placeholder, "join")?;
        if self.graph.node(node).scope() != self.scopes.current() {
            return Err(QueryError::InvalidJoin {
                path: self.graph.describe(node),
                reason: "the node belongs to an enclosing query".to_string(),
            });
        }
        self.graph.set_join_type(node, join_type)?;
        Ok(placeholder)
    }

    /// Starts a `with` restriction on an explicitly joined node. The left
    /// operand must be declared no later than the join itself.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidJoin`] if `join` was not explicitly
    /// joined in this query or renders no join (a composite, or
    /// [`JoinType::None`]), [`QueryError::OutOfScope`] if `property` is
    /// declared after the join, and capture errors.
    pub fn with(
        &mut self,
        join: Placeholder,
        property: Placeholder,
    ) -> QueryResult<Condition<'_, 'm>> {
        let join_node = self.check_placeholder(join)?;
        let node = self.graph.node(join_node);
        if node.explicit_join_type().is_none() || node.scope() != self.scopes.current() {
            return Err(QueryError::InvalidJoin {
                path: self.graph.describe(join_node),
                reason: "with requires a node explicitly joined in this query".to_string(),
            });
        }
        if self.graph.resolve_join_type(join_node) == JoinType::None {
            return Err(QueryError::InvalidJoin {
                path: self.graph.describe(join_node),
                reason: "with requires a node that renders a join".to_string(),
            });
        }
        let left = self.capture(property, "with")?;
        self.ensure_visible(left, Some(join_node))?;
        Ok(Condition::new(self, ClauseTarget::Join(join_node), Operand::Node(left)))
    }

    // ── Restrictions ────────────────────────────────────────────────

    /// Starts a `where` restriction on the node behind `placeholder`.
    ///
    /// # Errors
    ///
    /// Returns capture errors and [`QueryError::OutOfScope`].
    pub fn filter(&mut self, placeholder: Placeholder) -> QueryResult<Condition<'_, 'm>> {
        let node = self.capture(placeholder, "where")?;
        Ok(Condition::new(self, ClauseTarget::Where, Operand::Node(node)))
    }

    /// Starts a `where` restriction on an expression.
    pub fn filter_expression(
        &mut self,
        expr: impl ValueExpression + 'static,
    ) -> Condition<'_, 'm> {
        Condition::new(self, ClauseTarget::Where, Operand::expression(expr))
    }

    /// Adds `exists (sub-query)`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if `sub` is not a direct
    /// sub-query of the current scope.
    pub fn exists(&mut self, sub: SubQuery) -> QueryResult<()> {
        self.check_subquery(sub)?;
        self.push_restriction(
            ClauseTarget::Where,
            RestrictionClause::new(Restriction::Exists {
                subquery: sub.scope,
                negated: false,
            }),
        )
    }

    /// Adds `not exists (sub-query)`.
    ///
    /// # Errors
    ///
    /// See [`Query::exists`].
    pub fn not_exists(&mut self, sub: SubQuery) -> QueryResult<()> {
        self.check_subquery(sub)?;
        self.push_restriction(
            ClauseTarget::Where,
            RestrictionClause::new(Restriction::Exists {
                subquery: sub.scope,
                negated: true,
            }),
        )
    }

    /// Groups the `where` restrictions added by `build` with `or`.
    ///
    /// # Errors
    ///
    /// Propagates errors from `build`.
    pub fn any<F>(&mut self, build: F) -> QueryResult<()>
    where
        F: FnOnce(&mut Self) -> QueryResult<()>,
    {
        self.group(Junction::Or, build)
    }

    /// Groups the `where` restrictions added by `build` with `and`.
    ///
    /// # Errors
    ///
    /// Propagates errors from `build`.
    pub fn all<F>(&mut self, build: F) -> QueryResult<()>
    where
        F: FnOnce(&mut Self) -> QueryResult<()>,
    {
        self.group(Junction::And, build)
    }

    fn group<F>(&mut self, junction: Junction, build: F) -> QueryResult<()>
    where
        F: FnOnce(&mut Self) -> QueryResult<()>,
    {
        self.groups.push(Vec::new());
        let result = build(self);
        let members = self.groups.pop().unwrap_or_default();
        result?;
        if members.is_empty() {
            return Ok(());
        }
        self.push_restriction(
            ClauseTarget::Where,
            RestrictionClause::new(Restriction::Group { junction, members }),
        )
    }

    fn push_restriction(&mut self, target: ClauseTarget, clause: RestrictionClause) -> QueryResult<()> {
        match target {
            ClauseTarget::Where => {
                if let Some(group) = self.groups.last_mut() {
                    group.push(clause);
                } else {
                    self.current_clauses()?.restrictions.push(clause);
                }
            }
            ClauseTarget::Join(node) => {
                self.current_clauses()?
                    .join_conditions
                    .entry(node)
                    .or_default()
                    .push(clause);
            }
        }
        Ok(())
    }

    // ── Projections, grouping and ordering ──────────────────────────

    /// Adds the node behind `placeholder` to the `select` list.
    ///
    /// # Errors
    ///
    /// Returns capture errors and [`QueryError::OutOfScope`].
    pub fn select(&mut self, placeholder: Placeholder) -> QueryResult<()> {
        let node = self.capture(placeholder, "select")?;
        self.current_clauses()?.projections.push(Projection::Node(node));
        Ok(())
    }

    /// Adds an aggregate over the node behind `placeholder`.
    ///
    /// # Errors
    ///
    /// See [`Query::select`].
    pub fn select_aggregate(&mut self, func: AggregateFunc, placeholder: Placeholder) -> QueryResult<()> {
        self.push_aggregate(func, false, placeholder)
    }

    /// Adds an aggregate over the distinct values of the node.
    ///
    /// # Errors
    ///
    /// See [`Query::select`].
    pub fn select_aggregate_distinct(
        &mut self,
        func: AggregateFunc,
        placeholder: Placeholder,
    ) -> QueryResult<()> {
        self.push_aggregate(func, true, placeholder)
    }

    fn push_aggregate(&mut self, func: AggregateFunc, distinct: bool, placeholder: Placeholder) -> QueryResult<()> {
        let node = self.capture(placeholder, "select")?;
        self.current_clauses()?.projections.push(Projection::Aggregate {
            func,
            distinct,
            node,
        });
        Ok(())
    }

    /// Adds an expression to the `select` list.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if the current scope is unknown.
    pub fn select_expression(&mut self, expr: impl ValueExpression + 'static) -> QueryResult<()> {
        self.current_clauses()?
            .projections
            .push(Projection::Expression(Operand::expression(expr)));
        Ok(())
    }

    /// Renders `select distinct`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if the current scope is unknown.
    pub fn distinct(&mut self) -> QueryResult<&mut Self> {
        self.current_clauses()?.distinct = true;
        Ok(self)
    }

    /// Groups by the node behind `placeholder`.
    ///
    /// # Errors
    ///
    /// See [`Query::select`].
    pub fn group_by(&mut self, placeholder: Placeholder) -> QueryResult<()> {
        let node = self.capture(placeholder, "group by")?;
        self.current_clauses()?.group_by.push(Operand::Node(node));
        Ok(())
    }

    /// Groups by an expression.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if the current scope is unknown.
    pub fn group_by_expression(&mut self, expr: impl ValueExpression + 'static) -> QueryResult<()> {
        self.current_clauses()?.group_by.push(Operand::expression(expr));
        Ok(())
    }

    /// Orders by the node behind `placeholder`.
    ///
    /// # Errors
    ///
    /// See [`Query::select`].
    pub fn order_by(&mut self, placeholder: Placeholder, direction: Direction) -> QueryResult<()> {
        let node = self.capture(placeholder, "order by")?;
        self.current_clauses()?.order_by.push(OrderItem {
            operand: Operand::Node(node),
            direction,
        });
        Ok(())
    }

    /// Orders ascending.
    ///
    /// # Errors
    ///
    /// See [`Query::select`].
    pub fn order_by_asc(&mut self, placeholder: Placeholder) -> QueryResult<()> {
        self.order_by(placeholder, Direction::Asc)
    }

    /// Orders descending.
    ///
    /// # Errors
    ///
    /// See [`Query::select`].
    pub fn order_by_desc(&mut self, placeholder: Placeholder) -> QueryResult<()> {
        self.order_by(placeholder, Direction::Desc)
    }

    /// Orders by an expression.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if the current scope is unknown.
    pub fn order_by_expression(
        &mut self,
        expr: impl ValueExpression + 'static,
        direction: Direction,
    ) -> QueryResult<()> {
        self.current_clauses()?.order_by.push(OrderItem {
            operand: Operand::expression(expr),
            direction,
        });
        Ok(())
    }

    // ── Parameters and sub-queries ──────────────────────────────────

    /// Binds a named parameter. Bindings are read at compile time, so a
    /// value may be set before or after the restriction that uses it.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Builds a sub-query. Inside `build`, the query's `from`, `select` and
    /// restriction calls apply to the new scope, and the enclosing queries'
    /// nodes remain visible.
    ///
    /// # Errors
    ///
    /// Propagates errors from `build`, returns [`QueryError::DanglingAccess`]
    /// if accesses are left pending, and [`QueryError::InvalidQuery`] if the
    /// sub-query declares no `from` entry.
    pub fn subquery<F>(&mut self, build: F) -> QueryResult<SubQuery>
    where
        F: FnOnce(&mut Self) -> QueryResult<()>,
    {
        let outer_groups = std::mem::take(&mut self.groups);
        let scope = self.scopes.open();
        self.clauses.push(Clauses::default());
        tracing::trace!("Opened sub-query scope {}", scope.index());

        let result = build(self);

        self.scopes.close(scope);
        self.groups = outer_groups;
        result?;

        if !self.pending.is_empty() {
            let paths = self
                .pending
                .dequeue_pending()
                .into_iter()
                .map(|n| self.graph.describe(n))
                .collect();
            return Err(QueryError::DanglingAccess { paths });
        }
        if self.scopes.scope(scope).roots().is_empty() {
            return Err(QueryError::InvalidQuery(
                "a sub-query needs at least one from entry".to_string(),
            ));
        }
        Ok(SubQuery { scope })
    }

    // ── Compilation and execution ───────────────────────────────────

    /// Compiles the query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DanglingAccess`] if accesses are still pending,
    /// and the compile-time errors of [`QueryCompiler::compile`].
    pub fn compile(&self) -> QueryResult<CompiledQuery> {
        if !self.pending.is_empty() {
            let paths = self
                .pending
                .events()
                .iter()
                .map(|e| self.graph.describe(e.node()))
                .collect();
            return Err(QueryError::DanglingAccess { paths });
        }
        QueryCompiler::new(
            &self.graph,
            &self.scopes,
            &self.clauses,
            self.metadata,
            &self.bindings,
            self.settings.parameter_style,
        )
        .compile()
    }

    /// Compiles the query and returns every row `session` produces for it.
    ///
    /// # Errors
    ///
    /// Returns compile errors and errors reported by the session.
    pub async fn list(&self, session: &dyn Session) -> QueryResult<Vec<Row>> {
        let compiled = self.compile()?;
        session.list(&compiled).instrument(query_span("list")).await
    }

    /// Compiles the query and returns its single row.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoResult`] for no rows and
    /// [`QueryError::NonUniqueResult`] for more than one.
    pub async fn unique(&self, session: &dyn Session) -> QueryResult<Row> {
        let compiled = self.compile()?;
        let mut rows = session
            .list(&compiled)
            .instrument(query_span("unique"))
            .await?;
        match rows.len() {
            0 => Err(QueryError::NoResult(compiled.text())),
            1 => Ok(rows.remove(0)),
            n => Err(QueryError::NonUniqueResult(format!(
                "{n} rows for {}",
                compiled.text()
            ))),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    fn create_child(&mut self, owner: NodeId, property: &str, scope: ScopeId) -> QueryResult<NodeId> {
        let owner_node = self.graph.node(owner);
        let owner_type = owner_node.target_type().to_string();
        let owner_scope = owner_node.scope();
        let resolved = self
            .metadata
            .resolve_target_type(&owner_type, property)
            .ok_or_else(|| QueryError::UnknownProperty {
                owner: owner_type.clone(),
                property: property.to_string(),
            })?;

        let kind = if resolved.collection {
            NodeKind::Collection
        } else if self.metadata.is_known_entity_type(&resolved.target_type) {
            NodeKind::Entity
        } else if self.metadata.is_composite_type(&resolved.target_type) {
            NodeKind::Composite
        } else {
            NodeKind::Property
        };
        let identifier = if kind.is_entity() {
            self.metadata
                .identifier_property(&resolved.target_type)
                .map(ToString::to_string)
        } else {
            None
        };

        let spec = NodeSpec {
            target_type: resolved.target_type,
            kind,
            identifier,
        };
        let (child, _) = self
            .graph
            .get_or_create_child(owner, property, spec, &mut self.aliases, scope);
        if owner_scope != scope {
            self.scopes.attach(child);
        }
        Ok(child)
    }

    fn current_clauses(&mut self) -> QueryResult<&mut Clauses> {
        let index = self.scopes.current().index();
        self.clauses
            .get_mut(index)
            .ok_or_else(|| QueryError::InvalidQuery(format!("unknown scope {index}")))
    }

    fn check_placeholder(&self, placeholder: Placeholder) -> QueryResult<NodeId> {
        let node = placeholder.node();
        if node.index() >= self.graph.len() || self.graph.node(node).kind() != placeholder.kind() {
            return Err(QueryError::InvalidQuery(
                "placeholder does not belong to this query".to_string(),
            ));
        }
        Ok(node)
    }

    fn check_subquery(&self, sub: SubQuery) -> QueryResult<()> {
        if sub.scope.index() >= self.scopes.len()
            || self.scopes.scope(sub.scope).parent() != Some(self.scopes.current())
        {
            return Err(QueryError::InvalidQuery(format!(
                "sub-query {} is not a direct sub-query of this scope",
                sub.scope.index()
            )));
        }
        Ok(())
    }

    fn capture(&mut self, placeholder: Placeholder, operation: &'static str) -> QueryResult<NodeId> {
        let node = self.check_placeholder(placeholder)?;
        if self.graph.node(node).kind() != NodeKind::Root {
            let pending = self.pending.dequeue_one(operation)?;
            if pending != node {
                return Err(QueryError::CaptureMismatch {
                    operation,
                    expected: self.graph.describe(pending),
                    found: self.graph.describe(node),
                });
            }
        }
        self.ensure_visible(node, None)?;
        Ok(node)
    }

    fn ensure_visible(&self, node: NodeId, up_to: Option<NodeId>) -> QueryResult<()> {
        if self.scopes.is_visible(&self.graph, node, up_to) {
            return Ok(());
        }
        let context = match up_to {
            Some(bound) => format!("of the join on '{}'", self.graph.describe(bound)),
            None => "of the current query".to_string(),
        };
        Err(QueryError::OutOfScope {
            path: self.graph.describe(node),
            context,
        })
    }
}

/// A restriction awaiting its operator.
///
/// Returned by [`Query::filter`] and [`Query::with`]; applying an operator
/// adds the restriction to the query.
#[must_use = "a condition adds nothing until an operator is applied"]
pub struct Condition<'q, 'm> {
    query: &'q mut Query<'m>,
    target: ClauseTarget,
    left: Operand,
    applicability: Applicability,
}

impl<'q, 'm> Condition<'q, 'm> {
    fn new(query: &'q mut Query<'m>, target: ClauseTarget, left: Operand) -> Self {
        Self {
            query,
            target,
            left,
            applicability: Applicability::Always,
        }
    }

    /// Makes the restriction conditional: it is emitted only if
    /// `applicability` accepts its values at compile time.
    pub fn when(mut self, applicability: Applicability) -> Self {
        self.applicability = applicability;
        self
    }

    fn finish(self, build: impl FnOnce(Operand) -> Restriction) -> QueryResult<()> {
        let clause = RestrictionClause::when(build(self.left), self.applicability);
        self.query.push_restriction(self.target, clause)
    }

    /// `left op value`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if the current scope is unknown.
    pub fn compare(self, op: Comparison, value: impl Into<Value>) -> QueryResult<()> {
        let right = Operand::Value(value.into());
        self.finish(|left| Restriction::Compare { left, op, right })
    }

    /// `left = value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn eq(self, value: impl Into<Value>) -> QueryResult<()> {
        self.compare(Comparison::Eq, value)
    }

    /// `left <> value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn ne(self, value: impl Into<Value>) -> QueryResult<()> {
        self.compare(Comparison::Ne, value)
    }

    /// `left < value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn lt(self, value: impl Into<Value>) -> QueryResult<()> {
        self.compare(Comparison::Lt, value)
    }

    /// `left <= value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn le(self, value: impl Into<Value>) -> QueryResult<()> {
        self.compare(Comparison::Le, value)
    }

    /// `left > value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn gt(self, value: impl Into<Value>) -> QueryResult<()> {
        self.compare(Comparison::Gt, value)
    }

    /// `left >= value`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn ge(self, value: impl Into<Value>) -> QueryResult<()> {
        self.compare(Comparison::Ge, value)
    }

    /// `left like pattern`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn like(self, pattern: impl Into<String>) -> QueryResult<()> {
        self.compare(Comparison::Like, pattern.into())
    }

    /// `left not like pattern`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn not_like(self, pattern: impl Into<String>) -> QueryResult<()> {
        self.compare(Comparison::NotLike, pattern.into())
    }

    /// `left op :name`, bound later with [`Query::set_parameter`].
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn compare_param(self, op: Comparison, name: impl Into<String>) -> QueryResult<()> {
        let right = Operand::Parameter(name.into());
        self.finish(|left| Restriction::Compare { left, op, right })
    }

    /// `left = :name`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn eq_param(self, name: impl Into<String>) -> QueryResult<()> {
        self.compare_param(Comparison::Eq, name)
    }

    /// `left op other`, where `other` is a property accessed inside
    /// `access`, e.g. `|q| q.get(car, "name")`.
    ///
    /// # Errors
    ///
    /// Returns errors from `access`, capture errors, and
    /// [`QueryError::OutOfScope`] when a `with` operand is declared after
    /// its join.
    pub fn compare_property<F>(self, op: Comparison, access: F) -> QueryResult<()>
    where
        F: FnOnce(&mut Query<'m>) -> QueryResult<Placeholder>,
    {
        let placeholder = access(&mut *self.query)?;
        let right = self.query.capture(placeholder, "comparison")?;
        if let ClauseTarget::Join(join) = self.target {
            self.query.ensure_visible(right, Some(join))?;
        }
        self.finish(|left| Restriction::Compare {
            left,
            op,
            right: Operand::Node(right),
        })
    }

    /// `left = other`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare_property`].
    pub fn eq_property<F>(self, access: F) -> QueryResult<()>
    where
        F: FnOnce(&mut Query<'m>) -> QueryResult<Placeholder>,
    {
        self.compare_property(Comparison::Eq, access)
    }

    /// `left op expression`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn compare_expression(
        self,
        op: Comparison,
        expr: impl ValueExpression + 'static,
    ) -> QueryResult<()> {
        let right = Operand::expression(expr);
        self.finish(|left| Restriction::Compare { left, op, right })
    }

    /// `left between low and high`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> QueryResult<()> {
        let low = Operand::Value(low.into());
        let high = Operand::Value(high.into());
        self.finish(|operand| Restriction::Between { operand, low, high })
    }

    /// `left in (v1, v2, ...)`. An empty list renders a false predicate.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn in_values<V, I>(self, values: I) -> QueryResult<()>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(|v| Operand::Value(v.into())).collect();
        self.finish(|operand| Restriction::In {
            operand,
            values,
            negated: false,
        })
    }

    /// `left not in (v1, v2, ...)`. An empty list renders a true predicate.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn not_in_values<V, I>(self, values: I) -> QueryResult<()>
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(|v| Operand::Value(v.into())).collect();
        self.finish(|operand| Restriction::In {
            operand,
            values,
            negated: true,
        })
    }

    /// `left in (sub-query)`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidQuery`] if `sub` is not a direct
    /// sub-query of the current scope.
    pub fn in_subquery(self, sub: SubQuery) -> QueryResult<()> {
        self.query.check_subquery(sub)?;
        self.finish(|operand| Restriction::InSubquery {
            operand,
            subquery: sub.scope,
            negated: false,
        })
    }

    /// `left not in (sub-query)`.
    ///
    /// # Errors
    ///
    /// See [`Condition::in_subquery`].
    pub fn not_in_subquery(self, sub: SubQuery) -> QueryResult<()> {
        self.query.check_subquery(sub)?;
        self.finish(|operand| Restriction::InSubquery {
            operand,
            subquery: sub.scope,
            negated: true,
        })
    }

    /// `left is null`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn is_null(self) -> QueryResult<()> {
        self.finish(|operand| Restriction::Null {
            operand,
            negated: false,
        })
    }

    /// `left is not null`.
    ///
    /// # Errors
    ///
    /// See [`Condition::compare`].
    pub fn is_not_null(self) -> QueryResult<()> {
        self.finish(|operand| Restriction::Null {
            operand,
            negated: true,
        })
    }
}
