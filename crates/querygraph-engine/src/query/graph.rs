//! The query graph: roots, joins, composites and plain properties.
//!
//! Nodes live in a single arena owned by the root query and refer to their
//! parent by [`NodeId`]. Children are kept in insertion order so that
//! traversal, and therefore compiled output, is deterministic. A child is
//! keyed by its path segment and the scope that materialized it, so a
//! sub-query reaching through an outer node never hands its own joins to
//! the enclosing query.

use indexmap::IndexMap;
use querygraph_core::{QueryError, QueryResult};

use super::alias::{Alias, AliasProvider};
use super::scope::ScopeId;

/// Index of a node in the query arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A `from` entry.
    Root,
    /// A single-valued association to an entity.
    Entity,
    /// A collection association; the node stands for one element.
    Collection,
    /// An embedded composite value.
    Composite,
    /// A plain scalar property.
    Property,
}

impl NodeKind {
    /// Root, entity and collection nodes: the nodes that can own an alias.
    pub const fn is_entity(self) -> bool {
        matches!(self, Self::Root | Self::Entity | Self::Collection)
    }

    /// Whether a placeholder stands behind the node, i.e. further property
    /// access and join types are meaningful.
    pub const fn has_placeholder(self) -> bool {
        !matches!(self, Self::Property)
    }
}

/// Join types and their textual rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// `join`.
    Inner,
    /// `left join`.
    Left,
    /// `right join`.
    Right,
    /// `join fetch`.
    Fetch,
    /// `left join fetch`.
    LeftFetch,
    /// No join; the path renders dotted off the nearest joined ancestor.
    None,
}

impl JoinType {
    /// Returns the join keyword, or `None` for [`JoinType::None`].
    pub const fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Inner => Some("join"),
            Self::Left => Some("left join"),
            Self::Right => Some("right join"),
            Self::Fetch => Some("join fetch"),
            Self::LeftFetch => Some("left join fetch"),
            Self::None => None,
        }
    }
}

/// What a child node is created as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Resolved target type (collection element type for collections).
    pub target_type: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Identifier property of the target type.
    pub identifier: Option<String>,
}

/// A vertex of the query graph.
#[derive(Debug, Clone)]
pub struct QueryNode {
    parent: Option<NodeId>,
    segment: String,
    target_type: String,
    kind: NodeKind,
    children: IndexMap<(String, ScopeId), NodeId>,
    join_type: Option<JoinType>,
    identifier: Option<String>,
    alias: Option<Alias>,
    scope: ScopeId,
}

impl QueryNode {
    /// The parent node; `None` for roots.
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Path segment relative to the parent; empty for roots.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// The resolved target type.
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// The node kind.
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.values().copied()
    }

    /// The explicitly set join type, if any.
    pub const fn explicit_join_type(&self) -> Option<JoinType> {
        self.join_type
    }

    /// The identifier property of the target type.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// The scope that materialized this node.
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }
}

/// The arena of nodes shared by a query and its sub-queries.
#[derive(Debug, Clone, Default)]
pub struct QueryGraph {
    nodes: Vec<QueryNode>,
}

impl QueryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    pub fn node(&self, id: NodeId) -> &QueryNode {
        &self.nodes[id.0]
    }

    /// Adds a root node with its alias.
    pub fn add_root(&mut self, target_type: impl Into<String>, alias: Alias, scope: ScopeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(QueryNode {
            parent: None,
            segment: String::new(),
            target_type: target_type.into(),
            kind: NodeKind::Root,
            children: IndexMap::new(),
            join_type: None,
            identifier: None,
            alias: Some(alias),
            scope,
        });
        id
    }

    /// Returns the child of `parent` at `segment` materialized by `scope`.
    pub fn child(&self, parent: NodeId, segment: &str, scope: ScopeId) -> Option<NodeId> {
        self.node(parent)
            .children
            .get(&(segment.to_string(), scope))
            .copied()
    }

    /// Returns the first child of `parent` at `segment` whose scope passes
    /// `visible`.
    pub fn find_child(
        &self,
        parent: NodeId,
        segment: &str,
        visible: impl Fn(ScopeId) -> bool,
    ) -> Option<NodeId> {
        self.node(parent)
            .children
            .iter()
            .find(|((seg, scope), _)| seg == segment && visible(*scope))
            .map(|(_, id)| *id)
    }

    /// Returns the child of `parent` at `segment` for `scope`, creating it
    /// from `spec` the first time. The flag is `true` when the node was
    /// created.
    ///
    /// Entity and collection nodes reserve an alias at creation, so a node's
    /// alias never depends on which siblings are added later. A node that
    /// ends up resolving to [`JoinType::None`] keeps its reserved alias
    /// unused, which leaves a gap in the numbering of the rendered aliases.
    pub fn get_or_create_child(
        &mut self,
        parent: NodeId,
        segment: &str,
        spec: NodeSpec,
        aliases: &mut AliasProvider,
        scope: ScopeId,
    ) -> (NodeId, bool) {
        if let Some(existing) = self.child(parent, segment, scope) {
            return (existing, false);
        }
        let id = NodeId(self.nodes.len());
        let alias = matches!(spec.kind, NodeKind::Entity | NodeKind::Collection)
            .then(|| aliases.next_alias());
        self.nodes.push(QueryNode {
            parent: Some(parent),
            segment: segment.to_string(),
            target_type: spec.target_type,
            kind: spec.kind,
            children: IndexMap::new(),
            join_type: None,
            identifier: spec.identifier,
            alias,
            scope,
        });
        self.nodes[parent.0]
            .children
            .insert((segment.to_string(), scope), id);
        tracing::trace!("Created node {} ({:?})", self.describe(id), spec.kind);
        (id, true)
    }

    /// Sets an explicit join type.
    ///
    /// Plain properties have no placeholder behind them and cannot be joined;
    /// roots are `from` entries, not joins. Composites accept the call but
    /// always resolve to [`JoinType::None`].
    pub fn set_join_type(&mut self, id: NodeId, join_type: JoinType) -> QueryResult<()> {
        match self.node(id).kind {
            NodeKind::Property => {
                return Err(QueryError::JoinOnScalar {
                    path: self.describe(id),
                })
            }
            NodeKind::Root => {
                return Err(QueryError::InvalidJoin {
                    path: self.describe(id),
                    reason: "root entities are not joined".to_string(),
                })
            }
            NodeKind::Composite => {
                tracing::warn!(
                    "Join type {join_type:?} on composite '{}' is ignored",
                    self.describe(id)
                );
            }
            NodeKind::Entity | NodeKind::Collection => {}
        }
        self.nodes[id.0].join_type = Some(join_type);
        Ok(())
    }

    /// Resolves the join type actually rendered for a node.
    ///
    /// 1. Composites (and roots and plain properties) never join.
    /// 2. An explicit join type is used verbatim.
    /// 3. A non-collection node whose only child is its identifier renders as
    ///    a dotted foreign-key path.
    /// 4. Everything else is an inner join.
    pub fn resolve_join_type(&self, id: NodeId) -> JoinType {
        let node = self.node(id);
        if !matches!(node.kind, NodeKind::Entity | NodeKind::Collection) {
            return JoinType::None;
        }
        if let Some(explicit) = node.join_type {
            return explicit;
        }
        if node.kind != NodeKind::Collection && node.children.len() == 1 {
            let only_child = node.children.keys().next().map(|(seg, _)| seg.as_str());
            if only_child.is_some() && only_child == node.identifier.as_deref() {
                return JoinType::None;
            }
        }
        JoinType::Inner
    }

    /// Whether the node renders through its own alias.
    pub fn owns_alias(&self, id: NodeId) -> bool {
        match self.node(id).kind {
            NodeKind::Root => true,
            NodeKind::Entity | NodeKind::Collection => self.resolve_join_type(id) != JoinType::None,
            NodeKind::Composite | NodeKind::Property => false,
        }
    }

    /// The node's alias, if it currently owns one.
    pub fn alias(&self, id: NodeId) -> Option<&Alias> {
        if self.owns_alias(id) {
            self.node(id).alias.as_ref()
        } else {
            None
        }
    }

    /// The text that refers to this node: its alias, or the parent's
    /// reference followed by `.segment`.
    pub fn reference(&self, id: NodeId) -> String {
        if let Some(alias) = self.alias(id) {
            return alias.to_string();
        }
        let node = self.node(id);
        match node.parent {
            Some(parent) => format!("{}.{}", self.reference(parent), node.segment),
            None => node.segment.clone(),
        }
    }

    /// The text joined in a `join` clause: the parent's reference plus the segment.
    pub fn join_path(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.parent {
            Some(parent) => format!("{}.{}", self.reference(parent), node.segment),
            None => node.target_type.clone(),
        }
    }

    /// A human-readable type path (`Person.town.name`) for error messages.
    pub fn describe(&self, id: NodeId) -> String {
        let node = self.node(id);
        match node.parent {
            Some(parent) => format!("{}.{}", self.describe(parent), node.segment),
            None => node.target_type.clone(),
        }
    }

    /// The nearest root, entity or collection node at or above `id`.
    pub fn nearest_entity(&self, id: NodeId) -> NodeId {
        let mut current = id;
        loop {
            let node = self.node(current);
            if node.kind.is_entity() {
                return current;
            }
            match node.parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// The nodes of the tree under `root` in depth-first, insertion order,
    /// starting with `root` itself.
    pub fn depth_first(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let children: Vec<NodeId> = self.node(id).children().collect();
            stack.extend(children.into_iter().rev());
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: ScopeId = ScopeId::ROOT;

    fn entity(target: &str) -> NodeSpec {
        NodeSpec {
            target_type: target.to_string(),
            kind: NodeKind::Entity,
            identifier: Some("id".to_string()),
        }
    }

    fn property() -> NodeSpec {
        NodeSpec {
            target_type: "String".to_string(),
            kind: NodeKind::Property,
            identifier: None,
        }
    }

    fn composite(target: &str) -> NodeSpec {
        NodeSpec {
            target_type: target.to_string(),
            kind: NodeKind::Composite,
            identifier: None,
        }
    }

    fn setup() -> (QueryGraph, AliasProvider, NodeId) {
        let mut graph = QueryGraph::new();
        let mut aliases = AliasProvider::new("hobj");
        let root = graph.add_root("Person", aliases.next_alias(), SCOPE);
        (graph, aliases, root)
    }

    // ── Construction ────────────────────────────────────────────────

    #[test]
    fn test_idempotent_node_creation() {
        let (mut graph, mut aliases, root) = setup();
        let (first, created) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        assert!(created);
        let (second, created) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(graph.node(root).children().count(), 1);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_children_are_keyed_by_scope() {
        let (mut graph, mut aliases, root) = setup();
        let (outer, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        let (inner, created) =
            graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, ScopeId::from_index(1));
        assert!(created);
        assert_ne!(outer, inner);
        assert_eq!(graph.find_child(root, "town", |s| s == SCOPE), Some(outer));
        assert_eq!(graph.child(root, "town", ScopeId::from_index(1)), Some(inner));
        assert_eq!(graph.find_child(root, "car", |_| true), None);
    }

    #[test]
    fn test_children_keep_insertion_order() {
        let (mut graph, mut aliases, root) = setup();
        let (name, _) = graph.get_or_create_child(root, "name", property(), &mut aliases, SCOPE);
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        let (age, _) = graph.get_or_create_child(root, "age", property(), &mut aliases, SCOPE);
        assert_eq!(graph.node(root).children().collect::<Vec<_>>(), vec![name, town, age]);
    }

    // ── Join type resolution ────────────────────────────────────────

    #[test]
    fn test_identifier_only_resolves_to_none() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        let (id, _) = graph.get_or_create_child(town, "id", property(), &mut aliases, SCOPE);
        assert_eq!(graph.resolve_join_type(town), JoinType::None);
        assert_eq!(graph.reference(id), "hobj1.town.id");

        graph.get_or_create_child(town, "name", property(), &mut aliases, SCOPE);
        assert_eq!(graph.resolve_join_type(town), JoinType::Inner);
        assert_eq!(graph.reference(id), "hobj2.id");
    }

    #[test]
    fn test_entity_without_children_defaults_to_inner() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        assert_eq!(graph.resolve_join_type(town), JoinType::Inner);
        assert_eq!(graph.reference(town), "hobj2");
    }

    #[test]
    fn test_collection_never_uses_identifier_shortcut() {
        let (mut graph, mut aliases, root) = setup();
        let spec = NodeSpec {
            kind: NodeKind::Collection,
            ..entity("Car")
        };
        let (cars, _) = graph.get_or_create_child(root, "cars", spec, &mut aliases, SCOPE);
        graph.get_or_create_child(cars, "id", property(), &mut aliases, SCOPE);
        assert_eq!(graph.resolve_join_type(cars), JoinType::Inner);
    }

    #[test]
    fn test_explicit_join_type_wins() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        graph.get_or_create_child(town, "id", property(), &mut aliases, SCOPE);
        graph.set_join_type(town, JoinType::Left).unwrap();
        assert_eq!(graph.resolve_join_type(town), JoinType::Left);
    }

    #[test]
    fn test_composite_never_joins_or_owns_alias() {
        let (mut graph, mut aliases, root) = setup();
        let (address, _) = graph.get_or_create_child(root, "address", composite("Address"), &mut aliases, SCOPE);
        let (city, _) = graph.get_or_create_child(address, "city", property(), &mut aliases, SCOPE);
        graph.set_join_type(address, JoinType::Inner).unwrap();
        assert_eq!(graph.resolve_join_type(address), JoinType::None);
        assert!(graph.alias(address).is_none());
        assert_eq!(graph.reference(city), "hobj1.address.city");
    }

    #[test]
    fn test_composite_identifier_resolves_to_none() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        let (id, _) = graph.get_or_create_child(town, "id", composite("TownKey"), &mut aliases, SCOPE);
        let (code, _) = graph.get_or_create_child(id, "code", property(), &mut aliases, SCOPE);
        assert_eq!(graph.resolve_join_type(town), JoinType::None);
        assert_eq!(graph.reference(code), "hobj1.town.id.code");
    }

    #[test]
    fn test_join_on_scalar_is_rejected() {
        let (mut graph, mut aliases, root) = setup();
        let (name, _) = graph.get_or_create_child(root, "name", property(), &mut aliases, SCOPE);
        let err = graph.set_join_type(name, JoinType::Inner).unwrap_err();
        assert_eq!(err, QueryError::JoinOnScalar { path: "Person.name".to_string() });
    }

    #[test]
    fn test_join_on_root_is_rejected() {
        let (mut graph, _, root) = setup();
        assert!(matches!(
            graph.set_join_type(root, JoinType::Inner),
            Err(QueryError::InvalidJoin { .. })
        ));
    }

    // ── References ──────────────────────────────────────────────────

    #[test]
    fn test_alias_stability_with_unrelated_siblings() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        let (name, _) = graph.get_or_create_child(town, "name", property(), &mut aliases, SCOPE);
        let before = graph.reference(name);
        graph.get_or_create_child(root, "age", property(), &mut aliases, SCOPE);
        graph.get_or_create_child(root, "car", entity("Car"), &mut aliases, SCOPE);
        assert_eq!(graph.reference(name), before);
        assert_eq!(before, "hobj2.name");
    }

    #[test]
    fn test_join_path_and_describe() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        assert_eq!(graph.join_path(town), "hobj1.town");
        assert_eq!(graph.describe(town), "Person.town");
        assert_eq!(graph.nearest_entity(town), town);
    }

    #[test]
    fn test_depth_first_order() {
        let (mut graph, mut aliases, root) = setup();
        let (town, _) = graph.get_or_create_child(root, "town", entity("Town"), &mut aliases, SCOPE);
        let (mayor, _) = graph.get_or_create_child(town, "mayor", entity("Person"), &mut aliases, SCOPE);
        let (car, _) = graph.get_or_create_child(root, "car", entity("Car"), &mut aliases, SCOPE);
        assert_eq!(graph.depth_first(root), vec![root, town, mayor, car]);
    }

    #[test]
    fn test_join_keywords() {
        assert_eq!(JoinType::Inner.keyword(), Some("join"));
        assert_eq!(JoinType::Left.keyword(), Some("left join"));
        assert_eq!(JoinType::Right.keyword(), Some("right join"));
        assert_eq!(JoinType::Fetch.keyword(), Some("join fetch"));
        assert_eq!(JoinType::LeftFetch.keyword(), Some("left join fetch"));
        assert_eq!(JoinType::None.keyword(), None);
    }
}
