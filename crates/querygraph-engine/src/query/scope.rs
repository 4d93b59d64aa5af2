//! Scope tracking for queries and nested sub-queries.
//!
//! Each query level is a [`Scope`]: its own `from` entries plus the nodes it
//! materialized off an enclosing query's nodes. Visibility is inherited
//! outward (a sub-query sees its ancestors' nodes) but never inward.

use super::graph::{NodeId, QueryGraph};

/// Identifies one query level. [`ScopeId::ROOT`] is the outermost query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    /// The outermost query.
    pub const ROOT: Self = Self(0);

    /// Returns the scope index.
    pub const fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// One query level.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    parent: Option<ScopeId>,
    roots: Vec<NodeId>,
    attached: Vec<NodeId>,
}

impl Scope {
    /// The enclosing scope.
    pub const fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// `from` entries in declaration order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Nodes this scope materialized directly off an enclosing scope's nodes.
    pub fn attached(&self) -> &[NodeId] {
        &self.attached
    }
}

/// Tracks every scope of a root query and which one is being built.
#[derive(Debug, Clone)]
pub struct ScopeTracker {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTracker {
    /// Creates a tracker holding only the root scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            current: ScopeId::ROOT,
        }
    }

    /// The scope under construction.
    pub const fn current(&self) -> ScopeId {
        self.current
    }

    /// Returns the scope for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tracker.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Number of scopes, the root included.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always `false`: the root scope exists from the start.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Opens a sub-scope of the current scope and makes it current.
    pub fn open(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            ..Scope::default()
        });
        self.current = id;
        id
    }

    /// Closes `id`, making its parent current again.
    pub fn close(&mut self, id: ScopeId) {
        if let Some(parent) = self.scopes[id.0].parent {
            self.current = parent;
        }
    }

    /// Registers a `from` entry in the current scope.
    pub fn add_root(&mut self, node: NodeId) {
        let current = self.current.0;
        self.scopes[current].roots.push(node);
    }

    /// Registers a node materialized off an enclosing scope's node.
    pub fn attach(&mut self, node: NodeId) {
        let current = self.current.0;
        self.scopes[current].attached.push(node);
    }

    /// Whether `ancestor` is `scope` or encloses it.
    pub fn encloses(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.scopes[id.0].parent;
        }
        false
    }

    /// Entity nodes of `scope` in declaration order: each root followed by
    /// its entity descendants depth-first, then the attached subtrees.
    pub fn declaration_order(&self, graph: &QueryGraph, scope: ScopeId) -> Vec<NodeId> {
        let data = self.scope(scope);
        data.roots
            .iter()
            .chain(data.attached.iter())
            .flat_map(|start| graph.depth_first(*start))
            .filter(|id| {
                let node = graph.node(*id);
                node.kind().is_entity() && node.scope() == scope
            })
            .collect()
    }

    /// Whether `node` may be referenced from the current scope.
    ///
    /// Without a bound, the node must belong to the current scope or one of
    /// its ancestors. With a bound join point, a node of the current scope
    /// is visible only if its entity is declared no later than the join
    /// point; plain properties and composites are resolved to their entity.
    pub fn is_visible(&self, graph: &QueryGraph, node: NodeId, up_to: Option<NodeId>) -> bool {
        if !self.encloses(graph.node(node).scope(), self.current) {
            return false;
        }
        let Some(bound) = up_to else {
            return true;
        };
        let target = graph.nearest_entity(node);
        if graph.node(target).scope() != self.current {
            return true;
        }
        for declared in self.declaration_order(graph, self.current) {
            if declared == target {
                return true;
            }
            if declared == bound {
                return false;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::alias::AliasProvider;
    use crate::query::graph::{NodeKind, NodeSpec};

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

    #[test]
    fn test_visibility_without_bound() {
        let mut graph = QueryGraph::new();
        let mut aliases = AliasProvider::new("hobj");
        let mut scopes = ScopeTracker::new();

        let outer = graph.add_root("Person", aliases.next_alias(), scopes.current());
        scopes.add_root(outer);

        let sub = scopes.open();
        let inner = graph.add_root("Town", aliases.next_alias(), sub);
        scopes.add_root(inner);

        assert!(scopes.is_visible(&graph, outer, None));
        assert!(scopes.is_visible(&graph, inner, None));

        scopes.close(sub);
        assert_eq!(scopes.current(), ScopeId::ROOT);
        assert!(scopes.is_visible(&graph, outer, None));
        assert!(!scopes.is_visible(&graph, inner, None));
    }

    #[test]
    fn test_visibility_up_to_join_point() {
        let mut graph = QueryGraph::new();
        let mut aliases = AliasProvider::new("hobj");
        let mut scopes = ScopeTracker::new();
        let scope = scopes.current();

        let person = graph.add_root("Person", aliases.next_alias(), scope);
        scopes.add_root(person);
        let (town, _) = graph.get_or_create_child(person, "town", entity("Town"), &mut aliases, scope);
        let (car, _) = graph.get_or_create_child(person, "car", entity("Car"), &mut aliases, scope);
        let (car_name, _) = graph.get_or_create_child(car, "name", property(), &mut aliases, scope);
        let (town_name, _) = graph.get_or_create_child(town, "name", property(), &mut aliases, scope);
        let later_root = graph.add_root("Company", aliases.next_alias(), scope);
        scopes.add_root(later_root);

        assert!(scopes.is_visible(&graph, person, Some(town)));
        assert!(scopes.is_visible(&graph, town_name, Some(town)));
        assert!(!scopes.is_visible(&graph, car_name, Some(town)));
        assert!(!scopes.is_visible(&graph, later_root, Some(car)));
        assert!(scopes.is_visible(&graph, town_name, Some(car)));
    }

    #[test]
    fn test_declaration_order_skips_foreign_nodes() {
        let mut graph = QueryGraph::new();
        let mut aliases = AliasProvider::new("hobj");
        let mut scopes = ScopeTracker::new();

        let person = graph.add_root("Person", aliases.next_alias(), ScopeId::ROOT);
        scopes.add_root(person);
        let sub = scopes.open();
        let (town, _) = graph.get_or_create_child(person, "town", entity("Town"), &mut aliases, sub);
        scopes.attach(town);

        assert_eq!(scopes.declaration_order(&graph, sub), vec![town]);
        assert_eq!(scopes.declaration_order(&graph, ScopeId::ROOT), vec![person]);
        assert!(scopes.encloses(ScopeId::ROOT, sub));
        assert!(!scopes.encloses(sub, ScopeId::ROOT));
    }
}
