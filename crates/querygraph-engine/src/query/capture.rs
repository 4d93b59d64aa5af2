//! Placeholders and the pending-access buffer.
//!
//! A [`Placeholder`] is an opaque handle on a graph node; it never holds
//! domain data. Every property access made through
//! [`Query::get`](super::builder::Query::get) records a [`CaptureEvent`] in
//! [`PendingAccesses`], and the next join, restriction, projection, group or
//! order operation drains exactly one of them.

use querygraph_core::{QueryError, QueryResult};

use super::graph::{NodeId, NodeKind};

/// A path-recording handle on a query node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placeholder {
    node: NodeId,
    kind: NodeKind,
}

impl Placeholder {
    pub(crate) const fn new(node: NodeId, kind: NodeKind) -> Self {
        Self { node, kind }
    }

    /// The node this placeholder stands for.
    pub const fn node(self) -> NodeId {
        self.node
    }

    /// The kind of node this placeholder stands for.
    pub const fn kind(self) -> NodeKind {
        self.kind
    }

    /// Returns `true` for plain scalar properties.
    pub const fn is_scalar(self) -> bool {
        !self.kind.has_placeholder()
    }
}

/// A record that a property was accessed and now awaits consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    node: NodeId,
}

impl CaptureEvent {
    /// The node produced by the access.
    pub const fn node(self) -> NodeId {
        self.node
    }
}

/// The buffer of property accesses not yet consumed by an operation.
#[derive(Debug, Clone, Default)]
pub struct PendingAccesses {
    events: Vec<CaptureEvent>,
}

impl PendingAccesses {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `child` was reached from `parent`.
    ///
    /// Accessing a property of the node whose access is pending continues
    /// that chain: the pending event is replaced instead of appended.
    pub fn record(&mut self, parent: NodeId, child: NodeId) {
        match self.events.last_mut() {
            Some(last) if last.node == parent => last.node = child,
            _ => self.events.push(CaptureEvent { node: child }),
        }
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The pending events, oldest first.
    pub fn events(&self) -> &[CaptureEvent] {
        &self.events
    }

    /// Drains every pending event in recording order.
    pub fn dequeue_pending(&mut self) -> Vec<NodeId> {
        self.events.drain(..).map(|e| e.node).collect()
    }

    /// Drains the buffer, requiring that it held exactly one event.
    ///
    /// The buffer is cleared even when the count is wrong so that one bad
    /// call is reported once.
    pub fn dequeue_one(&mut self, operation: &'static str) -> QueryResult<NodeId> {
        let drained = self.dequeue_pending();
        match drained.as_slice() {
            [node] => Ok(*node),
            _ => Err(QueryError::PendingAccess {
                operation,
                found: drained.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::alias::AliasProvider;
    use crate::query::graph::{NodeSpec, QueryGraph};
    use crate::query::scope::ScopeId;

    fn nodes(count: usize) -> Vec<NodeId> {
        let mut graph = QueryGraph::new();
        let mut aliases = AliasProvider::new("hobj");
        let root = graph.add_root("Person", aliases.next_alias(), ScopeId::ROOT);
        let mut out = vec![root];
        for i in 0..count {
            let spec = NodeSpec {
                target_type: "String".into(),
                kind: NodeKind::Property,
                identifier: None,
            };
            out.push(graph.get_or_create_child(root, &format!("p{i}"), spec, &mut aliases, ScopeId::ROOT).0);
        }
        out
    }

    #[test]
    fn test_dequeue_one_exactly_one() {
        let n = nodes(1);
        let mut pending = PendingAccesses::new();
        pending.record(n[0], n[1]);
        assert_eq!(pending.dequeue_one("where").unwrap(), n[1]);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_dequeue_one_empty_fails() {
        let mut pending = PendingAccesses::new();
        assert_eq!(
            pending.dequeue_one("order by").unwrap_err(),
            QueryError::PendingAccess {
                operation: "order by",
                found: 0
            }
        );
    }

    #[test]
    fn test_dequeue_one_multiple_fails_and_clears() {
        let n = nodes(2);
        let mut pending = PendingAccesses::new();
        pending.record(n[0], n[1]);
        pending.record(n[0], n[2]);
        assert_eq!(pending.len(), 2);
        assert!(matches!(
            pending.dequeue_one("join"),
            Err(QueryError::PendingAccess { found: 2, .. })
        ));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_chained_access_replaces_event() {
        let n = nodes(2);
        let mut pending = PendingAccesses::new();
        pending.record(n[0], n[1]);
        pending.record(n[1], n[2]);
        assert_eq!(pending.events().len(), 1);
        assert_eq!(pending.dequeue_pending(), vec![n[2]]);
    }

    #[test]
    fn test_placeholder_scalar_flag() {
        let n = nodes(1);
        assert!(Placeholder::new(n[1], NodeKind::Property).is_scalar());
        assert!(!Placeholder::new(n[0], NodeKind::Root).is_scalar());
    }
}
