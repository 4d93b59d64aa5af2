//! Per-scope clause storage: projections, restrictions, grouping and ordering.

use indexmap::IndexMap;

use super::expressions::{AggregateFunc, Operand};
use super::graph::NodeId;
use super::restrictions::RestrictionClause;

/// One item of the `select` list.
#[derive(Debug, Clone)]
pub enum Projection {
    /// A captured node.
    Node(NodeId),
    /// An aggregate over a captured node.
    Aggregate {
        /// The aggregate function.
        func: AggregateFunc,
        /// Whether only distinct values are aggregated.
        distinct: bool,
        /// The aggregated node.
        node: NodeId,
    },
    /// An expression.
    Expression(Operand),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// Returns the direction keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One `order by` item.
#[derive(Debug, Clone)]
pub struct OrderItem {
    /// What is ordered on.
    pub operand: Operand,
    /// Sort direction.
    pub direction: Direction,
}

/// Everything one scope declares besides its nodes.
#[derive(Debug, Clone, Default)]
pub struct Clauses {
    /// `select` items in call order.
    pub projections: Vec<Projection>,
    /// `select distinct`.
    pub distinct: bool,
    /// `where` restrictions, combined with `and`.
    pub restrictions: Vec<RestrictionClause>,
    /// `with` restrictions per explicitly joined node.
    pub join_conditions: IndexMap<NodeId, Vec<RestrictionClause>>,
    /// `group by` items.
    pub group_by: Vec<Operand>,
    /// `order by` items.
    pub order_by: Vec<OrderItem>,
}

impl Clauses {
    /// `with` restrictions attached to `node`.
    pub fn conditions_for(&self, node: NodeId) -> &[RestrictionClause] {
        self.join_conditions.get(&node).map_or(&[], Vec::as_slice)
    }
}
