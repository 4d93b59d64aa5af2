//! Query construction and compilation.
//!
//! This module contains the complete query pipeline:
//!
//! - [`alias`] - Query-scoped alias generation
//! - [`graph`] - The node arena and join resolution
//! - [`capture`] - Placeholders and pending property accesses
//! - [`scope`] - Sub-query scopes and visibility
//! - [`expressions`] - Operands, value expressions, and parameter binding
//! - [`restrictions`] - Restriction trees and conditional applicability
//! - [`clauses`] - Projections, grouping, and ordering
//! - [`builder`] - The [`Query`] builder
//! - [`compiler`] - Rendering to text plus ordered parameters

pub mod alias;
pub mod builder;
pub mod capture;
pub mod clauses;
pub mod compiler;
pub mod expressions;
pub mod graph;
pub mod restrictions;
pub mod scope;

pub use alias::{Alias, AliasProvider};
pub use builder::{Condition, Query, SubQuery};
pub use capture::{CaptureEvent, PendingAccesses, Placeholder};
pub use clauses::{Direction, OrderItem, Projection};
pub use compiler::{CompiledQuery, QueryCompiler, ResultShape};
pub use expressions::{
    Aggregate, AggregateFunc, Function, Literal, Operand, Parameter, Raw, RenderContext,
    ValueExpression,
};
pub use graph::{JoinType, NodeId, NodeKind, QueryGraph, QueryNode};
pub use restrictions::{Applicability, Comparison, Junction, Restriction, RestrictionClause};
pub use scope::{ScopeId, ScopeTracker};
