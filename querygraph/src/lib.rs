//! # querygraph
//!
//! Type-checked query graph construction and HQL-style query compilation.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Depend on `querygraph` for everything, or on the individual crates
//! for finer-grained control.

/// Errors, settings, and logging setup.
pub use querygraph_core as core;

/// Metadata, the query builder, the compiler, and the session seam.
pub use querygraph_engine as engine;

/// Fixture entities, a recording session, and query assertions.
#[cfg(feature = "testing")]
pub use querygraph_test as test;

/// Re-export of `async-trait` for implementing [`Session`](prelude::Session).
pub use async_trait;

/// Common imports for building and running queries.
pub mod prelude {
    pub use querygraph_core::{ParameterStyle, QueryError, QueryResult, Settings};
    pub use querygraph_engine::{
        AggregateFunc, Applicability, CompiledQuery, Comparison, Direction, Entity, EntityMeta,
        FromValue, JoinType, Metadata, MetadataRegistry, Placeholder, PropertyDef, Query, Row,
        Session, SubQuery, Value,
    };
}
