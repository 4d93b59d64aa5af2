//! Core error types for querygraph.
//!
//! This module provides the error enum [`QueryError`] that covers query
//! construction errors (capture, join, scope and metadata violations),
//! compile-time errors, configuration errors and errors reported by the
//! execution layer.

use thiserror::Error;

/// The primary error type for querygraph.
///
/// Construction errors are raised synchronously by the call that triggered
/// them; compile-time errors are raised by `compile`. Every variant carries
/// the offending path or alias so the failing call can be located.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    // ── Capture ──────────────────────────────────────────────────────

    /// An operation expected exactly one pending property access.
    #[error("{operation} expects exactly one pending property access, found {found}")]
    PendingAccess {
        /// The operation that drained the pending queue (e.g. "where").
        operation: &'static str,
        /// The number of pending accesses found.
        found: usize,
    },

    /// The handle passed to an operation is not the node whose access is pending.
    #[error("{operation} was given '{found}' but the pending access is '{expected}'")]
    CaptureMismatch {
        /// The operation that drained the pending queue.
        operation: &'static str,
        /// Path of the pending access.
        expected: String,
        /// Path of the handle passed to the operation.
        found: String,
    },

    /// Property accesses were left unconsumed at the end of construction.
    #[error("Unconsumed property access: {}", paths.join(", "))]
    DanglingAccess {
        /// Paths of the unconsumed accesses.
        paths: Vec<String>,
    },

    // ── Joins ────────────────────────────────────────────────────────

    /// A join type was set on a plain scalar property.
    #[error("Cannot join '{path}': it is a plain property")]
    JoinOnScalar {
        /// Path of the scalar node.
        path: String,
    },

    /// A join operation is not valid for the given node.
    #[error("Invalid join on '{path}': {reason}")]
    InvalidJoin {
        /// Path of the node.
        path: String,
        /// Why the join was rejected.
        reason: String,
    },

    /// A physical join is required but no join type could be resolved.
    #[error("Join type required for '{path}'")]
    JoinTypeRequired {
        /// Path of the unresolved join node.
        path: String,
    },

    // ── Scope ────────────────────────────────────────────────────────

    /// A node was referenced outside the scope it is visible in.
    #[error("'{path}' is not in scope {context}")]
    OutOfScope {
        /// Path of the referenced node.
        path: String,
        /// Where the reference was made.
        context: String,
    },

    // ── Metadata ─────────────────────────────────────────────────────

    /// The type is not a known entity.
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// The owner type has no such property.
    #[error("Unknown property '{property}' on {owner}")]
    UnknownProperty {
        /// The owning type.
        owner: String,
        /// The requested property name.
        property: String,
    },

    /// Property access on a node that has no properties.
    #[error("Cannot access properties of plain property '{path}'")]
    PropertyOnScalar {
        /// Path of the scalar node.
        path: String,
    },

    // ── Compilation ──────────────────────────────────────────────────

    /// A named parameter is referenced but was never bound.
    #[error("Parameter '{0}' is not bound")]
    UnboundParameter(String),

    /// The query is structurally invalid.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Execution ────────────────────────────────────────────────────

    /// The session failed to execute a compiled query.
    #[error("Session error: {0}")]
    SessionError(String),

    /// A query expected exactly one row but found none.
    #[error("No result: {0}")]
    NoResult(String),

    /// A query expected exactly one row but found several.
    #[error("Non-unique result: {0}")]
    NonUniqueResult(String),
}

impl QueryError {
    /// Returns `true` for errors raised while building or compiling a query,
    /// as opposed to configuration or execution errors.
    pub const fn is_construction_error(&self) -> bool {
        !matches!(
            self,
            Self::ConfigurationError(_)
                | Self::SessionError(_)
                | Self::NoResult(_)
                | Self::NonUniqueResult(_)
        )
    }
}

/// A convenience type alias for `Result<T, QueryError>`.
pub type QueryResult<T> = Result<T, QueryError>;
