//! # querygraph-test
//!
//! Testing utilities for the querygraph workspace. Provides a small mapped
//! domain ([`fixtures`]), a [`Session`](querygraph_engine::Session) that
//! records every compiled query instead of executing it ([`recording`]), and
//! assertion helpers over the recorded queries ([`assert_queries`]).

pub mod assert_queries;
pub mod fixtures;
pub mod recording;

pub use assert_queries::{assert_max_queries, assert_num_queries};
pub use recording::RecordingSession;
