//! Query counting assertions.
//!
//! Provides [`assert_num_queries`] which counts the queries a
//! [`RecordingSession`] receives during an async closure and asserts that the
//! count matches an expected value.
//!
//! ## Example
//!
//! ```rust,no_run
//! use querygraph_engine::Query;
//! use querygraph_test::assert_queries::assert_num_queries;
//! use querygraph_test::fixtures::{registry, Person};
//! use querygraph_test::RecordingSession;
//!
//! async fn example() {
//!     let registry = registry();
//!     let session = RecordingSession::new();
//!     let mut q = Query::new(&registry);
//!     q.from::<Person>().unwrap();
//!
//!     assert_num_queries(&session, 1, || async {
//!         q.list(&session).await.unwrap();
//!     })
//!     .await;
//! }
//! ```

use std::future::Future;

use crate::recording::RecordingSession;

/// Asserts that exactly `expected_count` queries are run during the async
/// closure.
///
/// # Panics
///
/// Panics if the number of queries does not match `expected_count`.
pub async fn assert_num_queries<F, Fut>(session: &RecordingSession, expected_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    session.reset_query_count();
    f().await;
    let actual = session.query_count();
    assert_eq!(
        actual, expected_count,
        "Expected {expected_count} queries, but {actual} were executed"
    );
}

/// Asserts that at most `max_count` queries are run during the async closure.
///
/// # Panics
///
/// Panics if more than `max_count` queries are run.
pub async fn assert_max_queries<F, Fut>(session: &RecordingSession, max_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    session.reset_query_count();
    f().await;
    let actual = session.query_count();
    assert!(
        actual <= max_count,
        "Expected at most {max_count} queries, but {actual} were executed"
    );
}

#[cfg(test)]
mod tests {
    use querygraph_core::Settings;
    use querygraph_engine::Query;

    use super::*;
    use crate::fixtures::{registry, Person};

    #[tokio::test]
    async fn test_assert_num_queries_counts_lists() {
        let registry = registry();
        let session = RecordingSession::new();
        let mut q = Query::with_settings(&registry, Settings::default());
        q.from::<Person>().unwrap();

        assert_num_queries(&session, 2, || async {
            q.list(&session).await.unwrap();
            q.list(&session).await.unwrap();
        })
        .await;
        assert_max_queries(&session, 0, || async {}).await;
    }

    #[tokio::test]
    #[should_panic(expected = "Expected 0 queries, but 1 were executed")]
    async fn test_assert_num_queries_panics_on_mismatch() {
        let registry = registry();
        let session = RecordingSession::new();
        let mut q = Query::with_settings(&registry, Settings::default());
        q.from::<Person>().unwrap();

        assert_num_queries(&session, 0, || async {
            q.list(&session).await.unwrap();
        })
        .await;
    }
}
