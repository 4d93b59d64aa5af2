//! A session that records compiled queries instead of executing them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use querygraph_core::QueryResult;
use querygraph_engine::query::CompiledQuery;
use querygraph_engine::{Row, Session};

/// A [`Session`] that records every query it receives.
///
/// Canned result sets queued with [`RecordingSession::push_rows`] are
/// returned in order; once they run out, queries return no rows.
#[derive(Debug, Default)]
pub struct RecordingSession {
    executed: Mutex<Vec<CompiledQuery>>,
    responses: Mutex<VecDeque<Vec<Row>>>,
    query_count: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingSession {
    /// Creates a session with no canned results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session whose first query returns `rows`.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        let session = Self::new();
        session.push_rows(rows);
        session
    }

    /// Queues the result of the next unanswered query.
    pub fn push_rows(&self, rows: Vec<Row>) {
        lock(&self.responses).push_back(rows);
    }

    /// Every query received so far, oldest first.
    pub fn executed(&self) -> Vec<CompiledQuery> {
        lock(&self.executed).clone()
    }

    /// The text of the most recent query.
    pub fn last_text(&self) -> Option<String> {
        lock(&self.executed).last().map(CompiledQuery::text)
    }

    /// Number of queries received since the last reset.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::SeqCst)
    }

    /// Resets the query counter.
    pub fn reset_query_count(&self) {
        self.query_count.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for RecordingSession {
    async fn list(&self, query: &CompiledQuery) -> QueryResult<Vec<Row>> {
        tracing::debug!(parameters = query.parameters.len(), "Recording query: {query}");
        self.query_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.executed).push(query.clone());
        Ok(lock(&self.responses).pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use querygraph_engine::Value;

    use super::*;

    fn compiled(text: &str) -> CompiledQuery {
        CompiledQuery {
            select: String::new(),
            from: text.to_string(),
            where_clause: String::new(),
            group_by: String::new(),
            order_by: String::new(),
            parameters: Vec::new(),
            result_shape: None,
        }
    }

    #[tokio::test]
    async fn test_records_and_replays() {
        let row = Row::new(vec!["n".into()], vec![Value::Int(1)]).unwrap();
        let session = RecordingSession::with_rows(vec![row.clone()]);

        let first = session.list(&compiled("from Person hobj1")).await.unwrap();
        let second = session.list(&compiled("from Town hobj1")).await.unwrap();

        assert_eq!(first, vec![row]);
        assert!(second.is_empty());
        assert_eq!(session.query_count(), 2);
        assert_eq!(session.executed().len(), 2);
        assert_eq!(session.last_text().as_deref(), Some("from Town hobj1"));

        session.reset_query_count();
        assert_eq!(session.query_count(), 0);
    }
}
