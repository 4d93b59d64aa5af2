//! The execution seam: sessions run compiled queries and return rows.
//!
//! The engine never talks to a database itself. A [`Session`] receives the
//! compiled text and ordered parameters and hands back generic [`Row`]s;
//! [`FromValue`] provides typed access to their columns.

use async_trait::async_trait;
use querygraph_core::{QueryError, QueryResult};

use crate::query::compiler::CompiledQuery;
use crate::value::Value;

/// Runs compiled queries.
#[async_trait]
pub trait Session: Send + Sync {
    /// Executes `query` and returns every result row.
    async fn list(&self, query: &CompiledQuery) -> QueryResult<Vec<Row>>;
}

/// A generic result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from column names and values.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::SessionError`] if the lengths differ.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> QueryResult<Self> {
        if columns.len() != values.len() {
            return Err(QueryError::SessionError(format!(
                "Row has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist or the value cannot be
    /// converted to the requested type.
    pub fn get<T: FromValue>(&self, column: &str) -> QueryResult<T> {
        let value = self.get_value(column).ok_or_else(|| {
            QueryError::SessionError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value)
    }

    /// Gets a typed value by column index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or the value cannot be
    /// converted to the requested type.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> QueryResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            QueryError::SessionError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns the raw value of a column.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }
}

/// Conversion from a [`Value`] to a concrete Rust type.
pub trait FromValue: Sized {
    /// Attempts the conversion.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::SessionError`] on a type mismatch.
    fn from_value(value: &Value) -> QueryResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> QueryError {
    QueryError::SessionError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> QueryResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(mismatch("Int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Int(i) => Self::try_from(*i)
                .map_err(|_| QueryError::SessionError(format!("Integer {i} out of range for i32"))),
            other => Err(mismatch("Int", other)),
        }
    }
}

impl FromValue for f64 {
    #[allow(clippy::cast_precision_loss)]
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as Self),
            other => Err(mismatch("Float", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            other => Err(mismatch("Bool", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(mismatch("String", other)),
        }
    }
}

impl FromValue for uuid::Uuid {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => Self::parse_str(s)
                .map_err(|e| QueryError::SessionError(format!("Invalid UUID '{s}': {e}"))),
            other => Err(mismatch("Uuid", other)),
        }
    }
}

impl FromValue for chrono::NaiveDate {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            other => Err(mismatch("Date", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        Row::new(
            vec!["name".into(), "age".into(), "nickname".into()],
            vec![Value::from("Alice"), Value::Int(30), Value::Null],
        )
        .unwrap()
    }

    #[test]
    fn test_row_typed_access() {
        let r = row();
        assert_eq!(r.get::<String>("name").unwrap(), "Alice");
        assert_eq!(r.get::<i64>("age").unwrap(), 30);
        assert_eq!(r.get::<i32>("age").unwrap(), 30);
        assert_eq!(r.get::<f64>("age").unwrap(), 30.0);
        assert_eq!(r.get::<Option<String>>("nickname").unwrap(), None);
        assert_eq!(r.get_by_index::<String>(0).unwrap(), "Alice");
        assert_eq!(r.len(), 3);
    }

    #[test]
    fn test_row_errors() {
        let r = row();
        assert!(matches!(r.get::<i64>("missing"), Err(QueryError::SessionError(_))));
        assert!(matches!(r.get::<i64>("name"), Err(QueryError::SessionError(_))));
        assert!(r.get_by_index::<i64>(9).is_err());
        assert!(Row::new(vec!["a".into()], vec![]).is_err());
    }
}
