use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies one submitted query for the lifetime of an engine.
pub type QueryId = u64;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query failed: {0}")]
    Execution(String),
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("column `{column}` row {row}: expected {expected}")]
    ColumnType {
        column: String,
        row: usize,
        expected: &'static str,
    },
    #[error("engine disconnected")]
    Disconnected,
}

/// One cell of a result row. Engines declare each column's kind up front;
/// consumers read cells through the typed accessors on [`QueryResult`],
/// which turn kind mismatches into [`QueryError::ColumnType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Long(i64),
    Double(f64),
    Str(String),
    Null,
}

/// Columnar result set for one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryResult {
    pub fn new(columns: &[&str]) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<SqlValue>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, name: &str) -> Result<usize, QueryError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
    }

    fn cell(&self, row: usize, col: usize) -> &SqlValue {
        static NULL: SqlValue = SqlValue::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&NULL)
    }

    /// Read a non-null signed 64-bit integer cell.
    pub fn long(&self, row: usize, column: &str) -> Result<i64, QueryError> {
        let col = self.column_index(column)?;
        match self.cell(row, col) {
            SqlValue::Long(v) => Ok(*v),
            _ => Err(QueryError::ColumnType {
                column: column.to_string(),
                row,
                expected: "integer",
            }),
        }
    }

    /// Read a nullable signed 64-bit integer cell.
    pub fn opt_long(&self, row: usize, column: &str) -> Result<Option<i64>, QueryError> {
        let col = self.column_index(column)?;
        match self.cell(row, col) {
            SqlValue::Long(v) => Ok(Some(*v)),
            SqlValue::Null => Ok(None),
            _ => Err(QueryError::ColumnType {
                column: column.to_string(),
                row,
                expected: "nullable integer",
            }),
        }
    }

    /// Read a numeric cell, widening integers.
    pub fn double(&self, row: usize, column: &str) -> Result<f64, QueryError> {
        let col = self.column_index(column)?;
        match self.cell(row, col) {
            SqlValue::Double(v) => Ok(*v),
            SqlValue::Long(v) => Ok(*v as f64),
            _ => Err(QueryError::ColumnType {
                column: column.to_string(),
                row,
                expected: "number",
            }),
        }
    }

    /// Read a non-null string cell.
    pub fn str(&self, row: usize, column: &str) -> Result<&str, QueryError> {
        let col = self.column_index(column)?;
        match self.cell(row, col) {
            SqlValue::Str(v) => Ok(v),
            _ => Err(QueryError::ColumnType {
                column: column.to_string(),
                row,
                expected: "string",
            }),
        }
    }

    /// Read a nullable string cell.
    pub fn opt_str(&self, row: usize, column: &str) -> Result<Option<&str>, QueryError> {
        let col = self.column_index(column)?;
        match self.cell(row, col) {
            SqlValue::Str(v) => Ok(Some(v)),
            SqlValue::Null => Ok(None),
            _ => Err(QueryError::ColumnType {
                column: column.to_string(),
                row,
                expected: "nullable string",
            }),
        }
    }
}

/// A finished query, delivered through [`Engine::drain`].
#[derive(Debug, Clone)]
pub struct QueryCompletion {
    pub id: QueryId,
    pub result: Result<QueryResult, QueryError>,
}

/// The opaque trace-query service.
///
/// Submission is non-blocking; results surface later through `drain`,
/// possibly out of submission order. The core builds SQL text and reads
/// rows — it never parses SQL or assumes anything about execution.
///
/// Execution is cooperative and single-threaded: the frame pump calls
/// `drain` between frames, so completions become visible only at frame
/// boundaries no matter when the engine finished the work.
pub trait Engine {
    fn submit(&mut self, sql: String) -> QueryId;

    /// Take every completion that has arrived since the last drain.
    fn drain(&mut self) -> Vec<QueryCompletion>;

    /// Number of submitted queries with no completion yet.
    fn pending(&self) -> usize;
}
