//! Execution boundary consumed by the adapter.
//!
//! The connection pool and wire protocol live behind these traits. The
//! adapter only ever hands over finished statements with bound
//! parameters; it never interpolates values into SQL text.

use async_trait::async_trait;

use crate::value::{BindValue, Row};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Diagnostic surfaced by the underlying driver on malformed SQL,
/// constraint violations, or connection loss. Passed through to the
/// caller unmodified; retry policy belongs to the driver or the caller.
#[derive(Debug, thiserror::Error)]
#[error("Query failed: {source}")]
pub struct ClientError {
    #[from]
    source: BoxError,
}

impl ClientError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        ClientError {
            source: source.into(),
        }
    }
}

/// Result of executing a single statement to completion.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Rows returned by the statement, in result-set order.
    pub rows: Vec<Row>,
    /// Rows matched/affected by a write statement.
    pub affected: u64,
}

#[async_trait]
pub trait Client: Send + Sync {
    /// Execute a statement to completion on a pooled connection.
    async fn execute(&self, sql: &str, params: &[BindValue]) -> Result<ExecResult, ClientError>;

    /// Acquire a dedicated connection for cursor use.
    async fn acquire(&self) -> Result<Box<dyn Connection>, ClientError>;
}

#[async_trait]
pub trait Connection: Send {
    /// Open a server-side cursor over the given statement.
    async fn open_cursor(
        &mut self,
        sql: &str,
        params: &[BindValue],
    ) -> Result<Box<dyn Cursor>, ClientError>;

    /// Return the connection to the pool.
    async fn release(self: Box<Self>) -> Result<(), ClientError>;
}

#[async_trait]
pub trait Cursor: Send {
    /// Pull up to `n` rows. An empty batch signals exhaustion.
    async fn read_batch(&mut self, n: usize) -> Result<Vec<Row>, ClientError>;

    /// Close the server-side cursor.
    async fn close(self: Box<Self>) -> Result<(), ClientError>;
}
