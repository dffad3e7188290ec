//! In-memory client for exercising the adapter without a database.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{Client, ClientError, Connection, Cursor, ExecResult};
use crate::value::{BindValue, Row};

/// Scripted in-memory [`Client`].
///
/// `execute` calls are recorded and answered from a FIFO of scripted
/// results (an empty result once the script runs dry). Cursors serve a
/// fixed row set in batch-sized slices, with counters for teardown
/// assertions and an optional injected read failure.
#[derive(Default)]
pub struct DebugClient {
    rows: Vec<Row>,
    responses: Mutex<VecDeque<ExecResult>>,
    executed: Mutex<Vec<(String, Vec<BindValue>)>>,
    fail_read_at: Option<usize>,
    batch_reads: Arc<AtomicUsize>,
    cursors_closed: Arc<AtomicUsize>,
    connections_released: Arc<AtomicUsize>,
}

impl DebugClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client whose cursors iterate the given rows.
    pub fn with_rows(rows: Vec<Row>) -> Self {
        DebugClient {
            rows,
            ..Default::default()
        }
    }

    /// Make the n-th `read_batch` call (1-based) fail.
    pub fn fail_read_at(mut self, read: usize) -> Self {
        self.fail_read_at = Some(read);
        self
    }

    /// Queue a result for the next `execute` call.
    pub fn push_result(&self, result: ExecResult) {
        self.responses.lock().push_back(result);
    }

    /// Statements executed so far, with their bound parameters.
    pub fn executed(&self) -> Vec<(String, Vec<BindValue>)> {
        self.executed.lock().clone()
    }

    pub fn batch_reads(&self) -> usize {
        self.batch_reads.load(Ordering::SeqCst)
    }

    pub fn cursors_closed(&self) -> usize {
        self.cursors_closed.load(Ordering::SeqCst)
    }

    pub fn connections_released(&self) -> usize {
        self.connections_released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Client for DebugClient {
    async fn execute(&self, sql: &str, params: &[BindValue]) -> Result<ExecResult, ClientError> {
        self.executed.lock().push((sql.to_string(), params.to_vec()));
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }

    async fn acquire(&self) -> Result<Box<dyn Connection>, ClientError> {
        Ok(Box::new(DebugConnection {
            rows: self.rows.clone(),
            fail_read_at: self.fail_read_at,
            batch_reads: Arc::clone(&self.batch_reads),
            cursors_closed: Arc::clone(&self.cursors_closed),
            connections_released: Arc::clone(&self.connections_released),
        }))
    }
}

struct DebugConnection {
    rows: Vec<Row>,
    fail_read_at: Option<usize>,
    batch_reads: Arc<AtomicUsize>,
    cursors_closed: Arc<AtomicUsize>,
    connections_released: Arc<AtomicUsize>,
}

#[async_trait]
impl Connection for DebugConnection {
    async fn open_cursor(
        &mut self,
        _sql: &str,
        _params: &[BindValue],
    ) -> Result<Box<dyn Cursor>, ClientError> {
        Ok(Box::new(DebugCursor {
            rows: self.rows.clone(),
            pos: 0,
            reads: 0,
            fail_read_at: self.fail_read_at,
            batch_reads: Arc::clone(&self.batch_reads),
            cursors_closed: Arc::clone(&self.cursors_closed),
        }))
    }

    async fn release(self: Box<Self>) -> Result<(), ClientError> {
        self.connections_released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct DebugCursor {
    rows: Vec<Row>,
    pos: usize,
    reads: usize,
    fail_read_at: Option<usize>,
    batch_reads: Arc<AtomicUsize>,
    cursors_closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Cursor for DebugCursor {
    async fn read_batch(&mut self, n: usize) -> Result<Vec<Row>, ClientError> {
        self.reads += 1;
        self.batch_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read_at == Some(self.reads) {
            return Err(ClientError::new("injected read failure"));
        }
        let end = (self.pos + n).min(self.rows.len());
        let batch = self.rows[self.pos..end].to_vec();
        self.pos = end;
        Ok(batch)
    }

    async fn close(self: Box<Self>) -> Result<(), ClientError> {
        self.cursors_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
