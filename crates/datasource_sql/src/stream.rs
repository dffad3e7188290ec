//! Cursor-driven streaming reads.
//!
//! Pages through a result set in fixed-size batches over a server-side
//! cursor, delivering rows to a caller-supplied handler one at a time.
//! The handler may suspend; a row's handler always completes before the
//! next row is delivered. The cursor is closed and the connection
//! released exactly once, in that order, on every path out of the loop.

use futures::future::BoxFuture;
use tracing::warn;

use crate::client::{BoxError, Client};
use crate::errors::{DatasourceSqlError, Result};
use crate::ident::IdentStyle;
use crate::statement::CompiledStatement;
use crate::value::Row;

/// Rows pulled from the server per round trip.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Drive a streaming read over `stmt`, returning the number of rows
/// delivered to the handler.
///
/// A batch shorter than `batch_size` (including an empty one) signals
/// exhaustion. Batch-read failures and handler failures both stop the
/// pull loop and surface after teardown; teardown failures themselves
/// are logged and swallowed so the original error reaches the caller.
pub(crate) async fn stream_rows<F>(
    client: &dyn Client,
    stmt: &CompiledStatement,
    idents: &dyn IdentStyle,
    batch_size: usize,
    mut on_row: F,
) -> Result<u64>
where
    F: FnMut(Row) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send,
{
    let mut conn = client.acquire().await?;
    let mut cursor = match conn.open_cursor(&stmt.sql, &stmt.values).await {
        Ok(cursor) => cursor,
        Err(e) => {
            if let Err(release_err) = conn.release().await {
                warn!(%release_err, "failed to release connection after cursor open failure");
            }
            return Err(e.into());
        }
    };

    let mut delivered = 0u64;
    let mut failure = None;
    'pull: loop {
        let batch = match cursor.read_batch(batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                failure = Some(DatasourceSqlError::Client(e));
                break;
            }
        };
        let exhausted = batch.len() < batch_size;
        for row in batch {
            if let Err(e) = on_row(idents.normalize_row(row)).await {
                failure = Some(DatasourceSqlError::RowHandler(e));
                break 'pull;
            }
            delivered += 1;
        }
        if exhausted {
            break;
        }
    }

    // Cursor first, then the connection, exactly once each.
    if let Err(e) = cursor.close().await {
        warn!(%e, "failed to close cursor");
    }
    if let Err(e) = conn.release().await {
        warn!(%e, "failed to release connection");
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(delivered),
    }
}
