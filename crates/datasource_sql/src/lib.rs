//! Generic SQL datasource adapter.
//!
//! Translates backend-agnostic query descriptions — a filter tree,
//! sort/pagination options, projections, and update descriptors — into
//! parameterized SQL with dialect-specific positional placeholders, and
//! drives cursor-based streaming reads over large result sets. Values
//! are always bound, never interpolated into statement text.
//!
//! The wire client (connection pool, protocol) is consumed through the
//! traits in [`client`]; nothing in this crate talks to a database
//! directly.

pub mod client;
pub mod debug;
pub mod errors;
pub mod filter;
pub mod ident;
pub mod statement;
pub mod stream;
pub mod value;

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::trace;

use client::{BoxError, Client, ExecResult};
use errors::Result;
use ident::SnakeCase;

pub use filter::Filter;
pub use ident::{Identity, IdentStyle};
pub use statement::{
    CompiledStatement, Dialect, SelectOptions, SortOrder, UpdateDoc, UpdateOp,
};
pub use value::{BindValue, Row};

/// Adapter between the generic data-model layer and a SQL database
/// reachable through a [`Client`].
pub struct SqlAccessor {
    client: Arc<dyn Client>,
    idents: Arc<dyn IdentStyle>,
    dialect: Dialect,
    batch_size: usize,
}

impl SqlAccessor {
    /// Adapter with the default camelCase/snake_case field naming.
    pub fn new(client: Arc<dyn Client>, dialect: Dialect) -> Self {
        SqlAccessor {
            client,
            idents: Arc::new(SnakeCase),
            dialect,
            batch_size: stream::DEFAULT_BATCH_SIZE,
        }
    }

    /// Replace the field naming convention. Use [`Identity`] to disable
    /// conversion entirely.
    pub fn with_ident_style(mut self, idents: Arc<dyn IdentStyle>) -> Self {
        self.idents = idents;
        self
    }

    /// Rows pulled per round trip during streaming reads.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Fetch all rows matching the filter.
    pub async fn find(
        &self,
        table: &str,
        filter: Option<&Filter>,
        opts: &SelectOptions,
    ) -> Result<Vec<Row>> {
        let stmt = statement::build_select(table, filter, opts, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "find");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(result
            .rows
            .into_iter()
            .map(|row| self.idents.normalize_row(row))
            .collect())
    }

    /// Fetch a single row by exact key value.
    pub async fn find_by_key(
        &self,
        table: &str,
        key_field: &str,
        key: &Value,
        projection: Option<Vec<String>>,
    ) -> Result<Option<Row>> {
        let filter = Filter::Eq {
            field: key_field.to_string(),
            value: key.clone(),
        };
        let opts = SelectOptions {
            projection,
            limit: Some(1),
            ..Default::default()
        };
        let mut rows = self.find(table, Some(&filter), &opts).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    /// Stream matching rows through a suspending per-row handler. Each
    /// row's handler completes before the next row is delivered.
    /// Returns the number of rows delivered.
    pub async fn find_stream<F>(
        &self,
        table: &str,
        filter: Option<&Filter>,
        opts: &SelectOptions,
        handler: F,
    ) -> Result<u64>
    where
        F: FnMut(Row) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send,
    {
        let stmt = statement::build_select(table, filter, opts, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "find_stream");
        stream::stream_rows(
            self.client.as_ref(),
            &stmt,
            self.idents.as_ref(),
            self.batch_size,
            handler,
        )
        .await
    }

    /// [`find_stream`](Self::find_stream) for non-suspending handlers.
    pub async fn find_stream_sync<F>(
        &self,
        table: &str,
        filter: Option<&Filter>,
        opts: &SelectOptions,
        mut handler: F,
    ) -> Result<u64>
    where
        F: FnMut(Row) -> std::result::Result<(), BoxError> + Send,
    {
        self.find_stream(table, filter, opts, move |row| {
            futures::future::ready(handler(row)).boxed()
        })
        .await
    }

    /// Count rows matching the filter. Empty/null aggregates count as 0.
    pub async fn count(&self, table: &str, filter: Option<&Filter>) -> Result<u64> {
        let stmt = statement::build_count(table, filter, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "count");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(scalar(result, "count").as_u64().unwrap_or(0))
    }

    /// Sum a field over rows matching the filter. Empty/null aggregates
    /// sum to 0.
    pub async fn sum(&self, table: &str, field: &str, filter: Option<&Filter>) -> Result<f64> {
        let stmt =
            statement::build_sum(table, field, filter, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "sum");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(scalar(result, "sum").as_f64().unwrap_or(0.0))
    }

    /// Insert one row. When the primary key is null or absent the key
    /// is generated by the database and returned; a concrete key is
    /// inserted as-is and `None` is returned.
    pub async fn insert(&self, table: &str, row: &Row, key_field: &str) -> Result<Option<Value>> {
        let (stmt, generated_key) =
            statement::build_insert(table, row, key_field, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "insert");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        if !generated_key {
            return Ok(None);
        }
        Ok(result
            .rows
            .into_iter()
            .next()
            .map(|row| self.idents.normalize_row(row))
            .and_then(|mut row| row.remove(key_field)))
    }

    /// Insert rows one at a time, collecting the generated keys. A
    /// failure aborts the remaining rows; earlier inserts stay applied
    /// per their own statement-level outcome (no implicit transaction).
    pub async fn batch_insert(
        &self,
        table: &str,
        rows: &[Row],
        key_field: &str,
    ) -> Result<Vec<Option<Value>>> {
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(self.insert(table, row, key_field).await?);
        }
        Ok(keys)
    }

    /// Update one row by exact key value. An empty descriptor resolves
    /// without issuing a statement.
    pub async fn update(
        &self,
        table: &str,
        key_field: &str,
        key: &Value,
        update: &UpdateDoc,
    ) -> Result<()> {
        let Some(stmt) = statement::build_update(
            table,
            key_field,
            key,
            update,
            self.idents.as_ref(),
            self.dialect,
        )?
        else {
            return Ok(());
        };
        trace!(sql = %stmt.sql, "update");
        self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(())
    }

    /// Update every row matching the filter, returning the affected-row
    /// count. An empty descriptor resolves to 0 without issuing a
    /// statement.
    pub async fn update_many(
        &self,
        table: &str,
        filter: Option<&Filter>,
        update: &UpdateDoc,
    ) -> Result<u64> {
        let Some(stmt) = statement::build_update_many(
            table,
            filter,
            update,
            self.idents.as_ref(),
            self.dialect,
        )?
        else {
            return Ok(0);
        };
        trace!(sql = %stmt.sql, "update_many");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(result.affected)
    }

    /// Add `amount` to a numeric field of one keyed row.
    pub async fn increment(
        &self,
        table: &str,
        key_field: &str,
        key: &Value,
        field: &str,
        amount: &Value,
    ) -> Result<()> {
        let mut update = UpdateDoc::new();
        update.insert(field.to_string(), UpdateOp::Increment(amount.clone()));
        self.update(table, key_field, key, &update).await
    }

    /// Delete one row by exact key value, reporting whether it existed.
    pub async fn delete(&self, table: &str, key_field: &str, key: &Value) -> Result<bool> {
        let stmt =
            statement::build_delete(table, key_field, key, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "delete");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(result.affected > 0)
    }

    /// Delete every row matching the filter, returning the affected-row
    /// count.
    pub async fn delete_many(&self, table: &str, filter: Option<&Filter>) -> Result<u64> {
        let stmt =
            statement::build_delete_many(table, filter, self.idents.as_ref(), self.dialect)?;
        trace!(sql = %stmt.sql, "delete_many");
        let result = self.client.execute(&stmt.sql, &stmt.values).await?;
        Ok(result.affected)
    }
}

fn scalar(result: ExecResult, column: &str) -> Value {
    result
        .rows
        .into_iter()
        .next()
        .and_then(|mut row| row.remove(column))
        .unwrap_or(Value::Null)
}
