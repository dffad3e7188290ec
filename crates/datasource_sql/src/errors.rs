use crate::client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum DatasourceSqlError {
    #[error("Failed to execute query: {0}")]
    Client(#[from] ClientError),

    #[error("Row handler failed: {0}")]
    RowHandler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

pub type Result<T, E = DatasourceSqlError> = std::result::Result<T, E>;
