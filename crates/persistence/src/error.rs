use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("scylla connection error: {0}")]
    Connection(#[from] scylla::transport::errors::NewSessionError),

    #[error("scylla query error: {0}")]
    Query(#[from] scylla::transport::errors::QueryError),

    #[error("row parse error: {0}")]
    RowParse(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
