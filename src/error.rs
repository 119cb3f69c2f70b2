use thiserror::Error;

use crate::convert::TargetKind;

#[derive(Debug, Error)]
pub enum DbUtilsError {
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// A cell could not be coerced into the declared type of a field.
    #[error("Cannot convert {from} to {to} for column '{column}' (row {row}): {message}")]
    Conversion {
        row: usize,
        column: String,
        from: &'static str,
        to: TargetKind,
        message: String,
    },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Other database error: {0}")]
    Other(String),
}

impl DbUtilsError {
    /// Driver errors caused by a dropped socket map to `ConnectionClosed`.
    pub(crate) fn from_driver(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            DbUtilsError::ConnectionClosed
        } else {
            DbUtilsError::PostgresError(err)
        }
    }
}
