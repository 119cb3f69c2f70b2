use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::TryStreamExt;
use tokio_postgres::{RowStream, Statement};

use super::query::extract_row_values;
use crate::error::DbUtilsError;
use crate::mapper::{FromResultRow, map_row};
use crate::results::{ResultRow, ResultSet, build_column_index};

/// Forward-only reader over the rows of a running query.
///
/// Rows are pulled from the server as they are read; nothing is buffered
/// beyond what the driver holds.
pub struct RowCursor {
    stream: Pin<Box<RowStream>>,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    position: usize,
}

impl RowCursor {
    pub(crate) fn new(stmt: &Statement, stream: RowStream) -> Self {
        let names: Vec<String> = stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let column_index = Arc::new(build_column_index(&names));
        Self {
            stream: Box::pin(stream),
            column_names: Arc::new(names),
            column_index,
            position: 0,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Number of rows read so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Rows reported by the server once the stream is exhausted.
    #[must_use]
    pub fn rows_affected(&self) -> Option<u64> {
        self.stream.rows_affected()
    }

    /// Read the next row, or `None` at the end of the result.
    ///
    /// # Errors
    /// Returns driver errors or value extraction errors.
    pub async fn next_row(&mut self) -> Result<Option<ResultRow>, DbUtilsError> {
        let Some(row) = self
            .stream
            .try_next()
            .await
            .map_err(DbUtilsError::from_driver)?
        else {
            return Ok(None);
        };
        self.position += 1;
        Ok(Some(ResultRow {
            column_names: Arc::clone(&self.column_names),
            values: extract_row_values(&row)?,
            column_index: Arc::clone(&self.column_index),
        }))
    }

    /// Read the next row and map it onto `T`.
    ///
    /// # Errors
    /// Returns errors from [`next_row`](Self::next_row) or `DbUtilsError::Conversion`.
    pub async fn map_next<T: FromResultRow>(&mut self) -> Result<Option<T>, DbUtilsError> {
        let row_idx = self.position;
        match self.next_row().await? {
            Some(row) => map_row(&row, row_idx).map(Some),
            None => Ok(None),
        }
    }

    /// Drain the remaining rows into a `ResultSet`.
    ///
    /// `rows_affected` on the result is the count the server reported.
    ///
    /// # Errors
    /// Returns errors from [`next_row`](Self::next_row).
    pub async fn into_result_set(mut self) -> Result<ResultSet, DbUtilsError> {
        let mut result_set = ResultSet::new(self.column_names.as_ref().clone());
        while let Some(row) = self.next_row().await? {
            result_set.add_row_values(row.values)?;
        }
        if let Some(reported) = self.rows_affected() {
            result_set.rows_affected = usize::try_from(reported).map_err(|e| {
                DbUtilsError::ExecutionError(format!("Invalid rows affected count: {e}"))
            })?;
        }
        Ok(result_set)
    }
}
