use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Row, RowStream, SimpleQueryMessage, Statement, Transaction};
use tracing::debug;

use super::cursor::RowCursor;
use super::params::{Params, check_param_count};
use super::query::{build_dataset_from_simple, build_result_set_from_statement, postgres_extract_value};
use crate::convert::FromRowValue;
use crate::error::DbUtilsError;
use crate::mapper::{FromResultRow, map_rows};
use crate::results::{DataSet, ResultSet};
use crate::types::RowValues;

/// Where a statement runs: directly on the client, or inside an open transaction.
#[derive(Clone, Copy)]
pub enum QueryTarget<'a> {
    Client(&'a Client),
    Transaction(&'a Transaction<'a>),
}

impl QueryTarget<'_> {
    async fn prepare(&self, sql: &str) -> Result<Statement, tokio_postgres::Error> {
        match self {
            QueryTarget::Client(client) => client.prepare(sql).await,
            QueryTarget::Transaction(tx) => tx.prepare(sql).await,
        }
    }

    async fn query(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        match self {
            QueryTarget::Client(client) => client.query(stmt, params).await,
            QueryTarget::Transaction(tx) => tx.query(stmt, params).await,
        }
    }

    async fn execute(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        match self {
            QueryTarget::Client(client) => client.execute(stmt, params).await,
            QueryTarget::Transaction(tx) => tx.execute(stmt, params).await,
        }
    }

    async fn query_raw(
        &self,
        stmt: &Statement,
        params: &[RowValues],
    ) -> Result<RowStream, tokio_postgres::Error> {
        match self {
            QueryTarget::Client(client) => client.query_raw(stmt, params.iter()).await,
            QueryTarget::Transaction(tx) => tx.query_raw(stmt, params.iter()).await,
        }
    }

    async fn simple_query(
        &self,
        sql: &str,
    ) -> Result<Vec<SimpleQueryMessage>, tokio_postgres::Error> {
        match self {
            QueryTarget::Client(client) => client.simple_query(sql).await,
            QueryTarget::Transaction(tx) => tx.simple_query(sql).await,
        }
    }

    async fn batch_execute(&self, sql: &str) -> Result<(), tokio_postgres::Error> {
        match self {
            QueryTarget::Client(client) => client.batch_execute(sql).await,
            QueryTarget::Transaction(tx) => tx.batch_execute(sql).await,
        }
    }
}

/// Statement execution shared by [`PgDatabase`](super::PgDatabase) and
/// [`PgTransaction`](super::PgTransaction).
///
/// Parameters are positional (`$1`, `$2`, ...).
#[async_trait]
pub trait Executor: Send + Sync {
    fn target(&self) -> QueryTarget<'_>;

    /// Execute a statement and return the number of affected rows.
    ///
    /// # Errors
    /// Returns errors from preparation, parameter binding, or execution.
    async fn execute_non_query(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<usize, DbUtilsError> {
        debug!(sql, params = params.len(), "execute_non_query");
        let target = self.target();
        let stmt = target.prepare(sql).await.map_err(DbUtilsError::from_driver)?;
        let converted = Params::convert(params)?;
        let rows = target
            .execute(&stmt, converted.as_refs())
            .await
            .map_err(DbUtilsError::from_driver)?;
        usize::try_from(rows).map_err(|e| {
            DbUtilsError::ExecutionError(format!("Invalid rows affected count: {e}"))
        })
    }

    /// First column of the first row, or `RowValues::Null` when there is none.
    ///
    /// # Errors
    /// Returns errors from preparation, execution, or value extraction.
    async fn execute_scalar(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RowValues, DbUtilsError> {
        debug!(sql, params = params.len(), "execute_scalar");
        let (value, _) = query_scalar(self.target(), sql, params).await?;
        Ok(value)
    }

    /// [`execute_scalar`](Executor::execute_scalar) coerced to `T`.
    ///
    /// Use `Option<T>` when the result may be NULL or absent.
    ///
    /// # Errors
    /// Returns `DbUtilsError::Conversion` naming the first column if the value cannot be coerced.
    async fn execute_scalar_as<T>(&self, sql: &str, params: &[RowValues]) -> Result<T, DbUtilsError>
    where
        T: FromRowValue + Send,
    {
        debug!(sql, params = params.len(), "execute_scalar_as");
        let (value, column) = query_scalar(self.target(), sql, params).await?;
        T::from_row_value(&value).map_err(|e| e.at(0, &column))
    }

    /// Run a query and return a forward-only cursor over its rows.
    ///
    /// # Errors
    /// Returns errors from preparation or from starting the query.
    async fn execute_reader(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<RowCursor, DbUtilsError> {
        debug!(sql, params = params.len(), "execute_reader");
        check_param_count(params.len())?;
        let target = self.target();
        let stmt = target.prepare(sql).await.map_err(DbUtilsError::from_driver)?;
        let stream = target
            .query_raw(&stmt, params)
            .await
            .map_err(DbUtilsError::from_driver)?;
        Ok(RowCursor::new(&stmt, stream))
    }

    /// Run a query and materialize all rows.
    ///
    /// # Errors
    /// Returns errors from preparation, execution, or value extraction.
    async fn execute_table(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, DbUtilsError> {
        debug!(sql, params = params.len(), "execute_table");
        let target = self.target();
        let stmt = target.prepare(sql).await.map_err(DbUtilsError::from_driver)?;
        let converted = Params::convert(params)?;
        let rows = target
            .query(&stmt, converted.as_refs())
            .await
            .map_err(DbUtilsError::from_driver)?;
        build_result_set_from_statement(&stmt, &rows)
    }

    /// Run one or more statements and collect every returned table.
    ///
    /// Without parameters the SQL may hold several `;`-separated statements and
    /// cells come back as text. With parameters exactly one statement runs.
    ///
    /// # Errors
    /// Returns errors from execution or result building.
    async fn execute_dataset(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<DataSet, DbUtilsError> {
        if params.is_empty() {
            debug!(sql, "execute_dataset (simple protocol)");
            let messages = self
                .target()
                .simple_query(sql)
                .await
                .map_err(DbUtilsError::from_driver)?;
            return build_dataset_from_simple(messages);
        }
        let table = self.execute_table(sql, params).await?;
        let mut dataset = DataSet::new();
        // statements without a result description yield no table
        if !table.get_column_names().is_empty() {
            dataset.push(table);
        }
        Ok(dataset)
    }

    /// Run a query and map every row onto `T`.
    ///
    /// # Errors
    /// Returns errors from [`execute_table`](Executor::execute_table) or [`map_rows`].
    async fn execute_objects<T>(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Vec<T>, DbUtilsError>
    where
        T: FromResultRow + Send,
    {
        let table = self.execute_table(sql, params).await?;
        map_rows(&table)
    }

    /// Execute several parameterless statements in one round trip.
    ///
    /// # Errors
    /// Returns errors from execution.
    async fn execute_batch(&self, sql: &str) -> Result<(), DbUtilsError> {
        debug!(sql, "execute_batch");
        self.target()
            .batch_execute(sql)
            .await
            .map_err(DbUtilsError::from_driver)
    }
}

/// First cell of the first row plus the label of the first column.
///
/// Statements without result columns report `?column?`, the server's own
/// label for unnamed expressions.
async fn query_scalar(
    target: QueryTarget<'_>,
    sql: &str,
    params: &[RowValues],
) -> Result<(RowValues, String), DbUtilsError> {
    let stmt = target.prepare(sql).await.map_err(DbUtilsError::from_driver)?;
    let column = stmt
        .columns()
        .first()
        .map_or_else(|| "?column?".to_string(), |c| c.name().to_string());
    let converted = Params::convert(params)?;
    let rows = target
        .query(&stmt, converted.as_refs())
        .await
        .map_err(DbUtilsError::from_driver)?;
    let value = match rows.first() {
        Some(row) if !row.is_empty() => postgres_extract_value(row, 0)?,
        _ => RowValues::Null,
    };
    Ok((value, column))
}
