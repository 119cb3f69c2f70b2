use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, warn};

use super::config::PgConfig;
use super::executor::{Executor, QueryTarget};
use super::transaction::PgTransaction;
use crate::error::DbUtilsError;

/// One open Postgres connection.
///
/// Every operation takes this handle, so there is no way to run a statement
/// before a connection exists. Access from several tasks must be serialized by
/// the caller; beginning a transaction needs `&mut self`.
pub struct PgDatabase {
    client: Client,
    connection_task: JoinHandle<()>,
}

impl PgDatabase {
    /// Connect using `config`.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ConfigError` if required fields are missing or
    /// `DbUtilsError::ConnectionError` if the server cannot be reached.
    pub async fn open(config: &PgConfig) -> Result<Self, DbUtilsError> {
        let pg_config = config.to_tokio_config()?;
        let (client, connection) = pg_config.connect(NoTls).await.map_err(|e| {
            DbUtilsError::ConnectionError(format!("Failed to connect to Postgres: {e}"))
        })?;
        let connection_task = tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection ended with error");
            }
        });
        info!(
            host = config.host.as_deref().unwrap_or_default(),
            port = config.port.unwrap_or_default(),
            dbname = config.dbname.as_deref().unwrap_or_default(),
            "opened postgres connection"
        );
        Ok(Self {
            client,
            connection_task,
        })
    }

    /// Connect using a libpq key/value string or `postgres://` URL.
    ///
    /// # Errors
    /// See [`PgConfig::from_connection_string`] and [`PgDatabase::open`].
    pub async fn open_url(conn_str: &str) -> Result<Self, DbUtilsError> {
        let config = PgConfig::from_connection_string(conn_str)?;
        Self::open(&config).await
    }

    /// Close the connection and wait for the driver task to finish.
    ///
    /// # Errors
    /// Returns `DbUtilsError::Other` if the driver task panicked.
    pub async fn close(self) -> Result<(), DbUtilsError> {
        let Self {
            client,
            connection_task,
        } = self;
        drop(client);
        connection_task
            .await
            .map_err(|e| DbUtilsError::Other(format!("postgres connection task failed: {e}")))?;
        info!("closed postgres connection");
        Ok(())
    }

    /// Whether the server side of the connection has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Begin a transaction. Statements run through the returned handle until
    /// it is committed, rolled back, or dropped.
    ///
    /// # Errors
    /// Returns an error if `BEGIN` fails.
    pub async fn begin_transaction(&mut self) -> Result<PgTransaction<'_>, DbUtilsError> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(DbUtilsError::from_driver)?;
        debug!("transaction started");
        Ok(PgTransaction::new(tx))
    }

    /// The underlying driver client, for anything not covered here.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl Executor for PgDatabase {
    fn target(&self) -> QueryTarget<'_> {
        QueryTarget::Client(&self.client)
    }
}
