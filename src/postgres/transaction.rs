use tokio_postgres::Transaction;
use tracing::debug;

use super::executor::{Executor, QueryTarget};
use crate::error::DbUtilsError;

/// An open transaction on a [`PgDatabase`](super::PgDatabase).
///
/// Dropping it without calling [`commit`](Self::commit) rolls it back.
pub struct PgTransaction<'a> {
    tx: Transaction<'a>,
}

impl<'a> PgTransaction<'a> {
    pub(crate) fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    /// Commit the transaction.
    ///
    /// # Errors
    /// Returns an error if commit fails.
    pub async fn commit(self) -> Result<(), DbUtilsError> {
        self.tx.commit().await.map_err(DbUtilsError::from_driver)?;
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// # Errors
    /// Returns an error if rollback fails.
    pub async fn rollback(self) -> Result<(), DbUtilsError> {
        self.tx.rollback().await.map_err(DbUtilsError::from_driver)?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Mark a point that [`rollback_to_savepoint`](Self::rollback_to_savepoint) can return to.
    ///
    /// # Errors
    /// Returns `DbUtilsError::InvalidIdentifier` for an unusable name, or driver errors.
    pub async fn create_savepoint(&self, name: &str) -> Result<(), DbUtilsError> {
        self.savepoint_command("SAVEPOINT", name).await
    }

    /// Undo everything after the named savepoint; the savepoint stays usable.
    ///
    /// # Errors
    /// Returns `DbUtilsError::InvalidIdentifier` for an unusable name, or driver errors.
    pub async fn rollback_to_savepoint(&self, name: &str) -> Result<(), DbUtilsError> {
        self.savepoint_command("ROLLBACK TO SAVEPOINT", name).await
    }

    /// Forget the named savepoint, keeping its changes.
    ///
    /// # Errors
    /// Returns `DbUtilsError::InvalidIdentifier` for an unusable name, or driver errors.
    pub async fn release_savepoint(&self, name: &str) -> Result<(), DbUtilsError> {
        self.savepoint_command("RELEASE SAVEPOINT", name).await
    }

    async fn savepoint_command(&self, command: &str, name: &str) -> Result<(), DbUtilsError> {
        let sql = format!("{command} {}", quote_identifier(name)?);
        debug!(sql = %sql, "savepoint");
        self.tx
            .batch_execute(&sql)
            .await
            .map_err(DbUtilsError::from_driver)
    }
}

impl Executor for PgTransaction<'_> {
    fn target(&self) -> QueryTarget<'_> {
        QueryTarget::Transaction(&self.tx)
    }
}

/// Quote `name` as a Postgres identifier, doubling embedded quotes.
///
/// # Errors
/// Returns `DbUtilsError::InvalidIdentifier` if `name` is empty or contains NUL.
pub fn quote_identifier(name: &str) -> Result<String, DbUtilsError> {
    if name.is_empty() {
        return Err(DbUtilsError::InvalidIdentifier(
            "identifier must not be empty".to_string(),
        ));
    }
    if name.contains('\0') {
        return Err(DbUtilsError::InvalidIdentifier(format!(
            "identifier contains NUL: {name:?}"
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_and_embedded() {
        assert_eq!(quote_identifier("sp1").unwrap(), "\"sp1\"");
        assert_eq!(quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
        assert_eq!(
            quote_identifier("x; DROP TABLE t").unwrap(),
            "\"x; DROP TABLE t\""
        );
    }

    #[test]
    fn rejects_empty_and_nul() {
        assert!(matches!(
            quote_identifier(""),
            Err(DbUtilsError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            quote_identifier("a\0b"),
            Err(DbUtilsError::InvalidIdentifier(_))
        ));
    }
}
