use tokio_postgres::types::ToSql;

use crate::error::DbUtilsError;
use crate::types::RowValues;

/// Bind messages carry the parameter count in a 16-bit field.
pub const MAX_PARAMS: usize = u16::MAX as usize;

/// Reject parameter lists longer than the protocol allows.
///
/// # Errors
/// Returns `DbUtilsError::ParameterError` if there are more than [`MAX_PARAMS`] values.
pub fn check_param_count(len: usize) -> Result<(), DbUtilsError> {
    if len > MAX_PARAMS {
        return Err(DbUtilsError::ParameterError(format!(
            "{len} parameters exceeds the limit of {MAX_PARAMS}"
        )));
    }
    Ok(())
}

/// Borrowed view of `RowValues` in the form the driver binds.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    /// Convert from a slice of `RowValues` to Postgres parameters
    ///
    /// # Errors
    /// Returns `DbUtilsError::ParameterError` if there are more parameters than the protocol allows.
    pub fn convert(params: &'a [RowValues]) -> Result<Params<'a>, DbUtilsError> {
        check_param_count(params.len())?;
        let mut references = Vec::with_capacity(params.len());
        for p in params {
            references.push(p as &(dyn ToSql + Sync));
        }
        Ok(Params { references })
    }

    /// Get a reference to the underlying parameter array
    #[must_use]
    pub fn as_refs(&self) -> &[&'a (dyn ToSql + Sync)] {
        &self.references
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_in_order() {
        let values = vec![RowValues::Int(1), RowValues::Null];
        let params = Params::convert(&values).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.as_refs().len(), 2);
    }

    #[test]
    fn rejects_too_many() {
        let values = vec![RowValues::Null; MAX_PARAMS + 1];
        assert!(matches!(
            Params::convert(&values),
            Err(DbUtilsError::ParameterError(_))
        ));
        assert!(check_param_count(MAX_PARAMS).is_ok());
        assert!(matches!(
            check_param_count(MAX_PARAMS + 1),
            Err(DbUtilsError::ParameterError(msg)) if msg.starts_with("65536 parameters")
        ));
    }
}
