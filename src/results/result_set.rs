use std::collections::HashMap;
use std::sync::Arc;

use super::row::{ResultRow, build_column_index};
use crate::error::DbUtilsError;
use crate::types::RowValues;

/// A materialized query result: named columns and ordered rows.
///
/// Row order is the order the server returned them in.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<ResultRow>,
    /// The number of rows affected (for DML statements) or returned
    pub rows_affected: usize,
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set with the given columns
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    /// Create an empty result set with preallocated room for `capacity` rows
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        let column_index = Arc::new(build_column_index(&column_names));
        ResultSet {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
            column_names: Arc::new(column_names),
            column_index,
        }
    }

    /// Build a result set from column names and row values in one go.
    ///
    /// # Errors
    /// Returns `DbUtilsError::ExecutionError` if a row's width differs from the column count.
    pub fn from_rows<I>(column_names: Vec<String>, rows: I) -> Result<Self, DbUtilsError>
    where
        I: IntoIterator<Item = Vec<RowValues>>,
    {
        let rows = rows.into_iter();
        let mut result_set = Self::with_capacity(column_names, rows.size_hint().0);
        for row in rows {
            result_set.add_row_values(row)?;
        }
        Ok(result_set)
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn get_column_names(&self) -> &Arc<Vec<String>> {
        &self.column_names
    }

    /// Position of the first column with exactly this name
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.column_index.get(column_name).copied()
    }

    /// Whether a column with exactly this name exists
    #[must_use]
    pub fn contains_column(&self, column_name: &str) -> bool {
        self.column_index.contains_key(column_name)
    }

    /// Add a row to the result set
    ///
    /// # Errors
    /// Returns `DbUtilsError::ExecutionError` if the row's width differs from the column count.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) -> Result<(), DbUtilsError> {
        if row_values.len() != self.column_names.len() {
            return Err(DbUtilsError::ExecutionError(format!(
                "row has {} values but result set has {} columns",
                row_values.len(),
                self.column_names.len()
            )));
        }
        self.results.push(ResultRow {
            column_names: Arc::clone(&self.column_names),
            values: row_values,
            column_index: Arc::clone(&self.column_index),
        });
        self.rows_affected += 1;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn rows_share_column_metadata() {
        let rs = ResultSet::from_rows(
            cols(&["id", "name"]),
            vec![
                vec![RowValues::Int(1), RowValues::Text("a".into())],
                vec![RowValues::Int(2), RowValues::Text("b".into())],
            ],
        )
        .unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.rows_affected, 2);
        assert!(Arc::ptr_eq(
            &rs.results[0].column_names,
            &rs.results[1].column_names
        ));
        assert_eq!(rs.results[1].get("name").unwrap().as_text(), Some("b"));
        assert!(rs.contains_column("id"));
        assert!(!rs.contains_column("ID"));
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let mut rs = ResultSet::new(cols(&["id"]));
        let err = rs
            .add_row_values(vec![RowValues::Int(1), RowValues::Int(2)])
            .unwrap_err();
        assert!(matches!(err, DbUtilsError::ExecutionError(_)));
        assert!(rs.is_empty());
    }
}
