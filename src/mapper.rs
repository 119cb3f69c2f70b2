//! Name-based mapping of result rows onto caller-declared record types.
//!
//! A record type opts in by implementing [`FromResultRow`], usually through the
//! [`row_mapping!`](crate::row_mapping) macro:
//!
//! ```rust
//! use pg_dbutils::prelude::*;
//! use pg_dbutils::row_mapping;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     id: i32,
//!     name: String,
//!     active: Option<bool>,
//! }
//!
//! row_mapping!(Person {
//!     id: i32 => "Id",
//!     name: String => "Name",
//!     active: Option<bool> => "Active",
//! });
//!
//! let rs = ResultSet::from_rows(
//!     vec!["Id".into(), "Name".into(), "Active".into()],
//!     vec![vec![RowValues::Text("1".into()), RowValues::Text("Alice".into()), RowValues::Null]],
//! )
//! .unwrap();
//! let people: Vec<Person> = map_rows(&rs).unwrap();
//! assert_eq!(people[0], Person { id: 1, name: "Alice".into(), active: None });
//! ```

use tracing::trace;

use crate::convert::{CoercionError, TargetKind};
use crate::error::DbUtilsError;
use crate::results::{ResultRow, ResultSet};
use crate::types::RowValues;

/// Coerces a non-null cell and stores it in one field of `T`.
pub type AssignFn<T> = fn(&mut T, &RowValues) -> Result<(), CoercionError>;

/// One entry of a record type's mapping table.
pub struct FieldMapping<T> {
    /// Column name matched exactly (case-sensitive).
    pub column: &'static str,
    /// Effective storage type after unwrapping `Option`.
    pub kind: TargetKind,
    /// Whether the declared field type is `Option<_>`.
    pub nullable: bool,
    pub assign: AssignFn<T>,
}

/// A record type that rows can be mapped onto.
pub trait FromResultRow: Default + 'static {
    fn field_mappings() -> &'static [FieldMapping<Self>];
}

/// A field that failed to convert in [`map_rows_collecting`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFailure {
    pub row: usize,
    pub column: &'static str,
    pub error: CoercionError,
}

impl FieldFailure {
    #[must_use]
    pub fn into_error(self) -> DbUtilsError {
        self.error.at(self.row, self.column)
    }
}

/// Output of the collecting mode: every row plus the fields left at their defaults.
#[derive(Debug)]
pub struct MappedRows<T> {
    pub rows: Vec<T>,
    pub failures: Vec<FieldFailure>,
}

impl<T> MappedRows<T> {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

type Plan<T> = Vec<(usize, &'static FieldMapping<T>)>;

fn plan_for<T: FromResultRow>(lookup: impl Fn(&str) -> Option<usize>) -> Plan<T> {
    T::field_mappings()
        .iter()
        .filter_map(|field| lookup(field.column).map(|idx| (idx, field)))
        .collect()
}

fn populate<T, F>(row: &ResultRow, plan: &Plan<T>, mut on_failure: F) -> Result<T, DbUtilsError>
where
    T: FromResultRow,
    F: FnMut(&'static FieldMapping<T>, CoercionError) -> Result<(), DbUtilsError>,
{
    let mut target = T::default();
    for (idx, field) in plan {
        let Some(value) = row.get_by_index(*idx) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Err(err) = (field.assign)(&mut target, value) {
            on_failure(*field, err)?;
        }
    }
    Ok(target)
}

/// Map every row of `result` onto a fresh `T`, in row order.
///
/// Columns with no matching field are ignored; fields with no matching column,
/// or whose cell is NULL, keep their `Default` value.
///
/// # Errors
/// Returns `DbUtilsError::Conversion` for the first cell that cannot be coerced.
/// No rows are returned in that case.
pub fn map_rows<T: FromResultRow>(result: &ResultSet) -> Result<Vec<T>, DbUtilsError> {
    let plan = plan_for::<T>(|name| result.column_index(name));
    let mut mapped = Vec::with_capacity(result.len());
    for (row_idx, row) in result.iter().enumerate() {
        mapped.push(populate(row, &plan, |field, err| {
            Err(err.at(row_idx, field.column))
        })?);
    }
    trace!(
        rows = mapped.len(),
        matched_fields = plan.len(),
        "mapped result set"
    );
    Ok(mapped)
}

/// Like [`map_rows`], but an absent result maps to an empty vector.
///
/// # Errors
/// See [`map_rows`].
pub fn map_optional<T: FromResultRow>(result: Option<&ResultSet>) -> Result<Vec<T>, DbUtilsError> {
    match result {
        Some(result) => map_rows(result),
        None => Ok(Vec::new()),
    }
}

/// Map every row, leaving fields that fail to convert at their default and
/// reporting them instead of failing the whole call.
#[must_use]
pub fn map_rows_collecting<T: FromResultRow>(result: &ResultSet) -> MappedRows<T> {
    let plan = plan_for::<T>(|name| result.column_index(name));
    let mut rows = Vec::with_capacity(result.len());
    let mut failures = Vec::new();
    for (row_idx, row) in result.iter().enumerate() {
        let populated = populate(row, &plan, |field, error| {
            failures.push(FieldFailure {
                row: row_idx,
                column: field.column,
                error,
            });
            Ok(())
        });
        // The failure callback never returns Err, so neither does populate.
        if let Ok(value) = populated {
            rows.push(value);
        }
    }
    MappedRows { rows, failures }
}

/// Map a single row. `row_idx` is only used in error messages.
///
/// # Errors
/// Returns `DbUtilsError::Conversion` if a matched cell cannot be coerced.
pub fn map_row<T: FromResultRow>(row: &ResultRow, row_idx: usize) -> Result<T, DbUtilsError> {
    let plan = plan_for::<T>(|name| row.get_column_index(name));
    populate(row, &plan, |field, err| Err(err.at(row_idx, field.column)))
}

/// Implement [`FromResultRow`] for a struct by listing its mapped fields.
///
/// Each entry is `field: Type` (column named like the field) or
/// `field: Type => "Column"`. Fields not listed are never touched.
#[macro_export]
macro_rules! row_mapping {
    ($name:ident { $($field:ident : $ty:ty $(=> $column:literal)?),* $(,)? }) => {
        impl $crate::mapper::FromResultRow for $name {
            fn field_mappings() -> &'static [$crate::mapper::FieldMapping<Self>] {
                const FIELDS: &[$crate::mapper::FieldMapping<$name>] = &[
                    $(
                        $crate::mapper::FieldMapping {
                            column: $crate::__row_mapping_column!($field $(, $column)?),
                            kind: <$ty as $crate::convert::FromRowValue>::KIND,
                            nullable: <$ty as $crate::convert::FromRowValue>::NULLABLE,
                            assign: |target: &mut $name, value: &$crate::types::RowValues| {
                                target.$field =
                                    <$ty as $crate::convert::FromRowValue>::from_row_value(value)?;
                                Ok(())
                            },
                        },
                    )*
                ];
                FIELDS
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __row_mapping_column {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $column:literal) => {
        $column
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Item {
        id: i64,
        label: String,
        weight: Option<f64>,
    }

    crate::row_mapping!(Item {
        id: i64,
        label: String => "Label",
        weight: Option<f64>,
    });

    fn result(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
        ResultSet::from_rows(columns.iter().map(|c| (*c).to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn mapping_table_carries_metadata() {
        let fields = Item::field_mappings();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].column, "id");
        assert_eq!(fields[1].column, "Label");
        assert_eq!(fields[2].kind, TargetKind::Double);
        assert!(fields[2].nullable);
        assert!(!fields[0].nullable);
    }

    #[test]
    fn conversion_error_names_row_and_column() {
        let rs = result(
            &["id", "Label"],
            vec![
                vec![RowValues::Int(1), RowValues::Text("ok".into())],
                vec![RowValues::Text("x".into()), RowValues::Text("bad".into())],
            ],
        );
        let err = map_rows::<Item>(&rs).unwrap_err();
        match err {
            DbUtilsError::Conversion { row, column, from, to, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "id");
                assert_eq!(from, "text");
                assert_eq!(to, TargetKind::BigInt);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn collecting_mode_keeps_going() {
        let rs = result(
            &["id", "weight"],
            vec![
                vec![RowValues::Text("x".into()), RowValues::Float(1.5)],
                vec![RowValues::Int(2), RowValues::Text("heavy".into())],
            ],
        );
        let mapped = map_rows_collecting::<Item>(&rs);
        assert_eq!(mapped.rows.len(), 2);
        assert!(!mapped.is_complete());
        assert_eq!(mapped.failures.len(), 2);
        assert_eq!(mapped.failures[0].row, 0);
        assert_eq!(mapped.failures[0].column, "id");
        assert_eq!(mapped.failures[1].column, "weight");
        assert_eq!(mapped.rows[0], Item { id: 0, label: String::new(), weight: Some(1.5) });
        assert_eq!(mapped.rows[1], Item { id: 2, label: String::new(), weight: None });
    }

    #[test]
    fn single_row_mapping() {
        let rs = result(&["Label"], vec![vec![RowValues::Text("solo".into())]]);
        let item: Item = map_row(&rs.results[0], 0).unwrap();
        assert_eq!(item.label, "solo");
        assert_eq!(item.id, 0);
    }

    #[test]
    fn absent_result_is_empty() {
        let items = map_optional::<Item>(None).unwrap();
        assert!(items.is_empty());
    }
}
