//! Convenient imports for common functionality.

pub use crate::convert::{CoercionError, FromRowValue, TargetKind, coerce};
pub use crate::error::DbUtilsError;
pub use crate::mapper::{
    FieldFailure, FieldMapping, FromResultRow, MappedRows, map_optional, map_row, map_rows,
    map_rows_collecting,
};
pub use crate::postgres::{
    Executor, PgConfig, PgDatabase, PgTransaction, QueryTarget, RowCursor,
};
pub use crate::results::{DataSet, ResultRow, ResultSet};
pub use crate::types::RowValues;
