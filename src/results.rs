//! In-memory tabular results: rows, result sets and multi-table data sets.

mod dataset;
mod result_set;
mod row;

pub use dataset::DataSet;
pub use result_set::ResultSet;
pub use row::ResultRow;

pub(crate) use row::build_column_index;
