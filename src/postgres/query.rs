use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::Type;
use tokio_postgres::{Row, SimpleQueryMessage, Statement};
use uuid::Uuid;

use crate::error::DbUtilsError;
use crate::results::{DataSet, ResultSet};
use crate::types::RowValues;

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `DbUtilsError` if the column cannot be read as the Rust type its
/// Postgres type maps to.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, DbUtilsError> {
    let type_info = row.columns()[idx].type_();

    let value = match *type_info {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float),
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(RowValues::Null, RowValues::Timestamp),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob),
        // exact decimal text; trailing zeros dropped so whole numbers parse as integers
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map_or(RowValues::Null, |d| RowValues::Text(d.normalize().to_string())),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map_or(RowValues::Null, |u| RowValues::Text(u.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map_or(RowValues::Null, |t| RowValues::Text(t.to_string())),
        _ => {
            // text, varchar, bpchar, name, unknown and anything else the
            // driver can hand back as a string
            let val: Option<String> = row.try_get(idx).map_err(|e| {
                DbUtilsError::ExecutionError(format!(
                    "unsupported column type '{}' for column '{}': {e}",
                    type_info.name(),
                    row.columns()[idx].name()
                ))
            })?;
            val.map_or(RowValues::Null, RowValues::Text)
        }
    };
    Ok(value)
}

/// Extract every cell of a row, in column order.
///
/// # Errors
/// Returns errors from [`postgres_extract_value`].
pub fn extract_row_values(row: &Row) -> Result<Vec<RowValues>, DbUtilsError> {
    let col_count = row.columns().len();
    let mut values = Vec::with_capacity(col_count);
    for idx in 0..col_count {
        values.push(postgres_extract_value(row, idx)?);
    }
    Ok(values)
}

/// Build a result set using statement metadata for column names.
///
/// Column names come from the statement so an empty result still has them.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set_from_statement(
    stmt: &Statement,
    rows: &[Row],
) -> Result<ResultSet, DbUtilsError> {
    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();

    let mut result_set = ResultSet::with_capacity(column_names, rows.len());
    for row in rows {
        result_set.add_row_values(extract_row_values(row)?)?;
    }
    Ok(result_set)
}

/// Split simple-query protocol messages into one table per row-returning statement.
///
/// Every cell arrives as text (or NULL); typed coercion happens at mapping time.
///
/// # Errors
/// Returns `DbUtilsError::ExecutionError` if a data row arrives before its description.
pub fn build_dataset_from_simple(
    messages: Vec<SimpleQueryMessage>,
) -> Result<DataSet, DbUtilsError> {
    let mut dataset = DataSet::new();
    let mut current: Option<ResultSet> = None;

    for message in messages {
        match message {
            SimpleQueryMessage::RowDescription(columns) => {
                if let Some(table) = current.take() {
                    dataset.push(table);
                }
                let names = columns.iter().map(|c| c.name().to_string()).collect();
                current = Some(ResultSet::new(names));
            }
            SimpleQueryMessage::Row(row) => {
                let table = current.as_mut().ok_or_else(|| {
                    DbUtilsError::ExecutionError("data row without row description".to_string())
                })?;
                let values = (0..row.len())
                    .map(|idx| {
                        row.get(idx)
                            .map_or(RowValues::Null, |s| RowValues::Text(s.to_string()))
                    })
                    .collect();
                table.add_row_values(values)?;
            }
            SimpleQueryMessage::CommandComplete(_) => {
                if let Some(table) = current.take() {
                    dataset.push(table);
                }
            }
            _ => {}
        }
    }
    if let Some(table) = current.take() {
        dataset.push(table);
    }
    Ok(dataset)
}
