//! Row decoding shared by both engines.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use logshard_core::{Cell, ResultSet};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

/// Engine specific decoding tried before a cell is given up as `<TYPE>`.
pub(crate) type ExtraDecode<R> = fn(&R, usize) -> Option<Cell>;

/// Converts driver rows into a [`ResultSet`]. Column names come from the
/// first row, so an empty result has no columns.
pub(crate) fn result_set<R>(rows: &[R], extra: ExtraDecode<R>) -> ResultSet
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i16: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> NaiveDate: Decode<'r, R::Database> + Type<R::Database>,
{
    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect()
        })
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|index| decode_cell(row, index, extra)).collect())
        .collect();
    ResultSet { columns, rows }
}

fn decode_cell<R>(row: &R, index: usize, extra: ExtraDecode<R>) -> Cell
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> i64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> i16: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f64: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> f32: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> bool: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> String: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> NaiveDateTime: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> NaiveDate: Decode<'r, R::Database> + Type<R::Database>,
{
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Cell::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Cell::Null,
    };

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Cell::Integer(value);
    }
    if let Ok(value) = row.try_get::<i32, _>(index) {
        return Cell::Integer(i64::from(value));
    }
    if let Ok(value) = row.try_get::<i16, _>(index) {
        return Cell::Integer(i64::from(value));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Cell::from_f64(value);
    }
    if let Ok(value) = row.try_get::<f32, _>(index) {
        return Cell::from_f64(f64::from(value));
    }
    if let Ok(value) = row.try_get::<bool, _>(index) {
        return Cell::Text(value.to_string());
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Cell::from_text(value);
    }
    if let Ok(value) = row.try_get::<DateTime<Utc>, _>(index) {
        return Cell::Text(value.to_rfc3339());
    }
    if let Ok(value) = row.try_get::<NaiveDateTime, _>(index) {
        return Cell::Text(value.to_string());
    }
    if let Ok(value) = row.try_get::<NaiveDate, _>(index) {
        return Cell::Text(value.to_string());
    }
    extra(row, index).unwrap_or_else(|| Cell::Text(format!("<{}>", type_name)))
}
