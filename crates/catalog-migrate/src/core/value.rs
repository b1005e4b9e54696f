//! Row representation shared by readers, the transform step and writers.
//!
//! Rows travel as JSON objects keyed by column name. Source rows are read
//! with `to_jsonb(t)` and target rows are written with
//! `jsonb_populate_recordset`, so the database performs the final cast to
//! each column's declared type.

use serde_json::{Map, Value};

use super::schema::PkValue;

/// One row, keyed by column name.
pub type Row = Map<String, Value>;

/// Position from which the next page of rows is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// First page.
    Start,
    /// Keyset pagination: rows whose single-column key is greater than this.
    After(PkValue),
    /// Offset pagination for composite keys: skip this many rows.
    Offset(i64),
}

impl PageCursor {
    /// Compute the cursor for the page following `page`.
    ///
    /// Single-column keys advance by keyset; composite keys advance by
    /// offset. Returns None if the key of the last row cannot be read back,
    /// which only happens for rows missing their key column.
    pub fn advance(&self, key_columns: &[String], page: &[Row]) -> Option<PageCursor> {
        if key_columns.len() == 1 {
            let last = page.last()?;
            let key = PkValue::from_json(last.get(&key_columns[0])?)?;
            return Some(PageCursor::After(key));
        }
        let consumed = match self {
            PageCursor::Offset(n) => *n,
            _ => 0,
        };
        Some(PageCursor::Offset(consumed + page.len() as i64))
    }
}

/// Extract the single-column key of a row, if present.
pub fn row_key(row: &Row, key_column: &str) -> Option<PkValue> {
    row.get(key_column).and_then(PkValue::from_json)
}
