//! In-memory database for tests.
//!
//! Implements [`CatalogReader`], [`TableReader`] and [`TargetWriter`] over
//! plain vectors of JSON rows. Writes honour primary-key conflicts (ignored),
//! NOT NULL constraints (the whole batch fails) and column defaults (the
//! default expression text is stored). Failures can be injected per catalog,
//! per table read and per write call.

use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::core::{
    CatalogReader, ColumnDescriptor, ForeignKeyEdge, PageCursor, PkValue, Row, TableReader,
    TargetWriter,
};
use crate::error::{MigrateError, Result};

#[derive(Default)]
struct MemTable {
    columns: Vec<ColumnDescriptor>,
    primary_key: Vec<String>,
    rows: Vec<Row>,
}

impl MemTable {
    fn key_of(&self, row: &Row) -> Vec<Value> {
        self.primary_key
            .iter()
            .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn sorted_rows(&self) -> Vec<Row> {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| cmp_keys(&self.key_of(a), &self.key_of(b)));
        rows
    }
}

#[derive(Default)]
struct Inner {
    tables: BTreeMap<String, MemTable>,
    foreign_keys: Vec<(String, ForeignKeyEdge)>,
    fail_catalog: bool,
    fail_reads: BTreeSet<String>,
    /// (table, 1-based write call) pairs that fail.
    fail_writes: BTreeSet<(String, usize)>,
    write_calls: BTreeMap<String, usize>,
    integrity_log: Vec<bool>,
}

/// In-memory database.
#[derive(Default)]
pub struct MemoryDb {
    inner: Mutex<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str, columns: Vec<ColumnDescriptor>, primary_key: &[&str]) {
        let mut columns = columns;
        columns.sort_by_key(|c| c.ordinal_position);
        self.lock().tables.insert(
            name.to_string(),
            MemTable {
                columns,
                primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    /// Append rows without any constraint checks.
    pub fn insert_rows(&self, table: &str, rows: Vec<Value>) {
        let mut inner = self.lock();
        let t = inner.tables.get_mut(table).expect("unknown table");
        for row in rows {
            t.rows.push(row.as_object().cloned().expect("row must be an object"));
        }
    }

    /// Rows of a table ordered by primary key.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock()
            .tables
            .get(table)
            .map(MemTable::sorted_rows)
            .unwrap_or_default()
    }

    /// Overwrite one column of the row whose single-column key equals `key`.
    pub fn update_value(&self, table: &str, key: &Value, column: &str, value: Value) {
        let mut inner = self.lock();
        let t = inner.tables.get_mut(table).expect("unknown table");
        let key_column = t.primary_key[0].clone();
        for row in t.rows.iter_mut() {
            if row.get(&key_column) == Some(key) {
                row.insert(column.to_string(), value.clone());
            }
        }
    }

    /// Remove the row whose single-column key equals `key`.
    pub fn delete_row(&self, table: &str, key: &Value) {
        let mut inner = self.lock();
        let t = inner.tables.get_mut(table).expect("unknown table");
        let key_column = t.primary_key[0].clone();
        t.rows.retain(|row| row.get(&key_column) != Some(key));
    }

    pub fn add_foreign_key(&self, table: &str, edge: ForeignKeyEdge) {
        self.lock().foreign_keys.push((table.to_string(), edge));
    }

    /// Make every catalog read fail.
    pub fn fail_catalog(&self) {
        self.lock().fail_catalog = true;
    }

    /// Make every read of `table` fail.
    pub fn fail_reads(&self, table: &str) {
        self.lock().fail_reads.insert(table.to_string());
    }

    /// Make the `call`-th (1-based) write to `table` fail.
    pub fn fail_write_call(&self, table: &str, call: usize) {
        self.lock().fail_writes.insert((table.to_string(), call));
    }

    /// Every referential-integrity toggle, in order.
    pub fn integrity_log(&self) -> Vec<bool> {
        self.lock().integrity_log.clone()
    }

    pub fn write_calls(&self, table: &str) -> usize {
        self.lock().write_calls.get(table).copied().unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_table<T>(&self, table: &str, f: impl FnOnce(&MemTable, &Inner) -> T) -> Result<T> {
        let inner = self.lock();
        if inner.fail_reads.contains(table) {
            return Err(MigrateError::pool("injected read failure", table));
        }
        let t = inner
            .tables
            .get(table)
            .ok_or_else(|| MigrateError::pool(format!("relation {} does not exist", table), table))?;
        Ok(f(t, &*inner))
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn cmp_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| cmp_values(x, y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

#[async_trait]
impl CatalogReader for MemoryDb {
    async fn base_tables(&self) -> Result<Vec<String>> {
        let inner = self.lock();
        if inner.fail_catalog {
            return Err(MigrateError::pool("injected catalog failure", "base_tables"));
        }
        Ok(inner.tables.keys().cloned().collect())
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let inner = self.lock();
        if inner.fail_catalog {
            return Err(MigrateError::pool("injected catalog failure", table));
        }
        Ok(inner
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn foreign_key_edges(&self) -> Result<Vec<(String, ForeignKeyEdge)>> {
        let inner = self.lock();
        if inner.fail_catalog {
            return Err(MigrateError::pool("injected catalog failure", "foreign_keys"));
        }
        Ok(inner.foreign_keys.clone())
    }

    fn db_type(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl TableReader for MemoryDb {
    async fn row_count(&self, table: &str) -> Result<i64> {
        self.with_table(table, |t, _| t.rows.len() as i64)
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        self.with_table(table, |t, _| t.primary_key.clone())
    }

    async fn read_page(
        &self,
        table: &str,
        key_columns: &[String],
        cursor: &PageCursor,
        limit: usize,
    ) -> Result<Vec<Row>> {
        self.with_table(table, |t, _| {
            let rows = t.sorted_rows();
            let (skip, after) = match cursor {
                PageCursor::Start => (0, None),
                PageCursor::After(k) => (0, Some(k.to_json())),
                PageCursor::Offset(n) => (*n as usize, None),
            };
            rows.into_iter()
                .filter(|row| match &after {
                    Some(k) => {
                        let v = row.get(&key_columns[0]).unwrap_or(&Value::Null);
                        cmp_values(v, k) == Ordering::Greater
                    }
                    None => true,
                })
                .skip(skip)
                .take(limit)
                .collect()
        })
    }

    // Deterministic: the first `n` keys in key order.
    async fn sample_keys(&self, table: &str, key_column: &str, n: usize) -> Result<Vec<PkValue>> {
        self.with_table(table, |t, _| {
            t.sorted_rows()
                .iter()
                .filter_map(|r| r.get(key_column).and_then(PkValue::from_json))
                .take(n)
                .collect()
        })
    }

    async fn lookup_value(
        &self,
        table: &str,
        key_column: &str,
        key: &PkValue,
        column: &str,
    ) -> Result<Option<Value>> {
        self.with_table(table, |t, _| {
            t.rows
                .iter()
                .find(|r| r.get(key_column).and_then(PkValue::from_json).as_ref() == Some(key))
                .map(|r| r.get(column).cloned().unwrap_or(Value::Null))
        })
    }

    async fn column_bounds(&self, table: &str, column: &str) -> Result<(Value, Value)> {
        self.with_table(table, |t, _| {
            let values: Vec<&Value> = t
                .rows
                .iter()
                .filter_map(|r| r.get(column))
                .filter(|v| !v.is_null())
                .collect();
            let min = values.iter().copied().min_by(|a, b| cmp_values(a, b));
            let max = values.iter().copied().max_by(|a, b| cmp_values(a, b));
            (
                min.cloned().unwrap_or(Value::Null),
                max.cloned().unwrap_or(Value::Null),
            )
        })
    }

    async fn non_null_count(&self, table: &str, column: &str) -> Result<i64> {
        self.with_table(table, |t, _| {
            t.rows
                .iter()
                .filter(|r| r.get(column).map_or(false, |v| !v.is_null()))
                .count() as i64
        })
    }

    async fn blank_count(&self, table: &str, column: &str) -> Result<i64> {
        self.with_table(table, |t, _| {
            t.rows
                .iter()
                .filter(|r| match r.get(column) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                })
                .count() as i64
        })
    }

    async fn orphan_count(&self, table: &str, edge: &ForeignKeyEdge) -> Result<i64> {
        self.with_table(table, |t, inner| {
            let referenced: Vec<&Value> = inner
                .tables
                .get(&edge.referenced_table)
                .map(|rt| {
                    rt.rows
                        .iter()
                        .filter_map(|r| r.get(&edge.referenced_column))
                        .collect()
                })
                .unwrap_or_default();
            t.rows
                .iter()
                .filter_map(|r| r.get(&edge.column_name))
                .filter(|v| !v.is_null())
                .filter(|v| !referenced.contains(v))
                .count() as i64
        })
    }
}

#[async_trait]
impl TargetWriter for MemoryDb {
    async fn set_referential_integrity(&self, enabled: bool) -> Result<()> {
        self.lock().integrity_log.push(enabled);
        Ok(())
    }

    async fn insert_ignore(&self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64> {
        let mut inner = self.lock();
        let call = {
            let calls = inner.write_calls.entry(table.to_string()).or_insert(0);
            *calls += 1;
            *calls
        };
        if inner.fail_writes.contains(&(table.to_string(), call)) {
            return Err(MigrateError::batch_write(table, "injected write failure"));
        }

        let t = inner
            .tables
            .get_mut(table)
            .ok_or_else(|| MigrateError::batch_write(table, "relation does not exist"))?;

        // Build every row first so a constraint failure rejects the whole batch.
        let mut built = Vec::with_capacity(rows.len());
        for row in rows {
            let mut stored = Row::new();
            for col in &t.columns {
                let value = if columns.contains(&col.name) {
                    row.get(&col.name).cloned().unwrap_or(Value::Null)
                } else {
                    col.default.clone().map(Value::String).unwrap_or(Value::Null)
                };
                if value.is_null() && !col.nullable {
                    return Err(MigrateError::batch_write(
                        table,
                        format!("null value in column \"{}\" violates not-null constraint", col.name),
                    ));
                }
                stored.insert(col.name.clone(), value);
            }
            built.push(stored);
        }

        let mut inserted = 0;
        for row in built {
            let key = t.key_of(&row);
            if t.rows.iter().any(|r| t.key_of(r) == key) {
                continue;
            }
            t.rows.push(row);
            inserted += 1;
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db() -> MemoryDb {
        let db = MemoryDb::new();
        db.create_table(
            "users",
            vec![
                ColumnDescriptor::new("id", "bigint", 1).not_null(),
                ColumnDescriptor::new("name", "text", 2),
            ],
            &["id"],
        );
        db
    }

    #[tokio::test]
    async fn test_insert_ignore_skips_existing_keys() {
        let db = db();
        let cols = vec!["id".to_string(), "name".to_string()];
        let rows: Vec<Row> = vec![
            json!({"id": 1, "name": "a"}).as_object().cloned().unwrap(),
            json!({"id": 2, "name": "b"}).as_object().cloned().unwrap(),
        ];
        assert_eq!(db.insert_ignore("users", &cols, &rows).await.unwrap(), 2);
        assert_eq!(db.insert_ignore("users", &cols, &rows).await.unwrap(), 0);
        assert_eq!(db.rows("users").len(), 2);
    }

    #[tokio::test]
    async fn test_not_null_violation_rejects_batch() {
        let db = db();
        let cols = vec!["name".to_string()];
        let rows: Vec<Row> = vec![json!({"name": "a"}).as_object().cloned().unwrap()];
        assert!(db.insert_ignore("users", &cols, &rows).await.is_err());
        assert!(db.rows("users").is_empty());
    }

    #[tokio::test]
    async fn test_read_page_keyset() {
        let db = db();
        db.insert_rows("users", (1..=5).rev().map(|i| json!({"id": i})).collect());
        let keys = vec!["id".to_string()];
        let page = db
            .read_page("users", &keys, &PageCursor::After(PkValue::Int(2)), 2)
            .await
            .unwrap();
        let ids: Vec<i64> = page.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![3, 4]);
    }
}
