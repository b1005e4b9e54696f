//! Per-row transform driven by a table's column actions.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::Row;
use crate::mapping::{ColumnDiff, TableDiff};
use crate::typemap::{CastKind, ColumnType, DefaultValue};

#[derive(Debug, Clone)]
enum ColumnPlan {
    /// Copy from a source column (same name, or the rename source).
    Copy(String),
    /// Cast a source column's value to the target type.
    Cast(String, CastKind),
    /// Produce a default per row.
    Default(DefaultValue),
    /// Emit null.
    Null,
}

/// Precomputed output plan for one table.
#[derive(Debug, Clone)]
pub struct RowTransformer {
    plan: Vec<(String, ColumnPlan)>,
}

impl RowTransformer {
    /// Build the plan for `table`.
    ///
    /// `overrides` is the name-keyed default table, consulted for required
    /// columns whose recorded default is null. Keys are `table.column` or a
    /// bare column name; the qualified key wins.
    pub fn new(table_name: &str, table: &TableDiff, overrides: &BTreeMap<String, Value>) -> Self {
        let mut plan = Vec::new();
        for name in table.insert_columns() {
            let step = match &table.columns[&name] {
                ColumnDiff::DirectMatch {
                    source_type,
                    target_type,
                    ..
                }
                | ColumnDiff::TypeWidened {
                    source_type,
                    target_type,
                    ..
                } => copy_plan(&name, source_type, target_type),
                ColumnDiff::Renamed {
                    possible_source,
                    source_type,
                    target_type,
                    ..
                } => copy_plan(possible_source, source_type, target_type),
                ColumnDiff::TypeChanged { target_type, .. } => {
                    ColumnPlan::Cast(name.clone(), CastKind::for_catalog_type(target_type))
                }
                ColumnDiff::NewNullable { .. } => ColumnPlan::Null,
                ColumnDiff::NewRequired { default, .. } => {
                    required_plan(table_name, &name, default, overrides)
                }
                // not part of insert_columns
                ColumnDiff::Removed { .. } => continue,
            };
            plan.push((name, step));
        }
        Self { plan }
    }

    /// Target columns written, in plan order.
    pub fn columns(&self) -> Vec<String> {
        self.plan.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Build the output row. Total: missing source values become null.
    pub fn transform(&self, source: &Row) -> Row {
        let mut out = Row::new();
        for (name, step) in &self.plan {
            let value = match step {
                ColumnPlan::Copy(from) => source.get(from).cloned().unwrap_or(Value::Null),
                ColumnPlan::Cast(from, kind) => {
                    kind.apply(source.get(from).cloned().unwrap_or(Value::Null))
                }
                ColumnPlan::Default(default) => default.materialize().unwrap_or(Value::Null),
                ColumnPlan::Null => Value::Null,
            };
            out.insert(name.clone(), value);
        }
        out
    }
}

/// Copy within one type family; cast across families (`true` into a
/// smallint, `3.00` into an integer), which the database would reject.
fn copy_plan(from: &str, source_type: &str, target_type: &str) -> ColumnPlan {
    let target = ColumnType::parse(target_type);
    if ColumnType::parse(source_type) == target {
        ColumnPlan::Copy(from.to_string())
    } else {
        ColumnPlan::Cast(from.to_string(), CastKind::for_type(target))
    }
}

fn required_plan(
    table: &str,
    column: &str,
    default: &DefaultValue,
    overrides: &BTreeMap<String, Value>,
) -> ColumnPlan {
    if !default.is_null() {
        return ColumnPlan::Default(default.clone());
    }
    overrides
        .get(&format!("{}.{}", table, column))
        .or_else(|| overrides.get(column))
        .map(|v| ColumnPlan::Default(DefaultValue::Literal(v.clone())))
        .unwrap_or(ColumnPlan::Null)
}
