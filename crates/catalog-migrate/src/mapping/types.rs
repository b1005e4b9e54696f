//! Per-table and per-column classification types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::core::ForeignKeyEdge;
use crate::typemap::DefaultValue;

/// Where a table exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Present on both sides.
    Matched,
    /// Present only in the source catalog.
    NewInSource,
    /// Present only in the target catalog.
    RemovedFromSource,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableStatus::Matched => write!(f, "matched"),
            TableStatus::NewInSource => write!(f, "new_in_source"),
            TableStatus::RemovedFromSource => write!(f, "removed_from_source"),
        }
    }
}

/// Migration action for one column, carrying only the fields the action needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ColumnDiff {
    /// Same or compatible type on both sides; copied as is.
    DirectMatch {
        source_type: String,
        target_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Target type represents every source value; copied as is.
    TypeWidened {
        source_type: String,
        target_type: String,
        note: String,
    },
    /// Target-only nullable column; written as null.
    NewNullable { target_type: String },
    /// Target-only NOT NULL column; written with a default.
    NewRequired {
        target_type: String,
        default: DefaultValue,
    },
    /// Source-only column; not written.
    Removed { source_type: String },
    /// Target-only column fed from a source-only column under another name.
    Renamed {
        possible_source: String,
        source_type: String,
        target_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    /// Types differ incompatibly; values are cast at runtime.
    TypeChanged {
        source_type: String,
        target_type: String,
    },
}

/// Action tag of a [`ColumnDiff`], for counting and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAction {
    DirectMatch,
    TypeWidened,
    NewNullable,
    NewRequired,
    Removed,
    Renamed,
    TypeChanged,
}

impl fmt::Display for ColumnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnAction::DirectMatch => "direct_match",
            ColumnAction::TypeWidened => "type_widened",
            ColumnAction::NewNullable => "new_nullable",
            ColumnAction::NewRequired => "new_required",
            ColumnAction::Removed => "removed",
            ColumnAction::Renamed => "renamed",
            ColumnAction::TypeChanged => "type_changed",
        };
        f.write_str(s)
    }
}

impl ColumnDiff {
    pub fn action(&self) -> ColumnAction {
        match self {
            ColumnDiff::DirectMatch { .. } => ColumnAction::DirectMatch,
            ColumnDiff::TypeWidened { .. } => ColumnAction::TypeWidened,
            ColumnDiff::NewNullable { .. } => ColumnAction::NewNullable,
            ColumnDiff::NewRequired { .. } => ColumnAction::NewRequired,
            ColumnDiff::Removed { .. } => ColumnAction::Removed,
            ColumnDiff::Renamed { .. } => ColumnAction::Renamed,
            ColumnDiff::TypeChanged { .. } => ColumnAction::TypeChanged,
        }
    }

    /// Target column type, if the column exists in the target.
    pub fn target_type(&self) -> Option<&str> {
        match self {
            ColumnDiff::DirectMatch { target_type, .. }
            | ColumnDiff::TypeWidened { target_type, .. }
            | ColumnDiff::NewNullable { target_type }
            | ColumnDiff::NewRequired { target_type, .. }
            | ColumnDiff::Renamed { target_type, .. }
            | ColumnDiff::TypeChanged { target_type, .. } => Some(target_type),
            ColumnDiff::Removed { .. } => None,
        }
    }

    /// Source column feeding the target column `name`, if any.
    pub fn source_column<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        match self {
            ColumnDiff::DirectMatch { .. }
            | ColumnDiff::TypeWidened { .. }
            | ColumnDiff::TypeChanged { .. } => Some(name),
            ColumnDiff::Renamed { possible_source, .. } => Some(possible_source),
            ColumnDiff::NewNullable { .. }
            | ColumnDiff::NewRequired { .. }
            | ColumnDiff::Removed { .. } => None,
        }
    }
}

/// Classification of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDiff {
    pub status: TableStatus,

    /// Column actions keyed by column name.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnDiff>,

    /// Target-side foreign-key edges.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyEdge>,

    /// Coarse import-dependency bucket, 0-5.
    pub import_tier: u8,
}

impl TableDiff {
    /// Columns written to the target, in name order.
    ///
    /// Removed columns are excluded, as are required columns whose default
    /// the database evaluates.
    pub fn insert_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, diff)| match diff {
                ColumnDiff::Removed { .. } => false,
                ColumnDiff::NewRequired { default, .. } => !default.is_database_side(),
                _ => true,
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names of columns with the given action.
    pub fn columns_with(&self, action: ColumnAction) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(move |(_, diff)| diff.action() == action)
            .map(|(name, _)| name.as_str())
    }
}
