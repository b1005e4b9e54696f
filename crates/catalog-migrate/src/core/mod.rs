//! Core abstractions shared by every phase.
//!
//! - [`schema`]: column, table and foreign-key metadata
//! - [`value`]: row representation and pagination cursors
//! - [`traits`]: catalog reader, table reader and target writer traits
//!
//! The core module is database-agnostic. The PostgreSQL driver in
//! `drivers/postgres` implements the traits; tests use an in-memory
//! implementation.

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{
    ColumnDescriptor, ForeignKeyEdge, ForeignKeyGraph, PkValue, SchemaSnapshot, TableSchema,
};
pub use traits::{CatalogReader, TableReader, TargetWriter};
pub use value::{PageCursor, Row};
