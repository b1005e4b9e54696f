//! Database drivers.
//!
//! - [`postgres`]: implements the core catalog, reader and writer traits
//! - [`common`]: TLS setup shared by source and target pools

pub mod common;
pub mod postgres;

pub use postgres::PostgresDb;
