//! Helpers shared by database drivers.

pub mod tls;
