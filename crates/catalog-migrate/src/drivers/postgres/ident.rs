//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name interpolated into SQL goes through [`quote`], which rejects names
//! PostgreSQL could never have produced and escapes embedded quotes.

use crate::error::{MigrateError, Result};

/// NAMEDATALEN - 1.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Reject empty, over-long and NUL-containing identifiers.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("identifier cannot be empty".into()));
    }
    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "identifier contains a null byte: {:?}",
            name
        )));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "identifier exceeds {} bytes: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }
    Ok(())
}

/// Quote an identifier, doubling embedded double quotes.
pub fn quote(name: &str) -> Result<String> {
    validate(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// `"schema"."table"`.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote(schema)?, quote(table)?))
}

/// Comma-separated quoted column list.
pub fn quote_list(columns: &[String]) -> Result<String> {
    let quoted = columns
        .iter()
        .map(|c| quote(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}
