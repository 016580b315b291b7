// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema scope and identifier quoting
//!
//! A [`SchemaScope`] says which schema catalog queries and generated statements
//! target: the connection's current database, or an explicitly named one reached
//! through schema-qualified statements.

use serde::Serialize;
use std::fmt;

/// Which schema a catalog query or statement addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SchemaScope {
    /// The connection's default database (`DATABASE()`)
    Current,
    /// An explicitly named schema; statements are qualified as `` `schema`.`table` ``
    Named(String),
}

impl SchemaScope {
    /// Render a table reference for use in a statement
    pub fn qualify(&self, table: &str) -> String {
        match self {
            SchemaScope::Current => quote_identifier(table),
            SchemaScope::Named(schema) => {
                format!("{}.{}", quote_identifier(schema), quote_identifier(table))
            }
        }
    }

    /// The explicit schema name, if any
    pub fn schema_name(&self) -> Option<&str> {
        match self {
            SchemaScope::Current => None,
            SchemaScope::Named(schema) => Some(schema),
        }
    }
}

impl fmt::Display for SchemaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaScope::Current => f.write_str("DATABASE()"),
            SchemaScope::Named(schema) => f.write_str(schema),
        }
    }
}

/// Backtick-quote an identifier, doubling embedded backticks
pub fn quote_identifier(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_current() {
        assert_eq!(SchemaScope::Current.qualify("compounds"), "`compounds`");
    }

    #[test]
    fn test_qualify_named() {
        let scope = SchemaScope::Named("lab_data".to_string());
        assert_eq!(scope.qualify("compounds"), "`lab_data`.`compounds`");
        assert_eq!(scope.schema_name(), Some("lab_data"));
    }

    #[test]
    fn test_quote_escapes_backticks() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
