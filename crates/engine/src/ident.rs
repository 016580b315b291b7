// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Identifier validation
//!
//! Identifiers are spliced into SQL text, so every table, column, schema and
//! database name passes through one of these checks before it reaches a
//! statement. Values never do; they are always bound as parameters.

use crate::error::{EngineError, EngineResult};
use regex::Regex;
use std::sync::LazyLock;

/// Longest identifier MySQL accepts
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Names of objects the engine creates
static NEW_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid regex"));

/// Names of objects that already exist (MySQL allows a leading digit)
static EXISTING_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,64}$").expect("valid regex"));

/// Validate a name for a table, column or database about to be created
pub fn validate_new_identifier(name: &str) -> EngineResult<&str> {
    if NEW_IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a name that refers to an existing table, column or schema
pub fn validate_identifier(name: &str) -> EngineResult<&str> {
    if EXISTING_IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(EngineError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate every name in a list
pub fn validate_identifiers<'a, I>(names: I) -> EngineResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for name in names {
        validate_identifier(name)?;
    }
    Ok(())
}

/// Longest column name produced by [`sanitize_column_name`]
const SANITIZED_MAX_LEN: usize = 60;

/// Reserved words that cannot be used as bare column names
const RESERVED_WORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN",
    "CONSTRAINT", "CREATE", "DATABASE", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP", "ELSE",
    "EXISTS", "FOREIGN", "FROM", "GROUP", "HAVING", "IN", "INDEX", "INSERT", "INTO", "IS", "JOIN",
    "KEY", "LIKE", "LIMIT", "NOT", "NULL", "ON", "OR", "ORDER", "PRIMARY", "REFERENCES", "SELECT",
    "SET", "TABLE", "THEN", "TO", "UNION", "UNIQUE", "UPDATE", "USE", "VALUES", "WHEN", "WHERE",
];

/// Whether `word` is a reserved word (case-insensitive)
pub fn is_reserved_word(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// Turn an arbitrary header (e.g. from a spreadsheet) into a usable column name
///
/// Characters outside `[A-Za-z0-9_]` become underscores. A name that does not
/// start with a letter or underscore, or that is a reserved word, gets a `col_`
/// prefix. The result is cut to 60 characters before the reserved-word check.
pub fn sanitize_column_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "column".to_string();
    }

    let mut name: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name = format!("col_{}", name);
    }
    name.truncate(SANITIZED_MAX_LEN);
    if is_reserved_word(&name) {
        name = format!("col_{}", name);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_identifier() {
        assert!(validate_new_identifier("compounds").is_ok());
        assert!(validate_new_identifier("_tmp_2024").is_ok());
        assert!(validate_new_identifier("2024_batch").is_err());
        assert!(validate_new_identifier("drop table").is_err());
        assert!(validate_new_identifier("a`b").is_err());
        assert!(validate_new_identifier("").is_err());
        assert!(validate_new_identifier(&"x".repeat(64)).is_ok());
        assert!(validate_new_identifier(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_existing_identifier() {
        assert!(validate_identifier("2024_batch").is_ok());
        assert!(validate_identifier("users; DROP").is_err());
        assert!(matches!(
            validate_identifier("a-b"),
            Err(EngineError::InvalidIdentifier(ref n)) if n == "a-b"
        ));
        assert!(validate_identifiers(["id", "name"]).is_ok());
        assert!(validate_identifiers(["id", "na me"]).is_err());
    }

    #[test]
    fn test_sanitize_column_name() {
        assert_eq!(sanitize_column_name("Molecular Weight (g/mol)"), "Molecular_Weight__g_mol_");
        assert_eq!(sanitize_column_name("  id "), "id");
        assert_eq!(sanitize_column_name("1st pass"), "col_1st_pass");
        assert_eq!(sanitize_column_name("order"), "col_order");
        assert_eq!(sanitize_column_name(""), "column");
        assert_eq!(sanitize_column_name(&"a".repeat(80)).len(), 60);
        assert!(validate_new_identifier(&sanitize_column_name("% yield")).is_ok());
    }
}
