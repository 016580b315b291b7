// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Dynamic predicate builder
//!
//! Builds a parameterized `WHERE` fragment that matches a raw search value
//! against every applicable column of a table.
//!
//! ## Column classes
//!
//! A column is **Numeric** when its declared type is an integer family type,
//! decimal, float, double or bit; everything else is **Text**.
//!
//! ## Per-column clauses
//!
//! | Column  | Value      | Clause                                                   |
//! |---------|------------|----------------------------------------------------------|
//! | Numeric | numeric    | `` (`c` = ? OR CAST(`c` AS CHAR) LIKE ?) ``              |
//! | Numeric | other      | `` CAST(`c` AS CHAR) LIKE ? ``                           |
//! | Text    | any        | case-insensitive, collation-normalized `LIKE ?`          |
//!
//! Clauses are joined with `OR` in column order and parameters follow the
//! same order.

use crate::error::{EngineError, EngineResult};
use serde::Serialize;
use sqlscout_catalog::{ColumnMetadata, SqlValue, quote_identifier};
use sqlscout_ir::{SearchMode, is_numeric_literal};

/// Search class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnClass {
    Numeric,
    Text,
}

impl ColumnClass {
    pub fn of(column: &ColumnMetadata) -> Self {
        if column.data_type.is_numeric() {
            ColumnClass::Numeric
        } else {
            ColumnClass::Text
        }
    }
}

/// A parameterized `WHERE` fragment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
    /// Columns the clause covers
    pub columns: Vec<String>,
}

/// Whether `column` takes part in a search for `value` under `mode`
pub fn applies(column: &ColumnMetadata, mode: SearchMode, value_is_numeric: bool) -> bool {
    match (mode, ColumnClass::of(column)) {
        (SearchMode::All, _) => true,
        (SearchMode::TextOnly, class) => class == ColumnClass::Text,
        (SearchMode::NumericOnly, class) => class == ColumnClass::Numeric,
        (SearchMode::Auto, ColumnClass::Text) => true,
        (SearchMode::Auto, ColumnClass::Numeric) => value_is_numeric,
    }
}

/// Escape `\`, `%` and `_` so the value matches literally inside LIKE
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Trim the raw value and reject blanks
pub fn normalize_value(raw: &str) -> EngineResult<&str> {
    let value = raw.trim();
    if value.is_empty() {
        Err(EngineError::InvalidArgument(
            "search value cannot be blank".to_string(),
        ))
    } else {
        Ok(value)
    }
}

fn numeric_param(value: &str) -> SqlValue {
    match value.parse::<i64>() {
        Ok(i) => SqlValue::Int(i),
        Err(_) => value
            .parse::<f64>()
            .map(SqlValue::Float)
            .unwrap_or_else(|_| SqlValue::Text(value.to_string())),
    }
}

/// Build the predicate for `raw` over `columns` of `table`
pub fn build_predicate(
    table: &str,
    columns: &[ColumnMetadata],
    raw: &str,
    mode: SearchMode,
) -> EngineResult<Predicate> {
    let value = normalize_value(raw)?;
    let numeric = is_numeric_literal(value);
    let like = SqlValue::Text(format!("%{}%", escape_like(value)));

    let mut clauses = Vec::new();
    let mut params = Vec::new();
    let mut covered = Vec::new();

    for column in columns.iter().filter(|c| applies(c, mode, numeric)) {
        let ident = quote_identifier(&column.name);
        match ColumnClass::of(column) {
            ColumnClass::Numeric if numeric => {
                clauses.push(format!("({ident} = ? OR CAST({ident} AS CHAR) LIKE ?)"));
                params.push(numeric_param(value));
                params.push(like.clone());
            }
            ColumnClass::Numeric => {
                clauses.push(format!("CAST({ident} AS CHAR) LIKE ?"));
                params.push(like.clone());
            }
            ColumnClass::Text => {
                clauses.push(format!(
                    "CONVERT({ident} USING utf8mb4) COLLATE utf8mb4_general_ci LIKE ?"
                ));
                params.push(like.clone());
            }
        }
        covered.push(column.name.clone());
    }

    if clauses.is_empty() {
        return Err(EngineError::NoApplicableColumn {
            table: table.to_string(),
            mode,
        });
    }

    Ok(Predicate {
        where_clause: clauses.join(" OR "),
        params,
        columns: covered,
    })
}

/// `SELECT EXISTS(...)` probe
pub fn exists_sql(qualified: &str, where_clause: &str) -> String {
    format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {})", qualified, where_clause)
}

pub fn count_sql(qualified: &str, where_clause: &str) -> String {
    format!("SELECT COUNT(*) FROM {} WHERE {}", qualified, where_clause)
}

/// Filtered page; binds the predicate params, then offset and size
pub fn select_page_sql(qualified: &str, where_clause: &str) -> String {
    format!("SELECT * FROM {} WHERE {} LIMIT ?, ?", qualified, where_clause)
}
