// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Dynamically typed values and rows
//!
//! Tables are not known at compile time, so every cell travels as a [`SqlValue`]
//! and every result row as an ordered [`SqlRow`]. Values are bound positionally
//! as statement parameters and never interpolated into SQL text.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// NULL, or a string that is empty after trimming
    pub fn is_blank(&self) -> bool {
        match self {
            SqlValue::Null => true,
            SqlValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual rendering, as `CAST(x AS CHAR)` would produce it. `None` for NULL.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(if *b { "1".to_string() } else { "0".to_string() }),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Integer view of the value, parsing text when needed
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating point view of the value, parsing text when needed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::Float(f) => Some(*f),
            SqlValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// An ordered row of named values
///
/// Serializes as a JSON object whose keys keep column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlRow {
    columns: Vec<(String, SqlValue)>,
}

impl SqlRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: append a column
    pub fn with(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(name, value);
        self
    }

    /// Append a column, replacing an existing one with the same name
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<SqlValue>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((name, value)),
        }
    }

    /// Look up a value by column name (exact match first, then case-insensitive)
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .or_else(|| self.columns.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)))
            .map(|(_, v)| v)
    }

    /// Value at ordinal position
    pub fn value_at(&self, index: usize) -> Option<&SqlValue> {
        self.columns.get(index).map(|(_, v)| v)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &SqlValue> {
        self.columns.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for SqlRow {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        let mut row = SqlRow::new();
        for (name, value) in iter {
            row.push(name, value);
        }
        row
    }
}

impl IntoIterator for SqlRow {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl Serialize for SqlRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SqlRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = SqlRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of column values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SqlRow, A::Error> {
                let mut row = SqlRow::new();
                while let Some((name, value)) = access.next_entry::<String, SqlValue>()? {
                    row.push(name, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values() {
        assert!(SqlValue::Null.is_blank());
        assert!(SqlValue::from("   ").is_blank());
        assert!(!SqlValue::from("0").is_blank());
        assert!(!SqlValue::Int(0).is_blank());
    }

    #[test]
    fn test_as_text_matches_cast() {
        assert_eq!(SqlValue::Int(123).as_text().as_deref(), Some("123"));
        assert_eq!(SqlValue::Bool(true).as_text().as_deref(), Some("1"));
        assert_eq!(SqlValue::Null.as_text(), None);
    }

    #[test]
    fn test_row_keeps_json_key_order() {
        let row: SqlRow = serde_json::from_str(r#"{"zeta": 1, "alpha": "a", "mid": null}"#).unwrap();
        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(row.get("zeta"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("mid"), Some(&SqlValue::Null));
        assert_eq!(row.get("ALPHA"), Some(&SqlValue::Text("a".to_string())));
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = SqlRow::new().with("id", 7).with("name", "aspirin");
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":7,"name":"aspirin"}"#);
    }

    #[test]
    fn test_push_replaces_existing_column() {
        let mut row = SqlRow::new().with("id", 1);
        row.push("id", 2);
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("id"), Some(&SqlValue::Int(2)));
    }
}
