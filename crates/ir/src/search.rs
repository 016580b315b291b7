// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Search modes
//!
//! A search mode decides which columns a value-search predicate may touch.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Column-selection policy for value searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Numeric and text columns for numeric-looking values, text columns otherwise
    #[default]
    Auto,
    /// Text columns only
    TextOnly,
    /// Numeric columns only
    NumericOnly,
    /// Every column
    All,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Auto => "auto",
            SearchMode::TextOnly => "text_only",
            SearchMode::NumericOnly => "numeric_only",
            SearchMode::All => "all",
        }
    }

    /// Human readable description of what a search for `value` under this mode covers
    pub fn describe(&self, value: &str) -> String {
        match self {
            SearchMode::TextOnly => "text columns".to_string(),
            SearchMode::NumericOnly => "numeric columns".to_string(),
            SearchMode::All => "all columns".to_string(),
            SearchMode::Auto if is_numeric_literal(value) => {
                "auto: numeric value, all columns".to_string()
            }
            SearchMode::Auto => "auto: text value, text columns".to_string(),
        }
    }
}

/// Whether `value` reads as an integer or a decimal number
pub fn is_numeric_literal(value: &str) -> bool {
    let value = value.trim();
    value.parse::<i64>().is_ok() || (value.contains('.') && value.parse::<f64>().is_ok())
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a search mode string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown search mode '{0}' (expected auto, text_only, numeric_only or all)")]
pub struct ParseSearchModeError(pub String);

impl FromStr for SearchMode {
    type Err = ParseSearchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "" | "auto" => Ok(SearchMode::Auto),
            "text_only" | "text" => Ok(SearchMode::TextOnly),
            "numeric_only" | "numeric" => Ok(SearchMode::NumericOnly),
            "all" => Ok(SearchMode::All),
            _ => Err(ParseSearchModeError(s.to_string())),
        }
    }
}
