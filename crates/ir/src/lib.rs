// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlscout - Schema and Value Model
//!
//! This crate holds the types every other sqlscout crate speaks:
//! - Schema metadata read from the catalog ([`TableMetadata`], [`ColumnMetadata`], [`DataType`])
//! - Dynamically typed cell values and rows ([`SqlValue`], [`SqlRow`])
//! - The search-mode policy used when synthesizing value-search predicates ([`SearchMode`])

pub mod metadata;
pub mod search;
pub mod value;

// Re-export commonly used types
pub use metadata::{ColumnMatch, ColumnMetadata, DataType, TableMetadata, TableReference, TableType};
pub use search::{ParseSearchModeError, SearchMode, is_numeric_literal};
pub use value::{SqlRow, SqlValue};
