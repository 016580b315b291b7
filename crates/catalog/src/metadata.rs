// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata types for database schema information
//!
//! This module re-exports the schema and value types from the `sqlscout-ir` crate
//! so catalog implementors only need this crate in scope.

pub use sqlscout_ir::{
    ColumnMatch, ColumnMetadata, DataType, SqlRow, SqlValue, TableMetadata, TableReference,
    TableType,
};
