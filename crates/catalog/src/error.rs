// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Error types for Catalog operations
//!
//! This module defines the error types used throughout the catalog layer.
//!
//! Database failures are classified here, at the driver boundary, so callers can
//! match on what went wrong (duplicate key, value too long, ...) rather than on
//! server message text. See [`classify_mysql_error`].

use serde::Serialize;
use thiserror::Error;

/// Result type alias for Catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur during Catalog operations
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum CatalogError {
    /// Failed to connect to the database
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    /// Query execution timed out
    #[error("Query timed out after {0}s")]
    QueryTimeout(u64),

    /// Requested table was not found
    #[error("Table '{0}' not found in schema '{1}'")]
    TableNotFound(String, String),

    /// The server rejected a statement referencing a table that does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// The server rejected a statement referencing a column that does not exist
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A table with the same name already exists
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// A database with the same name already exists
    #[error("Database already exists: {0}")]
    DatabaseExists(String),

    /// A unique or primary key constraint was violated
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A NOT NULL column without default received no value
    #[error("Required field missing: {0}")]
    RequiredFieldMissing(String),

    /// A value exceeded the declared column length
    #[error("Value too long: {0}")]
    ValueTooLong(String),

    /// A numeric value does not fit the column type
    #[error("Numeric value out of range: {0}")]
    NumericOutOfRange(String),

    /// A foreign key constraint was violated or could not be created
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid schema name provided
    #[error("Invalid schema name: {0}")]
    InvalidSchema(String),

    /// Invalid catalog configuration
    #[error("Invalid catalog configuration: {0}")]
    ConfigurationError(String),

    /// Permission denied for requested operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

/// Map a MySQL server error number and message onto a [`CatalogError`]
pub fn classify_mysql_error(number: u16, message: &str) -> CatalogError {
    let message = message.to_string();
    match number {
        1062 | 1586 => CatalogError::DuplicateKey(message),
        1406 => CatalogError::ValueTooLong(message),
        1264 | 1690 => CatalogError::NumericOutOfRange(message),
        1048 | 1364 => CatalogError::RequiredFieldMissing(message),
        1146 => CatalogError::UnknownTable(message),
        1054 => CatalogError::UnknownColumn(message),
        1050 => CatalogError::TableExists(message),
        1007 => CatalogError::DatabaseExists(message),
        1005 | 1215 | 1216 | 1217 | 1451 | 1452 | 3780 => {
            CatalogError::ConstraintViolation(message)
        }
        1044 | 1045 | 1142 | 1143 => CatalogError::PermissionDenied(message),
        1049 => CatalogError::InvalidSchema(message),
        2002 | 2003 | 2006 | 2013 => CatalogError::ConnectionFailed(message),
        _ => CatalogError::QueryFailed(message),
    }
}
