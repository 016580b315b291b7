// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Engine error taxonomy
//!
//! Every fallible engine operation returns [`EngineResult`]. Catalog-level
//! database failures are folded into the taxonomy through `From<CatalogError>`.

use crate::config::ConfigError;
use sqlscout_catalog::CatalogError;
use sqlscout_ir::SearchMode;
use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the search, DDL and bulk-load engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The datasource name is neither configured nor reachable as a user schema
    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    /// An identifier failed the allow-list pattern
    #[error("Invalid identifier '{0}': names must start with a letter or underscore and contain only letters, digits and underscores (max 64)")]
    InvalidIdentifier(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// The search mode filtered out every column of the table
    #[error("No column of table '{table}' can be searched in {mode} mode")]
    NoApplicableColumn { table: String, mode: SearchMode },

    #[error(
        "Foreign key type mismatch on column '{column}': {ref_table}.{ref_column} is {required} but the column is declared as {actual}; declare it as {required}"
    )]
    ForeignKeyTypeMismatch {
        column: String,
        ref_table: String,
        ref_column: String,
        actual: String,
        required: String,
    },

    #[error("Foreign key target missing: {0}")]
    ForeignKeyTargetMissing(String),

    #[error("Duplicate key: {0}")]
    DuplicateKeyViolation(String),

    #[error("Required field missing: {0}")]
    RequiredFieldMissing(String),

    #[error("Value too long: {0}")]
    ValueTooLong(String),

    #[error("Numeric value out of range: {0}")]
    NumericOutOfRange(String),

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Database already exists: {0}")]
    DatabaseAlreadyExists(String),

    #[error("Data source already registered: {0}")]
    DataSourceAlreadyExists(String),

    /// Attempt to remove or drop something the engine protects
    #[error("Protected: {0}")]
    ProtectedDataSource(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Stable machine-readable kind, used in events and CLI output
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::UnknownDataSource(_) => "unknown_data_source",
            EngineError::InvalidIdentifier(_) => "invalid_identifier",
            EngineError::TableNotFound(_) => "table_not_found",
            EngineError::ColumnNotFound(_) => "column_not_found",
            EngineError::NoApplicableColumn { .. } => "no_applicable_column",
            EngineError::ForeignKeyTypeMismatch { .. } => "foreign_key_type_mismatch",
            EngineError::ForeignKeyTargetMissing(_) => "foreign_key_target_missing",
            EngineError::DuplicateKeyViolation(_) => "duplicate_key_violation",
            EngineError::RequiredFieldMissing(_) => "required_field_missing",
            EngineError::ValueTooLong(_) => "value_too_long",
            EngineError::NumericOutOfRange(_) => "numeric_out_of_range",
            EngineError::ConnectionFailure(_) => "connection_failure",
            EngineError::Timeout(_) => "timeout",
            EngineError::InvalidArgument(_) => "invalid_argument",
            EngineError::TableAlreadyExists(_) => "table_already_exists",
            EngineError::DatabaseAlreadyExists(_) => "database_already_exists",
            EngineError::DataSourceAlreadyExists(_) => "data_source_already_exists",
            EngineError::ProtectedDataSource(_) => "protected",
            EngineError::QueryFailed(_) => "query_failed",
            EngineError::Config(_) => "config",
        }
    }
}

impl From<CatalogError> for EngineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::ConnectionFailed(m) => EngineError::ConnectionFailure(m),
            CatalogError::QueryFailed(m) => EngineError::QueryFailed(m),
            CatalogError::QueryTimeout(secs) => {
                EngineError::Timeout(format!("query did not complete within {}s", secs))
            }
            CatalogError::TableNotFound(table, schema) => {
                EngineError::TableNotFound(format!("{}.{}", schema, table))
            }
            CatalogError::UnknownTable(m) => EngineError::TableNotFound(m),
            CatalogError::UnknownColumn(m) => EngineError::ColumnNotFound(m),
            CatalogError::TableExists(m) => EngineError::TableAlreadyExists(m),
            CatalogError::DatabaseExists(m) => EngineError::DatabaseAlreadyExists(m),
            CatalogError::DuplicateKey(m) => EngineError::DuplicateKeyViolation(m),
            CatalogError::RequiredFieldMissing(m) => EngineError::RequiredFieldMissing(m),
            CatalogError::ValueTooLong(m) => EngineError::ValueTooLong(m),
            CatalogError::NumericOutOfRange(m) => EngineError::NumericOutOfRange(m),
            CatalogError::ConstraintViolation(m) => {
                EngineError::QueryFailed(format!("constraint violation: {}", m))
            }
            CatalogError::InvalidSchema(m) => EngineError::UnknownDataSource(m),
            CatalogError::ConfigurationError(m) => EngineError::Config(ConfigError::Invalid(m)),
            CatalogError::PermissionDenied(m) => {
                EngineError::QueryFailed(format!("permission denied: {}", m))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_errors_map_onto_taxonomy() {
        let err: EngineError = CatalogError::DuplicateKey("Duplicate entry '1'".to_string()).into();
        assert!(matches!(err, EngineError::DuplicateKeyViolation(_)));
        assert_eq!(err.kind(), "duplicate_key_violation");

        let err: EngineError =
            CatalogError::TableNotFound("compounds".to_string(), "lab".to_string()).into();
        assert!(matches!(err, EngineError::TableNotFound(ref t) if t == "lab.compounds"));

        let err: EngineError = CatalogError::QueryTimeout(60).into();
        assert!(matches!(err, EngineError::Timeout(_)));
    }

    #[test]
    fn test_mismatch_message_names_required_type() {
        let err = EngineError::ForeignKeyTypeMismatch {
            column: "compound_id".to_string(),
            ref_table: "compounds".to_string(),
            ref_column: "id".to_string(),
            actual: "BIGINT".to_string(),
            required: "INT".to_string(),
        };
        assert!(err.to_string().contains("declare it as INT"));
    }
}
