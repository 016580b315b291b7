// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Catalog trait for database schema abstraction
//!
//! This module defines the async Catalog trait used for querying database schema information.

use crate::error::{CatalogError, CatalogResult};
use crate::metadata::{ColumnMatch, ColumnMetadata, TableMetadata};
use crate::scope::SchemaScope;

/// Catalog trait for database schema abstraction
///
/// This trait provides an async interface for querying schema information of one
/// database server. Every call names the schema it targets through a [`SchemaScope`],
/// so a single catalog can serve both the connection's default database and any
/// other schema reachable through it.
///
/// # Examples
///
/// ```rust,ignore
/// use sqlscout_catalog::{Catalog, CatalogError, SchemaScope};
///
/// async fn table_names(catalog: &impl Catalog) -> Result<Vec<String>, CatalogError> {
///     let tables = catalog.list_tables(&SchemaScope::Current).await?;
///     Ok(tables.into_iter().map(|t| t.name).collect())
/// }
/// ```
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// List all base tables in the schema
    ///
    /// Returned tables carry their row count estimate and comment; `columns` is
    /// left empty, use [`Catalog::get_columns`] for column details.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ConnectionFailed` if database connection fails.
    /// Returns `CatalogError::QueryTimeout` if the query exceeds timeout.
    async fn list_tables(&self, scope: &SchemaScope) -> CatalogResult<Vec<TableMetadata>>;

    /// Get column metadata for a specific table, in ordinal order
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::TableNotFound` if the table doesn't exist.
    /// Returns `CatalogError::PermissionDenied` if access is denied.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let columns = catalog.get_columns(&SchemaScope::Current, "compounds").await?;
    /// for column in columns {
    ///     println!("{}: {}", column.name, column.column_type);
    /// }
    /// ```
    async fn get_columns(&self, scope: &SchemaScope, table: &str) -> CatalogResult<Vec<ColumnMetadata>>;

    /// Whether a base table exists in the schema
    async fn table_exists(&self, scope: &SchemaScope, table: &str) -> CatalogResult<bool>;

    /// List every schema visible to the connection
    async fn list_schemas(&self) -> CatalogResult<Vec<String>>;

    /// Primary key column names in key order
    async fn primary_keys(&self, scope: &SchemaScope, table: &str) -> CatalogResult<Vec<String>> {
        let columns = self.get_columns(scope, table).await?;
        Ok(columns
            .into_iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name)
            .collect())
    }

    /// Whether a schema exists
    async fn schema_exists(&self, schema: &str) -> CatalogResult<bool> {
        let schemas = self.list_schemas().await?;
        Ok(schemas.iter().any(|s| s.eq_ignore_ascii_case(schema)))
    }

    /// Find columns whose name contains `pattern` (case-insensitive)
    async fn find_columns(&self, scope: &SchemaScope, pattern: &str) -> CatalogResult<Vec<ColumnMatch>> {
        let needle = pattern.to_lowercase();
        let mut matches = Vec::new();
        for table in self.list_tables(scope).await? {
            let columns = match self.get_columns(scope, &table.name).await {
                Ok(columns) => columns,
                Err(CatalogError::TableNotFound(_, _)) => continue,
                Err(e) => return Err(e),
            };
            for column in columns {
                if column.name.to_lowercase().contains(&needle) {
                    matches.push(ColumnMatch {
                        table: table.name.clone(),
                        table_comment: table.comment.clone(),
                        column,
                    });
                }
            }
        }
        Ok(matches)
    }
}
