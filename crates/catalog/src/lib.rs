// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlscout - Catalog Layer
//!
//! This crate provides the two seams the search engine talks to a database through:
//!
//! - **[`Catalog`]**: schema information (tables, columns, keys, schemas)
//! - **[`SqlExecutor`]**: parameterized queries, updates, DDL and transactions
//!
//! ## Architecture
//!
//! The catalog layer is responsible for:
//! - Providing schema information for any schema reachable from a connection ([`SchemaScope`])
//! - Executing statements with positionally bound [`SqlValue`] parameters
//! - Classifying server errors into [`CatalogError`] kinds
//!
//! [`LiveMySQLCatalog`] (feature `mysql`) implements both traits over one sqlx pool.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sqlscout_catalog::{Catalog, CatalogError, SchemaScope};
//!
//! async fn print_tables(catalog: &impl Catalog) -> Result<(), CatalogError> {
//!     let tables = catalog.list_tables(&SchemaScope::Current).await?;
//!     for table in tables {
//!         println!("{}.{}", table.schema, table.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod executor;
#[cfg(feature = "mysql")]
pub mod live_mysql;
pub mod metadata;
pub mod scope;
pub mod r#trait;

// Re-exports
pub use error::{CatalogError, CatalogResult, classify_mysql_error};
pub use executor::{SqlExecutor, Statement};
#[cfg(feature = "mysql")]
pub use live_mysql::{LiveMySQLCatalog, PoolOptions};
pub use metadata::{
    ColumnMatch, ColumnMetadata, DataType, SqlRow, SqlValue, TableMetadata, TableReference,
    TableType,
};
pub use r#trait::Catalog;
pub use scope::{SchemaScope, quote_identifier};
