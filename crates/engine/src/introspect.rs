// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Schema introspection
//!
//! Table and column listings, exact row counts and unfiltered browsing for a
//! resolved datasource.

use crate::config::PaginationConfig;
use crate::error::{EngineError, EngineResult};
use crate::ident::validate_identifier;
use crate::page::PageWindow;
use crate::router::LogicalDataSource;
use serde::Serialize;
use sqlscout_catalog::{ColumnMatch, ColumnMetadata, SqlRow, SqlValue, TableMetadata};
use tracing::{debug, warn};

/// Row count with a flag telling whether it came from the catalog estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowCount {
    pub count: u64,
    pub approximate: bool,
}

/// One page of an unfiltered table
#[derive(Debug, Clone, Serialize)]
pub struct TablePage {
    pub rows: Vec<SqlRow>,
    pub total_count: u64,
    pub total_pages: u64,
    pub page: u64,
    pub size: u64,
    pub approximate: bool,
}

/// `SELECT COUNT(*)` over a whole table
pub fn count_all_sql(qualified: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", qualified)
}

/// Unfiltered page; binds offset then size
pub fn select_page_sql(qualified: &str) -> String {
    format!("SELECT * FROM {} LIMIT ?, ?", qualified)
}

/// Schema reader bound to one datasource
pub struct Introspector<'a> {
    ds: &'a LogicalDataSource,
}

impl<'a> Introspector<'a> {
    pub fn new(ds: &'a LogicalDataSource) -> Self {
        Self { ds }
    }

    /// Base tables of the datasource, by name
    pub async fn list_tables(&self) -> EngineResult<Vec<TableMetadata>> {
        let tables = self.ds.catalog().list_tables(self.ds.scope()).await?;
        debug!(datasource = %self.ds.name(), count = tables.len(), "Listed tables");
        Ok(tables)
    }

    /// Columns of `table` in ordinal order
    pub async fn list_columns(&self, table: &str) -> EngineResult<Vec<ColumnMetadata>> {
        validate_identifier(table)?;
        let columns = self.ds.catalog().get_columns(self.ds.scope(), table).await?;
        if columns.is_empty() {
            return Err(EngineError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    /// Fails with `TableNotFound` unless `table` exists
    pub async fn require_table(&self, table: &str) -> EngineResult<()> {
        validate_identifier(table)?;
        if self.ds.catalog().table_exists(self.ds.scope(), table).await? {
            Ok(())
        } else {
            Err(EngineError::TableNotFound(table.to_string()))
        }
    }

    pub async fn table_exists(&self, table: &str) -> EngineResult<bool> {
        validate_identifier(table)?;
        Ok(self.ds.catalog().table_exists(self.ds.scope(), table).await?)
    }

    pub async fn primary_keys(&self, table: &str) -> EngineResult<Vec<String>> {
        validate_identifier(table)?;
        Ok(self.ds.catalog().primary_keys(self.ds.scope(), table).await?)
    }

    /// Columns whose name contains `pattern`, case-insensitively
    pub async fn find_tables_by_column(&self, pattern: &str) -> EngineResult<Vec<ColumnMatch>> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(EngineError::InvalidArgument(
                "column pattern cannot be empty".to_string(),
            ));
        }
        Ok(self
            .ds
            .catalog()
            .find_columns(self.ds.scope(), pattern)
            .await?)
    }

    /// Exact `COUNT(*)`, falling back to the catalog estimate on failure
    pub async fn exact_row_count(&self, table: &str) -> EngineResult<RowCount> {
        validate_identifier(table)?;
        let sql = count_all_sql(&self.ds.qualify(table));
        match self.ds.executor().query_i64(&sql, &[]).await {
            Ok(count) => Ok(RowCount {
                count: count.max(0) as u64,
                approximate: false,
            }),
            Err(e) => {
                warn!(
                    datasource = %self.ds.name(),
                    table,
                    error = %e,
                    "COUNT(*) failed, using catalog estimate"
                );
                let estimate = self
                    .ds
                    .catalog()
                    .list_tables(self.ds.scope())
                    .await
                    .ok()
                    .and_then(|tables| {
                        tables
                            .into_iter()
                            .find(|t| t.name.eq_ignore_ascii_case(table))
                            .and_then(|t| t.row_count_estimate)
                    })
                    .unwrap_or(0);
                Ok(RowCount {
                    count: estimate,
                    approximate: true,
                })
            }
        }
    }

    /// One unfiltered page of `table`
    pub async fn browse(
        &self,
        table: &str,
        page: i64,
        size: i64,
        limits: &PaginationConfig,
    ) -> EngineResult<TablePage> {
        self.require_table(table).await?;
        let window = PageWindow::normalize(page, size, limits);
        let total = self.exact_row_count(table).await?;

        let rows = self
            .ds
            .executor()
            .query(
                &select_page_sql(&self.ds.qualify(table)),
                &[
                    SqlValue::Int(window.offset as i64),
                    SqlValue::Int(window.size as i64),
                ],
            )
            .await?;

        Ok(TablePage {
            rows,
            total_count: total.count,
            total_pages: window.total_pages(total.count),
            page: window.page,
            size: window.size,
            approximate: total.approximate,
        })
    }
}

/// Schemas on the default server that are not system schemas
pub async fn list_databases(
    ds: &LogicalDataSource,
    system_schemas: &[String],
) -> EngineResult<Vec<String>> {
    let mut schemas: Vec<String> = ds
        .catalog()
        .list_schemas()
        .await?
        .into_iter()
        .filter(|s| !system_schemas.iter().any(|sys| sys.eq_ignore_ascii_case(s)))
        .collect();
    schemas.sort();
    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{DataSourceHandle, DataSourceRouter};
    use sqlscout_catalog::DataType;
    use sqlscout_test_utils::{MockDatabase, fixtures};
    use std::sync::Arc;

    fn router(db: MockDatabase) -> DataSourceRouter {
        DataSourceRouter::new(
            "login",
            DataSourceHandle::from_backend(Arc::new(db)),
            vec!["mysql".to_string(), "information_schema".to_string()],
        )
    }

    #[tokio::test]
    async fn test_list_columns_in_ordinal_order() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let columns = Introspector::new(&ds).list_columns("compounds").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names[0], "id");
        assert!(columns[0].is_primary_key);
        assert!(matches!(columns[0].data_type, DataType::Integer));
    }

    #[tokio::test]
    async fn test_list_columns_missing_table() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let result = Introspector::new(&ds).list_columns("nope").await;
        assert!(matches!(result, Err(EngineError::TableNotFound(_))));
    }

    #[tokio::test]
    async fn test_exact_row_count() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let count = Introspector::new(&ds).exact_row_count("compounds").await.unwrap();
        assert_eq!(count.count, fixtures::COMPOUND_ROWS as u64);
        assert!(!count.approximate);
    }

    #[tokio::test]
    async fn test_exact_row_count_falls_back_to_estimate() {
        let db = fixtures::lab_database().failing_table("compounds");
        let router = router(db);
        let ds = router.resolve("").unwrap();
        let count = Introspector::new(&ds).exact_row_count("compounds").await.unwrap();
        assert!(count.approximate);
        assert_eq!(count.count, fixtures::COMPOUND_ESTIMATE);
    }

    #[tokio::test]
    async fn test_browse_clamps_window() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let page = Introspector::new(&ds)
            .browse("compounds", 0, 2, &PaginationConfig::default())
            .await
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.size, 2);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.total_count, fixtures::COMPOUND_ROWS as u64);
        assert_eq!(page.total_pages, (fixtures::COMPOUND_ROWS as u64).div_ceil(2));
    }

    #[tokio::test]
    async fn test_find_tables_by_column() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let intro = Introspector::new(&ds);
        let matches = intro.find_tables_by_column("COMPOUND").await.unwrap();
        assert!(matches.iter().any(|m| m.table == "assays" && m.column.name == "compound_id"));
        assert!(matches!(
            intro.find_tables_by_column("  ").await,
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_list_databases_excludes_system_schemas() {
        let db = fixtures::lab_database().with_schema("mysql").with_schema("lab_2024");
        let router = router(db);
        let ds = router.resolve("").unwrap();
        let dbs = list_databases(&ds, router.system_schemas()).await.unwrap();
        assert!(dbs.contains(&"lab_2024".to_string()));
        assert!(!dbs.contains(&"mysql".to_string()));
    }
}
