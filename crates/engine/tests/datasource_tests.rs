// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Datasource routing, introspection and configuration tests

use async_trait::async_trait;
use sqlscout_catalog::{
    Catalog, CatalogError, CatalogResult, ColumnMetadata, DataType, SchemaScope, SqlExecutor,
    Statement, TableMetadata,
};
use sqlscout_engine::{
    DataSourceHandle, DataSourceKind, DataSourceRouter, EngineConfig, EngineError, SearchEngine,
    SearchMode, SqlRow, SqlValue,
};
use sqlscout_test_utils::{MockDatabase, fixtures};
use std::sync::Arc;

fn engine_with_config(db: MockDatabase, config: EngineConfig) -> SearchEngine {
    let router = DataSourceRouter::new(
        "login",
        DataSourceHandle::from_backend(Arc::new(db)),
        config.system_schemas.clone(),
    );
    SearchEngine::new(Arc::new(router), config)
}

fn engine_with(db: MockDatabase) -> SearchEngine {
    engine_with_config(db, EngineConfig::default())
}

fn assay_database() -> MockDatabase {
    MockDatabase::new("assay")
        .with_table(
            TableMetadata::new("plates", "assay").with_columns(vec![
                ColumnMetadata::new("barcode", DataType::Varchar(Some(24))).with_primary_key(),
                ColumnMetadata::new("compound", DataType::Varchar(Some(64))),
            ]),
        )
        .with_rows(
            "plates",
            vec![
                SqlRow::new().with("barcode", "PL-0001").with("compound", "aspirin"),
                SqlRow::new().with("barcode", "PL-0002").with("compound", "aspirin"),
            ],
        )
}

// Backend whose server is unreachable
struct Offline;

#[async_trait]
impl SqlExecutor for Offline {
    async fn query(&self, _sql: &str, _params: &[SqlValue]) -> CatalogResult<Vec<SqlRow>> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }

    async fn execute(&self, _sql: &str, _params: &[SqlValue]) -> CatalogResult<u64> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }

    async fn execute_ddl(&self, _sql: &str) -> CatalogResult<()> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }

    async fn execute_transaction(&self, _statements: &[Statement]) -> CatalogResult<Vec<u64>> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }
}

#[async_trait]
impl Catalog for Offline {
    async fn list_tables(&self, _scope: &SchemaScope) -> CatalogResult<Vec<TableMetadata>> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }

    async fn get_columns(&self, _scope: &SchemaScope, _table: &str) -> CatalogResult<Vec<ColumnMetadata>> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }

    async fn table_exists(&self, _scope: &SchemaScope, _table: &str) -> CatalogResult<bool> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }

    async fn list_schemas(&self) -> CatalogResult<Vec<String>> {
        Err(CatalogError::ConnectionFailed("Can't connect to MySQL server".to_string()))
    }
}

#[tokio::test]
async fn test_registered_datasource_is_routed() {
    let engine = engine_with(fixtures::lab_database());
    engine
        .register_datasource("assay", DataSourceHandle::from_backend(Arc::new(assay_database())))
        .unwrap();

    let names: Vec<_> = engine.datasources().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["login".to_string(), "assay".to_string()]);
    assert_eq!(engine.resolve("assay").unwrap().kind(), DataSourceKind::Configured);

    let tables = engine.list_tables("assay").await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "plates");

    let outcome = engine
        .search("assay", "plates", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(outcome.count, 2);
    engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(engine.cache_stats().entries, 2);

    engine.deregister_datasource("assay").unwrap();
    assert_eq!(engine.cache_stats().entries, 1);
    assert!(engine.resolve("assay").unwrap().is_user_created());
    assert!(engine.list_tables("assay").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_protected_registrations() {
    let engine = engine_with(fixtures::lab_database());
    let handle = DataSourceHandle::from_backend(Arc::new(assay_database()));

    assert!(matches!(
        engine.register_datasource("sys", handle.clone()),
        Err(EngineError::ProtectedDataSource(_))
    ));
    assert!(matches!(
        engine.register_datasource("login", handle.clone()),
        Err(EngineError::DataSourceAlreadyExists(_))
    ));
    assert!(matches!(
        engine.register_datasource("bad name", handle),
        Err(EngineError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        engine.deregister_datasource("login"),
        Err(EngineError::ProtectedDataSource(_))
    ));
}

#[test]
fn test_connection_probe() {
    let engine = engine_with(fixtures::lab_database());
    engine
        .register_datasource("offline", DataSourceHandle::from_backend(Arc::new(Offline)))
        .unwrap();

    assert!(tokio_test::block_on(engine.test_connection("")).unwrap());
    assert!(!tokio_test::block_on(engine.test_connection("offline")).unwrap());
    assert!(matches!(
        tokio_test::block_on(engine.test_connection("performance_schema")),
        Err(EngineError::UnknownDataSource(_))
    ));
}

#[tokio::test]
async fn test_unreachable_datasource_errors() {
    let engine = engine_with(fixtures::lab_database());
    engine
        .register_datasource("offline", DataSourceHandle::from_backend(Arc::new(Offline)))
        .unwrap();

    let err = engine.list_tables("offline").await.unwrap_err();
    assert!(matches!(err, EngineError::ConnectionFailure(_)));
    assert_eq!(err.kind(), "connection_failure");
}

#[tokio::test]
async fn test_introspection() {
    let engine = engine_with(fixtures::lab_database());

    let columns = engine.list_columns("", "assays").await.unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "compound_id", "result", "assay_date", "notes"]);

    assert_eq!(
        engine.primary_keys("", "compounds").await.unwrap(),
        vec!["id".to_string()]
    );

    let matches = engine.find_tables_by_column("", "NOTES").await.unwrap();
    let mut tables: Vec<_> = matches.iter().map(|m| m.table.as_str()).collect();
    tables.sort_unstable();
    assert_eq!(tables, vec!["assays", "compounds"]);

    assert!(matches!(
        engine.find_tables_by_column("", "  ").await,
        Err(EngineError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.list_columns("", "compounds`; --").await,
        Err(EngineError::InvalidIdentifier(_))
    ));
}

#[tokio::test]
async fn test_row_count_falls_back_to_estimate() {
    let engine = engine_with(fixtures::lab_database().failing_table("compounds"));
    let count = engine.exact_row_count("", "compounds").await.unwrap();
    assert!(count.approximate);
    assert_eq!(count.count, fixtures::COMPOUND_ESTIMATE);
}

#[tokio::test]
async fn test_yaml_config_drives_pagination() {
    let config = EngineConfig::from_yaml_str(
        r#"
default_datasource:
  name: login
  url: mysql://scout@localhost:3306/login
pagination:
  default_page_size: 2
  max_page_size: 3
"#,
    )
    .unwrap();
    config.validate().unwrap();
    let engine = engine_with_config(fixtures::lab_database(), config);

    let page = engine.browse("", "compounds", 1, 0).await.unwrap();
    assert_eq!(page.size, 2);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.total_pages, 3);

    let page = engine.browse("", "compounds", 1, 50).await.unwrap();
    assert_eq!(page.size, 3);
}

#[tokio::test]
async fn test_start_and_shutdown_are_idempotent() {
    let engine = engine_with(fixtures::lab_database());
    engine.start().await;
    engine.start().await;
    engine.shutdown().await;
    engine.shutdown().await;

    let outcome = engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert!(outcome.matched);
}
