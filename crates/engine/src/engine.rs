// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Search engine facade
//!
//! [`SearchEngine`] ties the router, introspector, predicate builder, cache,
//! scan orchestrator, DDL generator and bulk loader together behind one
//! cloneable handle. Every operation takes a logical datasource name; an empty
//! name means the default datasource.
//!
//! ## Lifecycle
//!
//! ```rust,ignore
//! let engine = SearchEngine::connect(config)?;
//! engine.start().await;          // spawns the cache sweeper
//! let report = engine.scan_all_tables(ScanRequest::new("", "aspirin", SearchMode::Auto)).await?;
//! engine.shutdown().await;       // stops the sweeper
//! ```

use crate::bulk::{BulkLoader, ImportReport, ImportStrategy, ValidationReport};
use crate::cache::{CacheKey, CacheStats, CachedSearch, SearchCache, SweeperHandle};
use crate::config::EngineConfig;
use crate::ddl::{
    ColumnSpec, DdlGenerator, ImportTablePlan, SUPPORTED_DATA_TYPES, create_database,
    drop_database,
};
use crate::error::{EngineError, EngineResult};
use crate::introspect::{Introspector, RowCount, TablePage, list_databases};
use crate::page::PageWindow;
use crate::predicate::{build_predicate, count_sql, normalize_value, select_page_sql};
use crate::router::{DataSourceHandle, DataSourceInfo, DataSourceRouter, LogicalDataSource};
use crate::scan::{ScanReport, ScanRequest, ScanStream, probe_table, run_scan, spawn_scan};
use serde::Serialize;
use sqlscout_catalog::{ColumnMatch, ColumnMetadata, SqlRow, SqlValue, TableMetadata};
use sqlscout_ir::SearchMode;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Result of a single-table search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchOutcome {
    pub matched: bool,
    pub count: u64,
    /// Whether the count came from the cache
    pub cached: bool,
}

/// One page of rows matching a search value
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub rows: Vec<SqlRow>,
    pub total_count: u64,
    pub total_pages: u64,
    pub page: u64,
    pub size: u64,
    pub cached: bool,
}

/// Search, browse, DDL and bulk-load engine
#[derive(Clone)]
pub struct SearchEngine {
    router: Arc<DataSourceRouter>,
    cache: Arc<SearchCache>,
    config: Arc<EngineConfig>,
    sweeper: Arc<Mutex<Option<SweeperHandle>>>,
}

impl SearchEngine {
    pub fn new(router: Arc<DataSourceRouter>, config: EngineConfig) -> Self {
        let cache = Arc::new(SearchCache::new(config.cache.clone()));
        Self {
            router,
            cache,
            config: Arc::new(config),
            sweeper: Arc::new(Mutex::new(None)),
        }
    }

    /// Open lazy MySQL pools for every configured datasource
    #[cfg(feature = "mysql")]
    pub fn connect(config: EngineConfig) -> EngineResult<Self> {
        let router = DataSourceRouter::connect(&config)?;
        Ok(Self::new(Arc::new(router), config))
    }

    /// Start background work (the cache sweeper); idempotent
    pub async fn start(&self) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_none() {
            *sweeper = Some(self.cache.start_sweeper());
            info!(default = %self.router.default_name(), "Search engine started");
        }
    }

    /// Stop background work
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.stop().await;
            info!("Search engine stopped");
        }
    }

    pub fn router(&self) -> &DataSourceRouter {
        &self.router
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolve(&self, datasource: &str) -> EngineResult<LogicalDataSource> {
        self.router.resolve(datasource)
    }

    // Datasources

    pub fn datasources(&self) -> Vec<DataSourceInfo> {
        self.router.datasources()
    }

    pub fn register_datasource(&self, name: &str, handle: DataSourceHandle) -> EngineResult<()> {
        self.router.register(name, handle)?;
        self.cache.invalidate_datasource(name);
        Ok(())
    }

    pub fn deregister_datasource(&self, name: &str) -> EngineResult<()> {
        self.router.deregister(name)?;
        self.cache.invalidate_datasource(name);
        Ok(())
    }

    pub async fn test_connection(&self, datasource: &str) -> EngineResult<bool> {
        self.router.test_connection(datasource).await
    }

    // Introspection

    pub async fn list_tables(&self, datasource: &str) -> EngineResult<Vec<TableMetadata>> {
        let ds = self.resolve(datasource)?;
        Introspector::new(&ds).list_tables().await
    }

    pub async fn list_columns(&self, datasource: &str, table: &str) -> EngineResult<Vec<ColumnMetadata>> {
        let ds = self.resolve(datasource)?;
        Introspector::new(&ds).list_columns(table).await
    }

    pub async fn primary_keys(&self, datasource: &str, table: &str) -> EngineResult<Vec<String>> {
        let ds = self.resolve(datasource)?;
        Introspector::new(&ds).primary_keys(table).await
    }

    pub async fn find_tables_by_column(
        &self,
        datasource: &str,
        pattern: &str,
    ) -> EngineResult<Vec<ColumnMatch>> {
        let ds = self.resolve(datasource)?;
        Introspector::new(&ds).find_tables_by_column(pattern).await
    }

    /// Non-system schemas on the default server
    pub async fn list_databases(&self) -> EngineResult<Vec<String>> {
        let ds = self.resolve("")?;
        list_databases(&ds, self.router.system_schemas()).await
    }

    pub async fn exact_row_count(&self, datasource: &str, table: &str) -> EngineResult<RowCount> {
        let ds = self.resolve(datasource)?;
        Introspector::new(&ds).exact_row_count(table).await
    }

    pub async fn browse(
        &self,
        datasource: &str,
        table: &str,
        page: i64,
        size: i64,
    ) -> EngineResult<TablePage> {
        let ds = self.resolve(datasource)?;
        Introspector::new(&ds)
            .browse(table, page, size, &self.config.pagination)
            .await
    }

    // Search

    /// Whether `table` contains `value`, with the exact match count
    pub async fn search(
        &self,
        datasource: &str,
        table: &str,
        value: &str,
        mode: SearchMode,
    ) -> EngineResult<SearchOutcome> {
        let value = normalize_value(value)?;
        let ds = self.resolve(datasource)?;
        let columns = Introspector::new(&ds).list_columns(table).await?;
        let probe = probe_table(&ds, &self.cache, table, &columns, value, mode).await?;
        debug!(
            datasource = %ds.name(),
            table,
            matched = probe.matched,
            count = probe.count,
            cached = probe.cached,
            "Search finished"
        );
        Ok(SearchOutcome {
            matched: probe.matched,
            count: probe.count,
            cached: probe.cached,
        })
    }

    /// Probe every table and wait for the full report
    pub async fn scan_all_tables(&self, request: ScanRequest) -> EngineResult<ScanReport> {
        let ds = self.resolve(&request.datasource)?;
        let deadline = request.deadline.unwrap_or(self.config.scan.deadline());
        run_scan(&ds, &self.cache, &request.value, request.mode, deadline, None).await
    }

    /// Probe every table on a background task, streaming events
    pub fn scan_all_tables_progressive(&self, request: ScanRequest) -> ScanStream {
        spawn_scan(
            Arc::clone(&self.router),
            Arc::clone(&self.cache),
            request,
            self.config.scan.deadline(),
            self.config.scan.event_buffer,
        )
    }

    /// One page of the rows of `table` that match `value`
    ///
    /// The mode defaults to `Auto`, so counts cached by scans are reused.
    pub async fn paginate(
        &self,
        datasource: &str,
        table: &str,
        value: &str,
        page: i64,
        size: i64,
        mode: Option<SearchMode>,
    ) -> EngineResult<SearchPage> {
        let value = normalize_value(value)?;
        let mode = mode.unwrap_or_default();
        let ds = self.resolve(datasource)?;
        let window = PageWindow::normalize(page, size, &self.config.pagination);
        let qualified = ds.qualify(table);
        let key = CacheKey::new(ds.name(), table, value, mode);

        let (search, cached) = match self.cache.get(&key) {
            Some(hit) => (hit, true),
            None => {
                let generation = self.cache.generation(ds.name(), table);
                let columns = Introspector::new(&ds).list_columns(table).await?;
                let predicate = build_predicate(table, &columns, value, mode)?;
                let count = ds
                    .executor()
                    .query_i64(&count_sql(&qualified, &predicate.where_clause), &predicate.params)
                    .await?
                    .max(0) as u64;
                let search = CachedSearch {
                    where_clause: predicate.where_clause,
                    params: predicate.params,
                    match_count: count,
                };
                self.cache.put_if_current(key, search.clone(), generation);
                (search, false)
            }
        };

        let mut params = search.params.clone();
        params.push(SqlValue::Int(window.offset as i64));
        params.push(SqlValue::Int(window.size as i64));
        let rows = ds
            .executor()
            .query(&select_page_sql(&qualified, &search.where_clause), &params)
            .await?;

        Ok(SearchPage {
            rows,
            total_count: search.match_count,
            total_pages: window.total_pages(search.match_count),
            page: window.page,
            size: window.size,
            cached,
        })
    }

    // DDL

    /// Create a table in `database` when given, else in `datasource`
    pub async fn create_table(
        &self,
        datasource: &str,
        database: Option<&str>,
        table: &str,
        columns: &[ColumnSpec],
        comment: Option<&str>,
    ) -> EngineResult<String> {
        let ds = self.router.resolve_for_database(datasource, database)?;
        let sql = DdlGenerator::new(&ds, &self.config.ddl)
            .create_table(table, columns, comment)
            .await?;
        self.cache.invalidate_table(ds.name(), table);
        Ok(sql)
    }

    pub async fn drop_table(&self, datasource: &str, table: &str) -> EngineResult<()> {
        let ds = self.resolve(datasource)?;
        let result = DdlGenerator::new(&ds, &self.config.ddl).drop_table(table).await;
        self.cache.invalidate_table(ds.name(), table);
        result
    }

    pub async fn modify_column(
        &self,
        datasource: &str,
        table: &str,
        column: &ColumnSpec,
    ) -> EngineResult<String> {
        let ds = self.resolve(datasource)?;
        let result = DdlGenerator::new(&ds, &self.config.ddl)
            .modify_column(table, column)
            .await;
        self.cache.invalidate_table(ds.name(), table);
        result
    }

    /// Create a database on the default server
    pub async fn create_database(
        &self,
        name: &str,
        charset: Option<&str>,
        collation: Option<&str>,
    ) -> EngineResult<()> {
        self.guard_database(name)?;
        let ds = self.resolve("")?;
        create_database(&ds, name, charset, collation, &self.config.ddl).await
    }

    /// Drop a user-created database
    pub async fn drop_database(&self, name: &str) -> EngineResult<()> {
        self.guard_database(name)?;
        let ds = self.resolve("")?;
        drop_database(&ds, name).await?;
        self.cache.invalidate_datasource(name);
        Ok(())
    }

    fn guard_database(&self, name: &str) -> EngineResult<()> {
        if self.router.is_system_schema(name) {
            return Err(EngineError::ProtectedDataSource(format!(
                "'{}' is a system schema",
                name
            )));
        }
        if self
            .router
            .datasources()
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(name))
        {
            return Err(EngineError::ProtectedDataSource(format!(
                "'{}' is a configured datasource",
                name
            )));
        }
        Ok(())
    }

    pub fn supported_data_types(&self) -> &'static [&'static str] {
        SUPPORTED_DATA_TYPES
    }

    /// Create a table shaped after `headers` and `rows`, then load the rows
    pub async fn import_into_new_table(
        &self,
        datasource: &str,
        table: &str,
        headers: &[String],
        rows: &[SqlRow],
    ) -> EngineResult<(ImportTablePlan, ImportReport)> {
        let ds = self.resolve(datasource)?;
        let plan = DdlGenerator::new(&ds, &self.config.ddl)
            .create_table_for_import(table, headers, rows)
            .await?;
        let loader = BulkLoader::open(&ds, table, &self.config.bulk, &self.cache).await?;
        let report = loader.insert_batch(&plan.rename_rows(rows)).await?;
        Ok((plan, report))
    }

    // Bulk load

    /// Load rows into an existing table
    ///
    /// Append skips rows whose primary key already exists, or whole-row
    /// duplicates when the table has no usable key.
    pub async fn bulk_import(
        &self,
        datasource: &str,
        table: &str,
        rows: &[SqlRow],
        strategy: ImportStrategy,
        transactional: bool,
    ) -> EngineResult<ImportReport> {
        if rows.is_empty() {
            return Err(EngineError::InvalidArgument("no rows to import".to_string()));
        }
        let ds = self.resolve(datasource)?;
        let loader = BulkLoader::open(&ds, table, &self.config.bulk, &self.cache).await?;
        let keys = loader.primary_keys();
        info!(
            datasource = %ds.name(),
            table,
            rows = rows.len(),
            strategy = %strategy,
            transactional,
            "Starting import"
        );
        loader.import(rows, strategy, transactional, &keys).await
    }

    pub async fn validate_rows(
        &self,
        datasource: &str,
        table: &str,
        rows: &[SqlRow],
    ) -> EngineResult<ValidationReport> {
        let ds = self.resolve(datasource)?;
        let loader = BulkLoader::open(&ds, table, &self.config.bulk, &self.cache).await?;
        Ok(loader.validate_rows(rows, self.config.bulk.validation_sample))
    }

    pub async fn insert_row(&self, datasource: &str, table: &str, row: &SqlRow) -> EngineResult<u64> {
        let ds = self.resolve(datasource)?;
        BulkLoader::open(&ds, table, &self.config.bulk, &self.cache)
            .await?
            .insert_row(row)
            .await
    }

    pub async fn update_rows(
        &self,
        datasource: &str,
        table: &str,
        values: &SqlRow,
        conditions: &SqlRow,
    ) -> EngineResult<u64> {
        let ds = self.resolve(datasource)?;
        BulkLoader::open(&ds, table, &self.config.bulk, &self.cache)
            .await?
            .update_rows(values, conditions)
            .await
    }

    pub async fn delete_rows(
        &self,
        datasource: &str,
        table: &str,
        conditions: &SqlRow,
    ) -> EngineResult<u64> {
        let ds = self.resolve(datasource)?;
        BulkLoader::open(&ds, table, &self.config.bulk, &self.cache)
            .await?
            .delete_rows(conditions)
            .await
    }

    // Cache

    /// Drop cached searches of one table
    pub fn clear_table_cache(&self, datasource: &str, table: &str) -> EngineResult<usize> {
        let ds = self.resolve(datasource)?;
        Ok(self.cache.invalidate_table(ds.name(), table))
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate_all();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("router", &self.router)
            .field("cache_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}
