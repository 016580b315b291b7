// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Value search, pagination and scan tests
//!
//! Runs the engine facade against the in-memory lab database.

use async_trait::async_trait;
use sqlscout_catalog::{CatalogResult, SqlExecutor, Statement};
use sqlscout_engine::{
    DataSourceHandle, DataSourceRouter, EngineConfig, EngineError, ScanEvent, ScanOutcome,
    ScanRequest, SearchEngine, SearchMode, SqlRow, SqlValue,
};
use sqlscout_test_utils::{MockDatabase, fixtures};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

// Executor that holds back every COUNT(*) result for five seconds
struct SlowCount(MockDatabase);

#[async_trait]
impl SqlExecutor for SlowCount {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<Vec<SqlRow>> {
        let rows = self.0.query(sql, params).await?;
        if sql.starts_with("SELECT COUNT(*)") {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        Ok(rows)
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<u64> {
        self.0.execute(sql, params).await
    }

    async fn execute_ddl(&self, sql: &str) -> CatalogResult<()> {
        self.0.execute_ddl(sql).await
    }

    async fn execute_transaction(&self, statements: &[Statement]) -> CatalogResult<Vec<u64>> {
        self.0.execute_transaction(statements).await
    }
}

// Matching rows per table, computed straight from the stored rows
fn expected_matches(db: &MockDatabase, value: &str, mode: SearchMode) -> BTreeMap<String, u64> {
    let numeric_value = sqlscout_engine::is_numeric_literal(value);
    let needle = value.to_lowercase();
    let mut expected = BTreeMap::new();

    for table in ["compounds", "assays", "readings"] {
        let meta = db.table(table).unwrap();
        let columns: Vec<_> = meta
            .columns
            .iter()
            .filter(|c| match mode {
                SearchMode::All => true,
                SearchMode::TextOnly => !c.data_type.is_numeric(),
                SearchMode::NumericOnly => c.data_type.is_numeric(),
                SearchMode::Auto => !c.data_type.is_numeric() || numeric_value,
            })
            .collect();

        let count = db
            .rows(table)
            .iter()
            .filter(|row| {
                columns.iter().any(|c| {
                    let Some(cell) = row.get(&c.name) else {
                        return false;
                    };
                    let text_hit = cell
                        .as_text()
                        .is_some_and(|t| t.to_lowercase().contains(&needle));
                    let equal_hit = c.data_type.is_numeric()
                        && numeric_value
                        && cell.as_f64().zip(value.parse::<f64>().ok()).is_some_and(|(a, b)| a == b);
                    text_hit || equal_hit
                })
            })
            .count() as u64;
        if count > 0 {
            expected.insert(table.to_string(), count);
        }
    }
    expected
}

fn engine_with(db: MockDatabase) -> SearchEngine {
    let config = EngineConfig::default();
    let router = DataSourceRouter::new(
        "login",
        DataSourceHandle::from_backend(Arc::new(db)),
        config.system_schemas.clone(),
    );
    SearchEngine::new(Arc::new(router), config)
}

fn engine() -> SearchEngine {
    engine_with(fixtures::lab_database())
}

#[tokio::test]
async fn test_search_counts_then_hits_cache() {
    let engine = engine();

    let first = engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert!(first.matched);
    assert_eq!(first.count, 1);
    assert!(!first.cached);

    let second = engine
        .search("login", "compounds", "  aspirin ", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(second.count, 1);
    assert!(second.cached);

    let stats = engine.cache_stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn test_search_without_match_is_not_cached() {
    let engine = engine();
    let outcome = engine
        .search("", "compounds", "warfarin", SearchMode::Auto)
        .await
        .unwrap();
    assert!(!outcome.matched);
    assert_eq!(outcome.count, 0);
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_search_rejects_blank_value() {
    let result = engine().search("", "compounds", "   ", SearchMode::Auto).await;
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_search_without_applicable_column() {
    let result = engine()
        .search("", "readings", "aspirin", SearchMode::TextOnly)
        .await;
    assert!(matches!(result, Err(EngineError::NoApplicableColumn { .. })));
}

#[tokio::test]
async fn test_search_missing_table() {
    let result = engine()
        .search("", "nope", "aspirin", SearchMode::Auto)
        .await;
    assert!(matches!(result, Err(EngineError::TableNotFound(_))));
}

#[tokio::test]
async fn test_numeric_value_matches_exact_and_substring() {
    // id = 1 exactly, and 37.1 through its text form
    let outcome = engine()
        .search("", "readings", "1", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(outcome.count, 2);

    let numeric_only = engine()
        .search("", "compounds", "194.19", SearchMode::NumericOnly)
        .await
        .unwrap();
    assert_eq!(numeric_only.count, 1);
}

#[tokio::test]
async fn test_like_wildcards_in_value_are_literal() {
    let engine = engine();
    let percent = engine
        .search("", "compounds", "50%", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(percent.count, 1);

    let underscore = engine
        .search("", "compounds", "5_-", SearchMode::Auto)
        .await
        .unwrap();
    assert!(!underscore.matched);
}

#[tokio::test]
async fn test_paginate_reuses_scan_results() {
    let engine = engine();
    let report = engine
        .scan_all_tables(ScanRequest::new("", "C8", SearchMode::Auto))
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].match_count, 2);

    let first = engine
        .paginate("", "compounds", "C8", 1, 1, None)
        .await
        .unwrap();
    assert!(first.cached);
    assert_eq!(first.total_count, 2);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.rows.len(), 1);

    let second = engine
        .paginate("", "compounds", "C8", 2, 1, None)
        .await
        .unwrap();
    assert_eq!(second.rows.len(), 1);
    assert_ne!(first.rows[0].get("id"), second.rows[0].get("id"));
}

#[tokio::test]
async fn test_paginate_counts_on_cache_miss() {
    let engine = engine();
    let page = engine
        .paginate("", "compounds", "C8", 0, 0, Some(SearchMode::TextOnly))
        .await
        .unwrap();
    assert!(!page.cached);
    assert_eq!(page.page, 1);
    assert_eq!(page.size, engine.config().pagination.default_page_size);
    assert_eq!(page.rows.len(), 2);

    let huge = engine
        .paginate("", "compounds", "C8", 1, 1_000_000, Some(SearchMode::TextOnly))
        .await
        .unwrap();
    assert!(huge.cached);
    assert_eq!(huge.size, engine.config().pagination.max_page_size);
}

#[tokio::test]
async fn test_paginate_past_the_end_is_empty() {
    let page = engine()
        .paginate("", "compounds", "aspirin", 9, 10, None)
        .await
        .unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total_count, 1);
    assert_eq!(page.total_pages, 1);
}

#[tokio::test]
async fn test_writes_invalidate_cached_counts() {
    let db = fixtures::lab_database();
    let engine = engine_with(db.clone());

    engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    engine
        .insert_row(
            "",
            "compounds",
            &SqlRow::new().with("name", "aspirin forte").with("formula", "C9H8O4"),
        )
        .await
        .unwrap();

    let outcome = engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert!(!outcome.cached);
    assert_eq!(outcome.count, 2);
    assert_eq!(db.rows("compounds").len(), fixtures::COMPOUND_ROWS + 1);
}

#[tokio::test]
async fn test_clear_table_cache() {
    let engine = engine();
    engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    engine
        .search("", "assays", "COX", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(engine.clear_table_cache("", "compounds").unwrap(), 1);
    assert_eq!(engine.cache_stats().entries, 1);
    engine.clear_cache();
    assert!(engine.cache().is_empty());
}

#[tokio::test]
async fn test_search_in_user_created_database() {
    let db = fixtures::lab_database().with_table_in("lab_2024", fixtures::readings_table());
    let engine = engine_with(db);

    let tables = engine.list_tables("lab_2024").await.unwrap();
    assert_eq!(tables.len(), 1);

    let outcome = engine
        .search("lab_2024", "readings", "1", SearchMode::Auto)
        .await
        .unwrap();
    assert!(!outcome.matched);

    assert!(matches!(
        engine.search("mysql", "user", "root", SearchMode::Auto).await,
        Err(EngineError::UnknownDataSource(_))
    ));
}

#[tokio::test]
async fn test_scan_reports_failures_and_continues() {
    let engine = engine_with(fixtures::lab_database().failing_table("assays"));
    let report = engine
        .scan_all_tables(ScanRequest::new("", "1", SearchMode::Auto))
        .await
        .unwrap();

    assert_eq!(report.outcome, ScanOutcome::Complete);
    assert_eq!(report.searched, 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "query_failed");
    let tables: Vec<_> = report.matches.iter().map(|m| m.table.as_str()).collect();
    assert_eq!(tables, vec!["compounds", "readings"]);
    assert_eq!(report.matches[0].row_estimate, Some(fixtures::COMPOUND_ESTIMATE));
}

#[tokio::test(start_paused = true)]
async fn test_scan_stops_at_deadline() {
    let db = fixtures::lab_database().with_latency(Duration::from_secs(10));
    let engine = engine_with(db);

    let report = engine
        .scan_all_tables(
            ScanRequest::new("", "aspirin", SearchMode::Auto)
                .with_deadline(Duration::from_secs(15)),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ScanOutcome::TimedOut);
    assert!(!report.is_complete());
    assert_eq!(report.searched, 2);
    assert_eq!(report.total_tables, 3);
    assert_eq!(report.matches.len(), 1);
}

#[tokio::test]
async fn test_progressive_scan_streams_matches() {
    let engine = engine();
    let mut stream =
        engine.scan_all_tables_progressive(ScanRequest::new("", "aspirin", SearchMode::Auto));

    let mut found = Vec::new();
    let mut last = None;
    while let Some(event) = stream.recv().await {
        if let ScanEvent::Found { table, .. } = &event {
            found.push(table.table.clone());
        }
        last = Some(event);
    }
    assert_eq!(found, vec!["compounds".to_string()]);
    match last {
        Some(ScanEvent::Complete { searched, tables, .. }) => {
            assert_eq!(searched, 3);
            assert_eq!(tables.len(), 1);
        }
        other => panic!("expected a final Complete event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_progressive_scan_cancels_when_consumer_leaves() {
    let db = fixtures::lab_database();
    let engine = engine_with(db.clone());
    let stream = engine.scan_all_tables_progressive(ScanRequest::new("", "aspirin", SearchMode::Auto));

    let (events, task) = stream.into_parts();
    drop(events);
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.outcome, ScanOutcome::Cancelled);
    assert!(report.searched < report.total_tables);
}

#[tokio::test]
async fn test_scan_event_wire_format() {
    let event = ScanEvent::Progress {
        current_table: "compounds".to_string(),
        searched: 1,
        total: 3,
        found: 0,
        percentage: 33,
        elapsed_ms: 12,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "progress");
    assert_eq!(json["current_table"], "compounds");
    assert_eq!(json["percentage"], 33);
}

#[tokio::test]
async fn test_browse_and_exact_count() {
    let engine = engine();
    let page = engine.browse("", "assays", 1, 2).await.unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.total_count, 3);
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.rows[0].get("compound_id"), Some(&SqlValue::Int(1)));

    let count = engine.exact_row_count("", "compounds").await.unwrap();
    assert_eq!(count.count, fixtures::COMPOUND_ROWS as u64);
    assert!(!count.approximate);
}

#[tokio::test]
async fn test_scan_agrees_with_row_by_row_check() {
    let db = fixtures::lab_database();
    let engine = engine_with(db.clone());
    let modes = [
        SearchMode::Auto,
        SearchMode::TextOnly,
        SearchMode::NumericOnly,
        SearchMode::All,
    ];

    for value in ["aspirin", "1", "C8", "50%", "0.8", "2024", "nacl", "36.6", "zzz"] {
        for mode in modes {
            let report = engine
                .scan_all_tables(ScanRequest::new("", value, mode))
                .await
                .unwrap();
            assert!(report.is_complete());
            assert!(report.failures.is_empty());

            let found: BTreeMap<String, u64> = report
                .matches
                .iter()
                .map(|m| (m.table.clone(), m.match_count))
                .collect();
            assert_eq!(found, expected_matches(&db, value, mode), "value {value:?}, mode {mode}");
        }
    }
}

#[tokio::test]
async fn test_consecutive_pages_equal_one_double_page() {
    let engine = engine();
    let ids = |rows: &[SqlRow]| -> Vec<SqlValue> {
        rows.iter().filter_map(|r| r.get("id").cloned()).collect()
    };

    for mode in [SearchMode::Auto, SearchMode::TextOnly, SearchMode::All] {
        let first = engine
            .paginate("", "compounds", "c", 1, 2, Some(mode))
            .await
            .unwrap();
        let second = engine
            .paginate("", "compounds", "c", 2, 2, Some(mode))
            .await
            .unwrap();
        let double = engine
            .paginate("", "compounds", "c", 1, 4, Some(mode))
            .await
            .unwrap();
        assert!(double.total_count >= 4);

        let mut joined = ids(&first.rows);
        for id in ids(&second.rows) {
            if !joined.contains(&id) {
                joined.push(id);
            }
        }
        assert_eq!(joined, ids(&double.rows));
    }
}

#[tokio::test(start_paused = true)]
async fn test_progressive_scan_completes_after_timeout() {
    let db = fixtures::lab_database().with_latency(Duration::from_secs(10));
    let engine = engine_with(db);
    let stream = engine.scan_all_tables_progressive(
        ScanRequest::new("", "aspirin", SearchMode::Auto).with_deadline(Duration::from_secs(15)),
    );

    let (events, report) = stream.collect().await.unwrap();
    assert_eq!(report.outcome, ScanOutcome::TimedOut);

    let n = events.len();
    assert!(n >= 2);
    assert!(matches!(events[n - 2], ScanEvent::Timeout { searched: 2, found: 1 }));
    match &events[n - 1] {
        ScanEvent::Complete {
            searched,
            found,
            tables,
            ..
        } => {
            assert_eq!(*searched, 2);
            assert_eq!(*found, 1);
            assert_eq!(tables.len(), 1);
            assert_eq!(tables[0].table, "compounds");
        }
        other => panic!("expected a final Complete event, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_count_read_before_concurrent_write_is_not_cached() {
    let db = fixtures::lab_database();
    let config = EngineConfig::default();
    let router = DataSourceRouter::new(
        "login",
        DataSourceHandle::new(Arc::new(SlowCount(db.clone())), Arc::new(db.clone())),
        config.system_schemas.clone(),
    );
    let engine = SearchEngine::new(Arc::new(router), config);

    let reader = engine.clone();
    let search = tokio::spawn(async move {
        reader
            .search("", "compounds", "aspirin", SearchMode::Auto)
            .await
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    engine
        .insert_row(
            "",
            "Compounds",
            &SqlRow::new().with("name", "aspirin forte").with("formula", "C9H8O4"),
        )
        .await
        .unwrap();

    let stale = search.await.unwrap().unwrap();
    assert_eq!(stale.count, 1);
    assert!(engine.cache().is_empty());

    let fresh = engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert!(!fresh.cached);
    assert_eq!(fresh.count, 2);
}

#[tokio::test]
async fn test_write_with_other_case_invalidates_cached_count() {
    let db = fixtures::lab_database();
    let engine = engine_with(db.clone());
    engine
        .search("", "compounds", "aspirin", SearchMode::Auto)
        .await
        .unwrap();
    assert_eq!(engine.clear_table_cache("", "COMPOUNDS").unwrap(), 1);
    assert!(engine.cache().is_empty());
}
