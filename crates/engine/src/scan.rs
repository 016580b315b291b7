// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Full-scan search orchestrator
//!
//! Probes every table of a datasource for a value and reports the tables that
//! contain it, with exact match counts.
//!
//! ## Flow
//!
//! ```text
//! INIT -> ENUMERATE_TABLES -> (PROBE_TABLE)* -> DONE | TIMEOUT | ERROR
//! ```
//!
//! For each table the predicate is built, an `EXISTS` probe runs, and on a hit
//! the count comes from the [`SearchCache`] or a fresh `COUNT(*)`.
//!
//! ## Cancellation
//!
//! The deadline and the event sink are both checked at table boundaries only.
//! A probe in flight always completes. Table failures are logged and recorded
//! but never stop the scan; tables without an applicable column are skipped
//! silently.
//!
//! The progressive variant runs on its own task and pushes [`ScanEvent`]s
//! through a bounded channel. Dropping the receiver stops the scan.

use crate::cache::{CacheKey, CachedSearch, SearchCache};
use crate::error::{EngineError, EngineResult};
use crate::predicate::{build_predicate, count_sql, exists_sql, normalize_value};
use crate::router::{DataSourceRouter, LogicalDataSource};
use serde::Serialize;
use sqlscout_catalog::{ColumnMetadata, TableMetadata};
use sqlscout_ir::SearchMode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What to scan for
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub datasource: String,
    pub value: String,
    pub mode: SearchMode,
    /// Overrides the configured deadline
    pub deadline: Option<Duration>,
}

impl ScanRequest {
    pub fn new(datasource: impl Into<String>, value: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            datasource: datasource.into(),
            value: value.into(),
            mode,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A table containing the searched value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMatch {
    pub table: String,
    pub row_estimate: Option<u64>,
    pub comment: Option<String>,
    pub match_count: u64,
    pub search_value: String,
    pub datasource: String,
    pub mode: SearchMode,
    pub search_kind: String,
    pub is_complete: bool,
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    Complete,
    TimedOut,
    /// The event consumer went away
    Cancelled,
}

/// A table whose probe failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableFailure {
    pub table: String,
    pub kind: String,
    pub error: String,
}

/// Result of a scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub datasource: String,
    pub value: String,
    pub mode: SearchMode,
    pub matches: Vec<TableMatch>,
    pub outcome: ScanOutcome,
    pub searched: usize,
    pub total_tables: usize,
    pub failures: Vec<TableFailure>,
    pub elapsed_ms: u64,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == ScanOutcome::Complete
    }
}

/// Progress event of a progressive scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    Start {
        search_value: String,
        search_mode: SearchMode,
        datasource: String,
        search_kind: String,
    },
    Total {
        total_tables: usize,
    },
    Progress {
        current_table: String,
        searched: usize,
        total: usize,
        found: usize,
        percentage: u32,
        elapsed_ms: u64,
    },
    Found {
        table: TableMatch,
        found: usize,
    },
    TableError {
        table: String,
        error: String,
    },
    Timeout {
        searched: usize,
        found: usize,
    },
    Complete {
        searched: usize,
        found: usize,
        elapsed_ms: u64,
        tables: Vec<TableMatch>,
    },
    Error {
        message: String,
    },
}

/// Receiver half and worker of a progressive scan
#[derive(Debug)]
pub struct ScanStream {
    events: mpsc::Receiver<ScanEvent>,
    task: JoinHandle<EngineResult<ScanReport>>,
}

impl ScanStream {
    /// Next event, or `None` once the scan has finished
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<ScanEvent>,
        JoinHandle<EngineResult<ScanReport>>,
    ) {
        (self.events, self.task)
    }

    /// Drain every remaining event and return them with the final report
    pub async fn collect(mut self) -> EngineResult<(Vec<ScanEvent>, ScanReport)> {
        let mut events = Vec::new();
        while let Some(event) = self.events.recv().await {
            events.push(event);
        }
        let report = self
            .task
            .await
            .map_err(|e| EngineError::QueryFailed(format!("scan task failed: {}", e)))??;
        Ok((events, report))
    }
}

/// Result of probing one table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub matched: bool,
    pub count: u64,
    pub cached: bool,
}

/// Probe one table: EXISTS first, then the exact count through the cache
///
/// Returns `NoApplicableColumn` when the mode excludes every column.
pub async fn probe_table(
    ds: &LogicalDataSource,
    cache: &SearchCache,
    table: &str,
    columns: &[ColumnMetadata],
    value: &str,
    mode: SearchMode,
) -> EngineResult<ProbeResult> {
    let predicate = build_predicate(table, columns, value, mode)?;
    let qualified = ds.qualify(table);
    let generation = cache.generation(ds.name(), table);

    let exists = ds
        .executor()
        .query_i64(&exists_sql(&qualified, &predicate.where_clause), &predicate.params)
        .await?;
    if exists == 0 {
        return Ok(ProbeResult {
            matched: false,
            count: 0,
            cached: false,
        });
    }

    let key = CacheKey::new(ds.name(), table, value.trim(), mode);
    if let Some(hit) = cache.get(&key) {
        return Ok(ProbeResult {
            matched: hit.match_count > 0,
            count: hit.match_count,
            cached: true,
        });
    }

    let count = ds
        .executor()
        .query_i64(&count_sql(&qualified, &predicate.where_clause), &predicate.params)
        .await?
        .max(0) as u64;
    cache.put_if_current(
        key,
        CachedSearch {
            where_clause: predicate.where_clause,
            params: predicate.params,
            match_count: count,
        },
        generation,
    );
    Ok(ProbeResult {
        matched: count > 0,
        count,
        cached: false,
    })
}

/// Scan every table of `ds`, optionally pushing events into `sink`
pub async fn run_scan(
    ds: &LogicalDataSource,
    cache: &SearchCache,
    raw_value: &str,
    mode: SearchMode,
    deadline: Duration,
    sink: Option<&mpsc::Sender<ScanEvent>>,
) -> EngineResult<ScanReport> {
    let started = Instant::now();
    let deadline_at = started + deadline;
    let value = normalize_value(raw_value)?.to_string();
    let search_kind = mode.describe(&value);

    info!(
        datasource = %ds.name(),
        value = %value,
        mode = %mode,
        deadline_secs = deadline.as_secs(),
        "Starting full scan"
    );
    emit(
        sink,
        ScanEvent::Start {
            search_value: value.clone(),
            search_mode: mode,
            datasource: ds.name().to_string(),
            search_kind: search_kind.clone(),
        },
    )
    .await;

    let tables: Vec<TableMetadata> = ds.catalog().list_tables(ds.scope()).await?;
    let total = tables.len();
    emit(sink, ScanEvent::Total { total_tables: total }).await;

    let mut matches = Vec::new();
    let mut failures = Vec::new();
    let mut searched = 0;
    let mut outcome = ScanOutcome::Complete;

    for table in &tables {
        if sink.is_some_and(|s| s.is_closed()) {
            info!(datasource = %ds.name(), searched, "Scan consumer disconnected");
            outcome = ScanOutcome::Cancelled;
            break;
        }
        if Instant::now() >= deadline_at {
            warn!(datasource = %ds.name(), searched, total, "Scan deadline reached");
            outcome = ScanOutcome::TimedOut;
            break;
        }

        searched += 1;
        emit(
            sink,
            ScanEvent::Progress {
                current_table: table.name.clone(),
                searched,
                total,
                found: matches.len(),
                percentage: percentage(searched, total),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        )
        .await;

        let probed = match ds.catalog().get_columns(ds.scope(), &table.name).await {
            Ok(columns) => probe_table(ds, cache, &table.name, &columns, &value, mode).await,
            Err(e) => Err(e.into()),
        };

        match probed {
            Ok(result) if result.matched => {
                let found = TableMatch {
                    table: table.name.clone(),
                    row_estimate: table.row_count_estimate,
                    comment: table.comment.clone(),
                    match_count: result.count,
                    search_value: value.clone(),
                    datasource: ds.name().to_string(),
                    mode,
                    search_kind: search_kind.clone(),
                    is_complete: true,
                };
                debug!(table = %table.name, count = result.count, cached = result.cached, "Table matched");
                matches.push(found.clone());
                emit(
                    sink,
                    ScanEvent::Found {
                        table: found,
                        found: matches.len(),
                    },
                )
                .await;
            }
            Ok(_) => {}
            Err(EngineError::NoApplicableColumn { .. }) => {
                debug!(table = %table.name, mode = %mode, "No applicable column, skipped");
            }
            Err(e) => {
                warn!(datasource = %ds.name(), table = %table.name, error = %e, "Table probe failed");
                emit(
                    sink,
                    ScanEvent::TableError {
                        table: table.name.clone(),
                        error: e.to_string(),
                    },
                )
                .await;
                failures.push(TableFailure {
                    table: table.name.clone(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    if outcome == ScanOutcome::TimedOut {
        emit(
            sink,
            ScanEvent::Timeout {
                searched,
                found: matches.len(),
            },
        )
        .await;
    }
    // A timed-out scan still closes with the partial table list.
    if outcome != ScanOutcome::Cancelled {
        emit(
            sink,
            ScanEvent::Complete {
                searched,
                found: matches.len(),
                elapsed_ms,
                tables: matches.clone(),
            },
        )
        .await;
    }

    info!(
        datasource = %ds.name(),
        searched,
        total,
        found = matches.len(),
        failed = failures.len(),
        elapsed_ms,
        outcome = ?outcome,
        "Full scan finished"
    );

    Ok(ScanReport {
        datasource: ds.name().to_string(),
        value,
        mode,
        matches,
        outcome,
        searched,
        total_tables: total,
        failures,
        elapsed_ms,
    })
}

/// Start a progressive scan on its own task
pub fn spawn_scan(
    router: Arc<DataSourceRouter>,
    cache: Arc<SearchCache>,
    request: ScanRequest,
    default_deadline: Duration,
    buffer: usize,
) -> ScanStream {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let task = tokio::spawn(async move {
        let deadline = request.deadline.unwrap_or(default_deadline);
        let result = match router.resolve(&request.datasource) {
            Ok(ds) => run_scan(&ds, &cache, &request.value, request.mode, deadline, Some(&tx)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            let _ = tx
                .send(ScanEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
        result
    });
    ScanStream { events: rx, task }
}

async fn emit(sink: Option<&mpsc::Sender<ScanEvent>>, event: ScanEvent) {
    if let Some(sink) = sink {
        // A closed channel is noticed at the next table boundary.
        let _ = sink.send(event).await;
    }
}

fn percentage(searched: usize, total: usize) -> u32 {
    if total == 0 {
        100
    } else {
        ((searched * 100) / total) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::router::DataSourceHandle;
    use sqlscout_test_utils::{MockDatabase, fixtures};

    fn router(db: MockDatabase) -> Arc<DataSourceRouter> {
        Arc::new(DataSourceRouter::new(
            "login",
            DataSourceHandle::from_backend(Arc::new(db)),
            vec!["mysql".to_string()],
        ))
    }

    fn cache() -> Arc<SearchCache> {
        Arc::new(SearchCache::new(CacheConfig::default()))
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 100);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(3, 3), 100);
    }

    #[tokio::test]
    async fn test_scan_finds_text_value() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let cache = cache();
        let report = run_scan(&ds, &cache, "aspirin", SearchMode::Auto, Duration::from_secs(60), None)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.searched, report.total_tables);
        let tables: Vec<_> = report.matches.iter().map(|m| m.table.as_str()).collect();
        assert_eq!(tables, vec!["compounds"]);
        assert_eq!(report.matches[0].match_count, 1);
        assert_eq!(report.matches[0].search_kind, "auto: text value, text columns");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_scan_records_failures_and_continues() {
        let db = fixtures::lab_database().failing_table("assays");
        let router = router(db);
        let ds = router.resolve("").unwrap();
        let report = run_scan(&ds, &cache(), "1", SearchMode::Auto, Duration::from_secs(60), None)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].table, "assays");
        assert!(report.matches.iter().any(|m| m.table == "compounds"));
    }

    #[tokio::test]
    async fn test_scan_zero_deadline_times_out() {
        let router = router(fixtures::lab_database());
        let ds = router.resolve("").unwrap();
        let report = run_scan(&ds, &cache(), "aspirin", SearchMode::Auto, Duration::ZERO, None)
            .await
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::TimedOut);
        assert_eq!(report.searched, 0);
        assert!(report.matches.is_empty());
    }

    #[tokio::test]
    async fn test_progressive_event_order() {
        let stream = spawn_scan(
            router(fixtures::lab_database()),
            cache(),
            ScanRequest::new("", "aspirin", SearchMode::Auto),
            Duration::from_secs(60),
            8,
        );
        let (events, report) = stream.collect().await.unwrap();

        assert!(matches!(events.first(), Some(ScanEvent::Start { .. })));
        assert!(matches!(events.get(1), Some(ScanEvent::Total { total_tables }) if *total_tables == report.total_tables));
        assert!(matches!(events.last(), Some(ScanEvent::Complete { found: 1, .. })));
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Progress {
                    searched, percentage, ..
                } => Some((*searched, *percentage)),
                _ => None,
            })
            .collect();
        assert_eq!(progress.len(), report.total_tables);
        assert_eq!(progress.first(), Some(&(1, 33)));
        assert_eq!(progress.last(), Some(&(report.total_tables, 100)));
    }

    #[tokio::test]
    async fn test_progressive_unknown_datasource_emits_error() {
        let stream = spawn_scan(
            router(fixtures::lab_database()),
            cache(),
            ScanRequest::new("mysql", "aspirin", SearchMode::Auto),
            Duration::from_secs(60),
            8,
        );
        let (mut events, task) = stream.into_parts();
        assert!(matches!(events.recv().await, Some(ScanEvent::Error { .. })));
        assert!(matches!(task.await.unwrap(), Err(EngineError::UnknownDataSource(_))));
    }
}
