// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Bulk loader
//!
//! Writes rows into an existing table: batched multi-row inserts, single
//! transaction inserts, overwrite and de-duplicating append, plus single-row
//! insert, update and delete.
//!
//! Blank values bound to numeric columns become `NULL`. Every write
//! invalidates the search cache for its table on success and on failure.

use crate::cache::SearchCache;
use crate::config::BulkConfig;
use crate::error::{EngineError, EngineResult};
use crate::ident::validate_identifiers;
use crate::introspect::Introspector;
use crate::router::LogicalDataSource;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlscout_catalog::{ColumnMetadata, DataType, SqlRow, SqlValue, Statement, quote_identifier};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Placeholder limit of one prepared statement
const MAX_PLACEHOLDERS: usize = 65_535;

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid regex"));
static DATETIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}([ T]\d{1,2}:\d{2}(:\d{2}(\.\d{1,6})?)?)?$").expect("valid regex")
});
static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d{1,3}:\d{2}(:\d{2}(\.\d{1,6})?)?$").expect("valid regex"));

/// How an import treats existing rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStrategy {
    /// Keep existing rows and skip duplicates
    #[default]
    Append,
    /// Delete every row first
    Overwrite,
}

impl fmt::Display for ImportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStrategy::Append => f.write_str("append"),
            ImportStrategy::Overwrite => f.write_str("overwrite"),
        }
    }
}

impl FromStr for ImportStrategy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(ImportStrategy::Append),
            "overwrite" => Ok(ImportStrategy::Overwrite),
            other => Err(EngineError::InvalidArgument(format!(
                "unknown import strategy '{}', expected append or overwrite",
                other
            ))),
        }
    }
}

/// Outcome of a bulk write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub table: String,
    pub datasource: String,
    pub strategy: ImportStrategy,
    pub transactional: bool,
    pub total: usize,
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub deleted_rows: Option<u64>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
    pub message: Option<String>,
}

impl ImportReport {
    fn new(loader: &BulkLoader<'_>, strategy: ImportStrategy, transactional: bool, total: usize) -> Self {
        Self {
            table: loader.table.clone(),
            datasource: loader.ds.name().to_string(),
            strategy,
            transactional,
            total,
            success: 0,
            failure: 0,
            skipped: 0,
            deleted_rows: None,
            errors: Vec::new(),
            duration_ms: 0,
            message: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure == 0
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFinding {
    /// 1-based input row, when the finding is about one row
    pub row: Option<usize>,
    pub column: Option<String>,
    pub kind: String,
    pub message: String,
}

/// Pre-import validation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub total_rows: usize,
    pub sampled_rows: usize,
    pub errors: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
}

/// Rows lined up against real table columns
struct PreparedRows {
    columns: Vec<String>,
    values: Vec<Vec<SqlValue>>,
}

/// Writer for one table
pub struct BulkLoader<'a> {
    ds: &'a LogicalDataSource,
    table: String,
    columns: Vec<ColumnMetadata>,
    config: &'a BulkConfig,
    cache: &'a SearchCache,
}

impl<'a> BulkLoader<'a> {
    /// Bind to `table`, failing with `TableNotFound` if it does not exist
    pub async fn open(
        ds: &'a LogicalDataSource,
        table: &str,
        config: &'a BulkConfig,
        cache: &'a SearchCache,
    ) -> EngineResult<Self> {
        let introspector = Introspector::new(ds);
        introspector.require_table(table).await?;
        let columns = introspector.list_columns(table).await?;
        Ok(Self {
            ds,
            table: table.to_string(),
            columns,
            config,
            cache,
        })
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Primary key column names of the table
    pub fn primary_keys(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    fn column(&self, name: &str) -> EngineResult<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| EngineError::ColumnNotFound(format!("{}.{}", self.table, name)))
    }

    fn invalidate(&self) {
        self.cache.invalidate_table(self.ds.name(), &self.table);
    }

    fn coerce(column: &ColumnMetadata, value: &SqlValue) -> SqlValue {
        if column.data_type.is_numeric() && value.is_blank() {
            SqlValue::Null
        } else {
            value.clone()
        }
    }

    /// Map input rows onto table columns, in first-seen column order
    fn prepare(&self, rows: &[SqlRow]) -> EngineResult<PreparedRows> {
        let mut seen = HashSet::new();
        let mut targets: Vec<(String, &ColumnMetadata)> = Vec::new();
        for row in rows {
            validate_identifiers(row.column_names())?;
            for name in row.column_names() {
                if seen.insert(name.to_lowercase()) {
                    targets.push((name.to_string(), self.column(name)?));
                }
            }
        }
        if targets.is_empty() {
            return Err(EngineError::InvalidArgument(
                "rows carry no columns".to_string(),
            ));
        }

        let values = rows
            .iter()
            .map(|row| {
                targets
                    .iter()
                    .map(|(input, column)| {
                        row.get(input)
                            .map(|v| Self::coerce(column, v))
                            .unwrap_or(SqlValue::Null)
                    })
                    .collect()
            })
            .collect();

        Ok(PreparedRows {
            columns: targets.into_iter().map(|(_, c)| c.name.clone()).collect(),
            values,
        })
    }

    fn chunk_size(&self, column_count: usize) -> usize {
        self.config
            .batch_size
            .min(MAX_PLACEHOLDERS / column_count.max(1))
            .max(1)
    }

    fn insert_statement(&self, columns: &[String], rows: &[Vec<SqlValue>]) -> Statement {
        let column_list = columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let tuple = format!("({})", vec!["?"; columns.len()].join(", "));
        let tuples = vec![tuple; rows.len()].join(", ");
        Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES {}",
                self.ds.qualify(&self.table),
                column_list,
                tuples
            ),
            rows.iter().flatten().cloned().collect(),
        )
    }

    fn insert_statements(&self, prepared: &PreparedRows) -> Vec<Statement> {
        let size = self.chunk_size(prepared.columns.len());
        prepared
            .values
            .chunks(size)
            .map(|chunk| self.insert_statement(&prepared.columns, chunk))
            .collect()
    }

    fn delete_all_statement(&self) -> Statement {
        Statement::new(format!("DELETE FROM {}", self.ds.qualify(&self.table)), Vec::new())
    }

    /// Multi-row inserts per batch; failed batches are reported, not fatal
    pub async fn insert_batch(&self, rows: &[SqlRow]) -> EngineResult<ImportReport> {
        let result = self.insert_batch_inner(rows, ImportStrategy::Append).await;
        self.invalidate();
        result
    }

    async fn insert_batch_inner(
        &self,
        rows: &[SqlRow],
        strategy: ImportStrategy,
    ) -> EngineResult<ImportReport> {
        let started = Instant::now();
        let mut report = ImportReport::new(self, strategy, false, rows.len());
        if rows.is_empty() {
            return Ok(report);
        }
        let prepared = self.prepare(rows)?;
        let size = self.chunk_size(prepared.columns.len());

        for (index, chunk) in prepared.values.chunks(size).enumerate() {
            let start = index * size + 1;
            let end = start + chunk.len() - 1;
            let statement = self.insert_statement(&prepared.columns, chunk);
            match self
                .ds
                .executor()
                .execute(&statement.sql, &statement.params)
                .await
            {
                Ok(_) => {
                    report.success += chunk.len();
                    debug!(table = %self.table, start, end, "Inserted batch");
                }
                Err(e) => {
                    let e = EngineError::from(e);
                    warn!(table = %self.table, start, end, error = %e, "Batch insert failed");
                    report.failure += chunk.len();
                    report.errors.push(format!("rows {}-{}: {}", start, end, e));
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            datasource = %self.ds.name(),
            table = %self.table,
            total = report.total,
            success = report.success,
            failure = report.failure,
            "Batch insert finished"
        );
        Ok(report)
    }

    /// All rows in one transaction; any failure rolls everything back
    pub async fn insert_batch_transactional(&self, rows: &[SqlRow]) -> EngineResult<ImportReport> {
        let result = self
            .run_transactional(rows, ImportStrategy::Append, false)
            .await;
        self.invalidate();
        result
    }

    async fn run_transactional(
        &self,
        rows: &[SqlRow],
        strategy: ImportStrategy,
        delete_first: bool,
    ) -> EngineResult<ImportReport> {
        let started = Instant::now();
        let mut report = ImportReport::new(self, strategy, true, rows.len());

        let mut statements = Vec::new();
        if delete_first {
            statements.push(self.delete_all_statement());
        }
        if !rows.is_empty() {
            statements.extend(self.insert_statements(&self.prepare(rows)?));
        }
        if statements.is_empty() {
            return Ok(report);
        }

        let affected = self
            .ds
            .executor()
            .execute_transaction(&statements)
            .await
            .map_err(|e| {
                let e = EngineError::from(e);
                warn!(table = %self.table, error = %e, "Transactional write rolled back");
                e
            })?;

        if delete_first {
            report.deleted_rows = affected.first().copied();
        }
        report.success = rows.len();
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            datasource = %self.ds.name(),
            table = %self.table,
            rows = rows.len(),
            deleted = ?report.deleted_rows,
            "Transactional write committed"
        );
        Ok(report)
    }

    /// Delete every row, then insert
    pub async fn overwrite(&self, rows: &[SqlRow], transactional: bool) -> EngineResult<ImportReport> {
        let result = if transactional {
            self.run_transactional(rows, ImportStrategy::Overwrite, true)
                .await
        } else {
            self.overwrite_inner(rows).await
        };
        self.invalidate();
        result
    }

    async fn overwrite_inner(&self, rows: &[SqlRow]) -> EngineResult<ImportReport> {
        let started = Instant::now();
        if !rows.is_empty() {
            // Reject unknown columns before anything is deleted.
            self.prepare(rows)?;
        }
        let delete = self.delete_all_statement();
        let deleted = self.ds.executor().execute(&delete.sql, &delete.params).await?;
        warn!(table = %self.table, deleted, "Cleared table for overwrite");

        let mut report = self
            .insert_batch_inner(rows, ImportStrategy::Overwrite)
            .await?;
        report.deleted_rows = Some(deleted);
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Insert rows not already present
    ///
    /// With key columns, a row is a duplicate when a stored row has the same
    /// key; rows missing a key value are skipped. Without key columns every
    /// input column is compared NULL-safely. A probe that fails keeps the row.
    pub async fn append_deduplicated(
        &self,
        rows: &[SqlRow],
        key_columns: &[String],
        transactional: bool,
    ) -> EngineResult<ImportReport> {
        let result = self
            .append_deduplicated_inner(rows, key_columns, transactional)
            .await;
        self.invalidate();
        result
    }

    async fn append_deduplicated_inner(
        &self,
        rows: &[SqlRow],
        key_columns: &[String],
        transactional: bool,
    ) -> EngineResult<ImportReport> {
        let started = Instant::now();
        if rows.is_empty() {
            return Ok(ImportReport::new(self, ImportStrategy::Append, transactional, 0));
        }
        let prepared = self.prepare(rows)?;

        // Keys only help when every key column is part of the input.
        let key_positions: Option<Vec<usize>> = if key_columns.is_empty() {
            None
        } else {
            key_columns
                .iter()
                .map(|k| {
                    prepared
                        .columns
                        .iter()
                        .position(|c| c.eq_ignore_ascii_case(k))
                })
                .collect()
        };
        let probe_columns: Vec<usize> = match &key_positions {
            Some(positions) => positions.clone(),
            None => (0..prepared.columns.len()).collect(),
        };
        let probe_sql = self.duplicate_probe_sql(&prepared.columns, &probe_columns, key_positions.is_some());

        let mut fresh: Vec<SqlRow> = Vec::new();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut skipped = 0;

        for (row, values) in rows.iter().zip(&prepared.values) {
            let probe_values: Vec<&SqlValue> = probe_columns.iter().map(|i| &values[*i]).collect();
            if key_positions.is_some() && probe_values.iter().any(|v| v.is_blank()) {
                skipped += 1;
                continue;
            }

            let identity: Vec<String> = probe_values
                .iter()
                .map(|v| v.as_text().unwrap_or_else(|| "\u{0}NULL".to_string()))
                .collect();
            if !seen.insert(identity) {
                skipped += 1;
                continue;
            }

            let params: Vec<SqlValue> = if key_positions.is_some() {
                probe_values.into_iter().cloned().collect()
            } else {
                probe_values
                    .into_iter()
                    .flat_map(|v| [v.clone(), v.clone()])
                    .collect()
            };
            match self.ds.executor().query_i64(&probe_sql, &params).await {
                Ok(count) if count > 0 => skipped += 1,
                Ok(_) => fresh.push(row.clone()),
                Err(e) => {
                    warn!(table = %self.table, error = %e, "Duplicate probe failed, keeping row");
                    fresh.push(row.clone());
                }
            }
        }

        debug!(table = %self.table, fresh = fresh.len(), skipped, "Duplicate check finished");

        let mut report = if fresh.is_empty() {
            let mut report = ImportReport::new(self, ImportStrategy::Append, transactional, rows.len());
            report.message = Some("every row already exists; nothing imported".to_string());
            report
        } else if transactional {
            self.run_transactional(&fresh, ImportStrategy::Append, false)
                .await?
        } else {
            self.insert_batch_inner(&fresh, ImportStrategy::Append)
                .await?
        };
        report.total = rows.len();
        report.skipped = skipped;
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    fn duplicate_probe_sql(&self, columns: &[String], probe: &[usize], by_key: bool) -> String {
        let conditions: Vec<String> = probe
            .iter()
            .map(|i| {
                let ident = quote_identifier(&columns[*i]);
                if by_key {
                    format!("{} = ?", ident)
                } else {
                    format!("({ident} = ? OR ({ident} IS NULL AND ? IS NULL))")
                }
            })
            .collect();
        format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.ds.qualify(&self.table),
            conditions.join(" AND ")
        )
    }

    /// Import with a strategy; append de-duplicates on `key_columns`
    pub async fn import(
        &self,
        rows: &[SqlRow],
        strategy: ImportStrategy,
        transactional: bool,
        key_columns: &[String],
    ) -> EngineResult<ImportReport> {
        validate_identifiers(key_columns.iter().map(String::as_str))?;
        match strategy {
            ImportStrategy::Append => {
                self.append_deduplicated(rows, key_columns, transactional)
                    .await
            }
            ImportStrategy::Overwrite => self.overwrite(rows, transactional).await,
        }
    }

    /// Check rows against the table before importing
    pub fn validate_rows(&self, rows: &[SqlRow], sample: usize) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut input: Vec<&str> = Vec::new();
        for row in rows {
            for name in row.column_names() {
                if !input.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    input.push(name);
                }
            }
        }

        for column in self.columns.iter().filter(|c| c.is_required()) {
            if !input.iter().any(|n| n.eq_ignore_ascii_case(&column.name)) {
                errors.push(ValidationFinding {
                    row: None,
                    column: Some(column.name.clone()),
                    kind: "required_field_missing".to_string(),
                    message: format!("required column '{}' is missing from the input", column.name),
                });
            }
        }

        for name in &input {
            if self.column(name).is_err() {
                warnings.push(ValidationFinding {
                    row: None,
                    column: Some(name.to_string()),
                    kind: "unknown_column".to_string(),
                    message: format!("column '{}' does not exist in table '{}'", name, self.table),
                });
            }
        }

        let sampled = rows.len().min(sample);
        for (index, row) in rows.iter().take(sample).enumerate() {
            for (name, value) in row.iter() {
                let Ok(column) = self.column(name) else { continue };
                if let Some(problem) = check_value(column, value) {
                    warnings.push(ValidationFinding {
                        row: Some(index + 1),
                        column: Some(column.name.clone()),
                        kind: problem.0.to_string(),
                        message: problem.1,
                    });
                }
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            total_rows: rows.len(),
            sampled_rows: sampled,
            errors,
            warnings,
        }
    }

    /// Insert one row, returning the affected count
    pub async fn insert_row(&self, row: &SqlRow) -> EngineResult<u64> {
        let result = self.insert_row_inner(row).await;
        self.invalidate();
        result
    }

    async fn insert_row_inner(&self, row: &SqlRow) -> EngineResult<u64> {
        let prepared = self.prepare(std::slice::from_ref(row))?;
        let statement = self.insert_statement(&prepared.columns, &prepared.values);
        Ok(self
            .ds
            .executor()
            .execute(&statement.sql, &statement.params)
            .await?)
    }

    fn where_clause(&self, conditions: &SqlRow, params: &mut Vec<SqlValue>) -> EngineResult<String> {
        if conditions.is_empty() {
            return Err(EngineError::InvalidArgument(
                "refusing to touch every row: conditions cannot be empty".to_string(),
            ));
        }
        validate_identifiers(conditions.column_names())?;
        let mut parts = Vec::with_capacity(conditions.len());
        for (name, value) in conditions.iter() {
            let column = self.column(name)?;
            let ident = quote_identifier(&column.name);
            if value.is_null() {
                parts.push(format!("{} IS NULL", ident));
            } else {
                parts.push(format!("{} = ?", ident));
                params.push(value.clone());
            }
        }
        Ok(parts.join(" AND "))
    }

    /// Update rows matching every condition
    pub async fn update_rows(&self, values: &SqlRow, conditions: &SqlRow) -> EngineResult<u64> {
        let result = self.update_rows_inner(values, conditions).await;
        self.invalidate();
        result
    }

    async fn update_rows_inner(&self, values: &SqlRow, conditions: &SqlRow) -> EngineResult<u64> {
        if values.is_empty() {
            return Err(EngineError::InvalidArgument(
                "no values to update".to_string(),
            ));
        }
        validate_identifiers(values.column_names())?;
        let mut params = Vec::new();
        let mut assignments = Vec::with_capacity(values.len());
        for (name, value) in values.iter() {
            let column = self.column(name)?;
            assignments.push(format!("{} = ?", quote_identifier(&column.name)));
            params.push(Self::coerce(column, value));
        }
        let where_clause = self.where_clause(conditions, &mut params)?;
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.ds.qualify(&self.table),
            assignments.join(", "),
            where_clause
        );
        Ok(self.ds.executor().execute(&sql, &params).await?)
    }

    /// Delete rows matching every condition
    pub async fn delete_rows(&self, conditions: &SqlRow) -> EngineResult<u64> {
        let result = self.delete_rows_inner(conditions).await;
        self.invalidate();
        result
    }

    async fn delete_rows_inner(&self, conditions: &SqlRow) -> EngineResult<u64> {
        let mut params = Vec::new();
        let where_clause = self.where_clause(conditions, &mut params)?;
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.ds.qualify(&self.table),
            where_clause
        );
        Ok(self.ds.executor().execute(&sql, &params).await?)
    }
}

/// Type check of one sampled value: `(kind, message)` on a problem
fn check_value(column: &ColumnMetadata, value: &SqlValue) -> Option<(&'static str, String)> {
    if value.is_blank() {
        if column.is_required() {
            return Some((
                "required_field_missing",
                format!("'{}' is required but empty", column.name),
            ));
        }
        return None;
    }
    let text = value.as_text()?;
    let text = text.trim();

    let ok = match &column.data_type {
        t if t.is_integer() => text.parse::<i64>().is_ok() || text.parse::<u64>().is_ok(),
        DataType::Decimal(_, _) | DataType::Float | DataType::Double => text.parse::<f64>().is_ok(),
        DataType::Date => DATE_PATTERN.is_match(text),
        DataType::DateTime | DataType::Timestamp => DATETIME_PATTERN.is_match(text),
        DataType::Time => TIME_PATTERN.is_match(text),
        DataType::Varchar(Some(max)) | DataType::Char(Some(max)) => {
            let len = text.chars().count();
            if len > *max {
                return Some((
                    "value_too_long",
                    format!("'{}' holds {} characters but allows {}", column.name, len, max),
                ));
            }
            true
        }
        _ => true,
    };

    if ok {
        None
    } else {
        Some((
            "type_mismatch",
            format!(
                "'{}' is not a valid {} value for '{}'",
                text,
                column.data_type.mysql_name(),
                column.name
            ),
        ))
    }
}
