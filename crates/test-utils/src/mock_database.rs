// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # In-memory MySQL stand-in
//!
//! [`MockDatabase`] implements both [`Catalog`] and [`SqlExecutor`] over
//! in-memory schemas, so engine code runs end to end without a server.
//! Clones share state, which lets a test hand one clone to the engine and
//! inspect rows and the statement log through another.
//!
//! ```rust,ignore
//! let db = MockDatabase::new("login")
//!     .with_table(TableMetadata::new("t", "login").with_columns(cols))
//!     .failing_table("broken");
//! let handle = DataSourceHandle::from_backend(Arc::new(db.clone()));
//! ```

use crate::sql_eval::{
    ColumnDef, Expr, Operand, ParsedStatement, RowContext, TableRef, compare, eval_operand,
    matches, parse_statement,
};
use async_trait::async_trait;
use sqlscout_catalog::{
    Catalog, CatalogError, CatalogResult, ColumnMetadata, DataType, SchemaScope, SqlExecutor,
    SqlRow, SqlValue, Statement, TableMetadata,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockTable {
    meta: TableMetadata,
    rows: Vec<SqlRow>,
    next_id: i64,
}

impl MockTable {
    fn new(meta: TableMetadata) -> Self {
        Self {
            meta,
            rows: Vec::new(),
            next_id: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MockState {
    /// schema (lower-case) -> table (lower-case) -> table
    schemas: BTreeMap<String, BTreeMap<String, MockTable>>,
    /// Display names of schemas, keyed like `schemas`
    schema_names: BTreeMap<String, String>,
    failing: HashSet<String>,
    log: Vec<String>,
}

impl MockState {
    fn add_schema(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.schema_names.entry(key.clone()).or_insert_with(|| name.to_string());
        self.schemas.entry(key).or_default();
    }

    fn table(&self, schema: &str, table: &str) -> Option<&MockTable> {
        self.schemas
            .get(&schema.to_lowercase())
            .and_then(|tables| tables.get(&table.to_lowercase()))
    }

    fn table_mut(&mut self, schema: &str, table: &str) -> CatalogResult<&mut MockTable> {
        self.schemas
            .get_mut(&schema.to_lowercase())
            .and_then(|tables| tables.get_mut(&table.to_lowercase()))
            .ok_or_else(|| {
                CatalogError::UnknownTable(format!("Table '{}.{}' doesn't exist", schema, table))
            })
    }
}

/// In-memory database implementing [`Catalog`] and [`SqlExecutor`]
#[derive(Debug, Clone)]
pub struct MockDatabase {
    default_schema: String,
    state: Arc<Mutex<MockState>>,
    latency: Option<Duration>,
}

impl MockDatabase {
    /// Empty database whose connection default is `default_schema`
    pub fn new(default_schema: impl Into<String>) -> Self {
        let default_schema = default_schema.into();
        let mut state = MockState::default();
        state.add_schema(&default_schema);
        Self {
            default_schema,
            state: Arc::new(Mutex::new(state)),
            latency: None,
        }
    }

    /// Add a table to the default schema
    pub fn with_table(self, table: TableMetadata) -> Self {
        let schema = self.default_schema.clone();
        self.with_table_in(&schema, table)
    }

    /// Add a table to `schema`, creating the schema if needed
    pub fn with_table_in(self, schema: &str, mut table: TableMetadata) -> Self {
        table.schema = schema.to_string();
        {
            let mut state = self.lock();
            state.add_schema(schema);
            if let Some(tables) = state.schemas.get_mut(&schema.to_lowercase()) {
                tables.insert(table.name.to_lowercase(), MockTable::new(table));
            }
        }
        self
    }

    /// Seed rows of a default-schema table; missing columns become NULL
    pub fn with_rows(self, table: &str, rows: Vec<SqlRow>) -> Self {
        {
            let schema = self.default_schema.clone();
            let mut state = self.lock();
            if let Ok(target) = state.table_mut(&schema, table) {
                for row in rows {
                    let full: SqlRow = target
                        .meta
                        .columns
                        .iter()
                        .map(|c| {
                            let value = row.get(&c.name).cloned().unwrap_or(SqlValue::Null);
                            let value = coerce(c, value.clone()).unwrap_or(value);
                            (c.name.clone(), value)
                        })
                        .collect();
                    bump_auto_increment(target, &full);
                    target.rows.push(full);
                }
            }
        }
        self
    }

    /// Add an empty schema
    pub fn with_schema(self, schema: &str) -> Self {
        self.lock().add_schema(schema);
        self
    }

    /// Sleep this long before every statement
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every data statement on `table` fail; metadata still works
    pub fn failing_table(self, table: &str) -> Self {
        self.lock().failing.insert(table.to_lowercase());
        self
    }

    pub fn default_schema(&self) -> &str {
        &self.default_schema
    }

    /// Rows of a default-schema table
    pub fn rows(&self, table: &str) -> Vec<SqlRow> {
        self.rows_in(&self.default_schema, table)
    }

    pub fn rows_in(&self, schema: &str, table: &str) -> Vec<SqlRow> {
        self.lock()
            .table(schema, table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Metadata of a default-schema table
    pub fn table(&self, table: &str) -> Option<TableMetadata> {
        self.lock()
            .table(&self.default_schema, table)
            .map(|t| t.meta.clone())
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.lock().schemas.contains_key(&schema.to_lowercase())
    }

    /// Every statement executed so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_statements(&self) {
        self.lock().log.clear();
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test must not poison the others sharing this state
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn schema_of<'a>(&'a self, table: &'a TableRef) -> &'a str {
        table.schema.as_deref().unwrap_or(&self.default_schema)
    }

    fn scope_schema<'a>(&'a self, scope: &'a SchemaScope) -> &'a str {
        scope.schema_name().unwrap_or(&self.default_schema)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn run(&self, state: &mut MockState, sql: &str, params: &[SqlValue]) -> CatalogResult<Outcome> {
        state.log.push(sql.to_string());
        let statement = parse_statement(sql)?;
        if statement.is_data_access() {
            if let Some(table) = statement.table() {
                if state.failing.contains(&table.name.to_lowercase()) {
                    return Err(CatalogError::QueryFailed(format!(
                        "Lost connection to MySQL server while reading '{}'",
                        table.name
                    )));
                }
            }
        }

        match statement {
            ParsedStatement::SelectOne => Ok(Outcome::Rows(vec![SqlRow::new().with("1", 1i64)])),
            ParsedStatement::Exists { table, filter } => {
                let schema = self.schema_of(&table);
                let target = state.table_mut(schema, &table.name)?;
                let mut found = false;
                for row in &target.rows {
                    if matches(Some(&filter), &Row(row), params)? {
                        found = true;
                        break;
                    }
                }
                Ok(Outcome::Rows(vec![SqlRow::new().with("exists", i64::from(found))]))
            }
            ParsedStatement::Count { table, filter } => {
                let schema = self.schema_of(&table);
                let target = state.table_mut(schema, &table.name)?;
                let mut count = 0i64;
                for row in &target.rows {
                    if matches(filter.as_ref(), &Row(row), params)? {
                        count += 1;
                    }
                }
                Ok(Outcome::Rows(vec![SqlRow::new().with("COUNT(*)", count)]))
            }
            ParsedStatement::SelectPage {
                table,
                filter,
                offset,
                limit,
            } => {
                let schema = self.schema_of(&table);
                let target = state.table_mut(schema, &table.name)?;
                let empty = SqlRow::new();
                let offset = eval_operand(&offset, &Row(&empty), params)?.as_i64().unwrap_or(0).max(0) as usize;
                let limit = eval_operand(&limit, &Row(&empty), params)?.as_i64().unwrap_or(0).max(0) as usize;
                let mut selected = Vec::new();
                for row in &target.rows {
                    if matches(filter.as_ref(), &Row(row), params)? {
                        selected.push(row.clone());
                    }
                }
                Ok(Outcome::Rows(selected.into_iter().skip(offset).take(limit).collect()))
            }
            ParsedStatement::Insert {
                table,
                columns,
                rows,
            } => {
                let schema = self.schema_of(&table).to_string();
                let target = state.table_mut(&schema, &table.name)?;
                insert(target, &columns, &rows, params)
            }
            ParsedStatement::Update {
                table,
                assignments,
                filter,
            } => {
                let schema = self.schema_of(&table).to_string();
                let target = state.table_mut(&schema, &table.name)?;
                update(target, &assignments, filter.as_ref(), params)
            }
            ParsedStatement::Delete { table, filter } => {
                let schema = self.schema_of(&table).to_string();
                let target = state.table_mut(&schema, &table.name)?;
                let mut doomed = Vec::with_capacity(target.rows.len());
                for row in &target.rows {
                    doomed.push(matches(filter.as_ref(), &Row(row), params)?);
                }
                let mut flags = doomed.iter();
                target.rows.retain(|_| !flags.next().copied().unwrap_or(false));
                Ok(Outcome::Affected(doomed.iter().filter(|d| **d).count() as u64))
            }
            ParsedStatement::CreateTable {
                table,
                columns,
                primary_key,
                foreign_keys,
                comment,
            } => {
                let schema = self.schema_of(&table).to_string();
                if state.table(&schema, &table.name).is_some() {
                    return Err(CatalogError::TableExists(format!(
                        "Table '{}' already exists",
                        table.name
                    )));
                }
                let tables = state
                    .schemas
                    .get_mut(&schema.to_lowercase())
                    .ok_or_else(|| CatalogError::InvalidSchema(format!("Unknown database '{}'", schema)))?;

                let mut meta_columns: Vec<ColumnMetadata> = columns.iter().map(column_metadata).collect();
                for column in &mut meta_columns {
                    if primary_key.iter().any(|k| k.eq_ignore_ascii_case(&column.name)) {
                        column.is_primary_key = true;
                        column.nullable = false;
                    }
                    if let Some(fk) = foreign_keys
                        .iter()
                        .find(|fk| fk.column.eq_ignore_ascii_case(&column.name))
                    {
                        column.is_foreign_key = true;
                        column.references = Some(sqlscout_catalog::TableReference {
                            table: fk.ref_table.clone(),
                            column: fk.ref_column.clone(),
                        });
                    }
                }
                let mut meta = TableMetadata::new(table.name.clone(), schema).with_columns(meta_columns);
                meta.comment = comment;
                tables.insert(table.name.to_lowercase(), MockTable::new(meta));
                Ok(Outcome::Affected(0))
            }
            ParsedStatement::DropTable { table } => {
                let schema = self.schema_of(&table).to_string();
                let removed = state
                    .schemas
                    .get_mut(&schema.to_lowercase())
                    .and_then(|tables| tables.remove(&table.name.to_lowercase()));
                match removed {
                    Some(_) => Ok(Outcome::Affected(0)),
                    None => Err(CatalogError::UnknownTable(format!(
                        "Unknown table '{}.{}'",
                        schema, table.name
                    ))),
                }
            }
            ParsedStatement::ModifyColumn { table, column } => {
                let schema = self.schema_of(&table).to_string();
                let target = state.table_mut(&schema, &table.name)?;
                let existing = target
                    .meta
                    .columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(&column.name))
                    .ok_or_else(|| {
                        CatalogError::UnknownColumn(format!("Unknown column '{}'", column.name))
                    })?;
                let mut updated = column_metadata(&column);
                updated.is_primary_key = existing.is_primary_key;
                updated.is_foreign_key = existing.is_foreign_key;
                updated.references = existing.references.clone();
                *existing = updated;
                Ok(Outcome::Affected(0))
            }
            ParsedStatement::CreateDatabase { name } => {
                if state.schemas.contains_key(&name.to_lowercase()) {
                    return Err(CatalogError::DatabaseExists(format!(
                        "Can't create database '{}'; database exists",
                        name
                    )));
                }
                state.add_schema(&name);
                Ok(Outcome::Affected(1))
            }
            ParsedStatement::DropDatabase { name } => {
                let key = name.to_lowercase();
                match state.schemas.remove(&key) {
                    Some(tables) => {
                        state.schema_names.remove(&key);
                        Ok(Outcome::Affected(tables.len() as u64))
                    }
                    None => Err(CatalogError::InvalidSchema(format!(
                        "Can't drop database '{}'; database doesn't exist",
                        name
                    ))),
                }
            }
        }
    }

    fn run_locked(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<Outcome> {
        let mut state = self.lock();
        self.run(&mut state, sql, params)
    }
}

enum Outcome {
    Rows(Vec<SqlRow>),
    Affected(u64),
}

struct Row<'a>(&'a SqlRow);

impl RowContext for Row<'_> {
    fn column(&self, column: &str) -> Option<SqlValue> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.clone())
    }
}

fn column_metadata(def: &ColumnDef) -> ColumnMetadata {
    let mut column = ColumnMetadata::new(def.name.clone(), DataType::parse_mysql(&def.column_type))
        .with_column_type(def.column_type.clone())
        .with_nullable(!def.not_null);
    column.default_value = def.default_value.clone();
    column.comment = def.comment.clone();
    column.is_auto_increment = def.auto_increment;
    column
}

fn bump_auto_increment(table: &mut MockTable, row: &SqlRow) {
    for column in table.meta.columns.iter().filter(|c| c.is_primary_key) {
        if let Some(id) = row.get(&column.name).and_then(SqlValue::as_i64) {
            table.next_id = table.next_id.max(id + 1);
        }
    }
}

fn integer_range(column: &ColumnMetadata) -> Option<(i64, i64)> {
    let unsigned = column.column_type.to_lowercase().contains("unsigned");
    let bits = match column.data_type {
        DataType::TinyInt | DataType::Boolean => 8,
        DataType::SmallInt => 16,
        DataType::MediumInt => 24,
        DataType::Integer => 32,
        DataType::BigInt => 64,
        _ => return None,
    };
    Some(match (bits, unsigned) {
        (64, true) => (0, i64::MAX),
        (64, false) => (i64::MIN, i64::MAX),
        (bits, true) => (0, (1i64 << bits) - 1),
        (bits, false) => (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1),
    })
}

/// Convert a bound value into the column's storage form
fn coerce(column: &ColumnMetadata, value: SqlValue) -> CatalogResult<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    if let Some((min, max)) = integer_range(column) {
        let int = match &value {
            SqlValue::Float(f) => Some(f.round() as i64),
            other => other.as_i64(),
        }
        .ok_or_else(|| {
            CatalogError::QueryFailed(format!(
                "Incorrect integer value: '{}' for column '{}'",
                value, column.name
            ))
        })?;
        if int < min || int > max {
            return Err(CatalogError::NumericOutOfRange(format!(
                "Out of range value for column '{}'",
                column.name
            )));
        }
        return Ok(SqlValue::Int(int));
    }
    match column.data_type {
        DataType::Decimal(_, _) | DataType::Float | DataType::Double => value
            .as_f64()
            .map(SqlValue::Float)
            .ok_or_else(|| {
                CatalogError::QueryFailed(format!(
                    "Incorrect decimal value: '{}' for column '{}'",
                    value, column.name
                ))
            }),
        DataType::Varchar(Some(len)) | DataType::Char(Some(len)) => {
            let text = value.as_text().unwrap_or_default();
            if text.chars().count() > len {
                return Err(CatalogError::ValueTooLong(format!(
                    "Data too long for column '{}'",
                    column.name
                )));
            }
            Ok(SqlValue::Text(text))
        }
        _ => Ok(match value {
            SqlValue::Bytes(bytes) => SqlValue::Bytes(bytes),
            other => SqlValue::Text(other.as_text().unwrap_or_default()),
        }),
    }
}

fn default_for(column: &ColumnMetadata) -> CatalogResult<SqlValue> {
    match column.default_value.as_deref() {
        Some(default) if default.eq_ignore_ascii_case("CURRENT_TIMESTAMP") => {
            Ok(SqlValue::Text("1970-01-01 00:00:00".to_string()))
        }
        Some(default) => coerce(column, SqlValue::Text(default.to_string())),
        None => Ok(SqlValue::Null),
    }
}

fn insert(
    table: &mut MockTable,
    columns: &[String],
    rows: &[Vec<Operand>],
    params: &[SqlValue],
) -> CatalogResult<Outcome> {
    let mut positions = Vec::with_capacity(columns.len());
    for name in columns {
        let index = table
            .meta
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::UnknownColumn(format!("Unknown column '{}' in 'field list'", name)))?;
        positions.push(index);
    }

    let empty = SqlRow::new();
    let key_columns: Vec<usize> = table
        .meta
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_primary_key)
        .map(|(i, _)| i)
        .collect();
    let mut next_id = table.next_id;
    let mut built = Vec::with_capacity(rows.len());

    for (row_number, operands) in rows.iter().enumerate() {
        let mut values = Vec::with_capacity(table.meta.columns.len());
        for (index, column) in table.meta.columns.iter().enumerate() {
            let supplied = match positions.iter().position(|p| *p == index) {
                Some(slot) => Some(eval_operand(&operands[slot], &Row(&empty), params)?),
                None => None,
            };
            let value = match supplied {
                Some(v) if !v.is_null() => coerce(column, v)?,
                _ if column.is_auto_increment => {
                    let id = next_id;
                    next_id += 1;
                    SqlValue::Int(id)
                }
                Some(_) if !column.nullable => {
                    return Err(CatalogError::RequiredFieldMissing(format!(
                        "Column '{}' cannot be null (row {})",
                        column.name,
                        row_number + 1
                    )));
                }
                Some(v) => v,
                None if !column.nullable && column.default_value.is_none() => {
                    return Err(CatalogError::RequiredFieldMissing(format!(
                        "Field '{}' doesn't have a default value",
                        column.name
                    )));
                }
                None => default_for(column)?,
            };
            if column.is_auto_increment {
                if let Some(id) = value.as_i64() {
                    next_id = next_id.max(id + 1);
                }
            }
            values.push(value);
        }

        if !key_columns.is_empty() {
            let key: Vec<&SqlValue> = key_columns.iter().map(|i| &values[*i]).collect();
            let existing = table.rows.iter().chain(built.iter()).any(|row: &SqlRow| {
                key_columns
                    .iter()
                    .zip(&key)
                    .all(|(i, k)| {
                        row.value_at(*i)
                            .is_some_and(|v| compare(v, k) == Some(Ordering::Equal))
                    })
            });
            if existing {
                return Err(CatalogError::DuplicateKey(format!(
                    "Duplicate entry for key '{}.PRIMARY'",
                    table.meta.name
                )));
            }
        }

        built.push(
            table
                .meta
                .columns
                .iter()
                .map(|c| c.name.clone())
                .zip(values)
                .collect::<SqlRow>(),
        );
    }

    let inserted = built.len() as u64;
    table.rows.extend(built);
    table.next_id = next_id;
    Ok(Outcome::Affected(inserted))
}

fn update(
    table: &mut MockTable,
    assignments: &[(String, Operand)],
    filter: Option<&Expr>,
    params: &[SqlValue],
) -> CatalogResult<Outcome> {
    let empty = SqlRow::new();
    let mut resolved = Vec::with_capacity(assignments.len());
    for (name, operand) in assignments {
        let column = table
            .meta
            .columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::UnknownColumn(format!("Unknown column '{}'", name)))?;
        let value = eval_operand(operand, &Row(&empty), params)?;
        if value.is_null() && !column.nullable {
            return Err(CatalogError::RequiredFieldMissing(format!(
                "Column '{}' cannot be null",
                column.name
            )));
        }
        resolved.push((column.name.clone(), coerce(column, value)?));
    }

    let mut updated = Vec::with_capacity(table.rows.len());
    let mut affected = 0u64;
    for row in &table.rows {
        if matches(filter, &Row(row), params)? {
            affected += 1;
            updated.push(
                row.iter()
                    .map(|(name, value)| {
                        let value = resolved
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_else(|| value.clone());
                        (name.to_string(), value)
                    })
                    .collect(),
            );
        } else {
            updated.push(row.clone());
        }
    }
    table.rows = updated;
    Ok(Outcome::Affected(affected))
}

#[async_trait]
impl SqlExecutor for MockDatabase {
    async fn query(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<Vec<SqlRow>> {
        self.simulate_latency().await;
        match self.run_locked(sql, params)? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Ok(Vec::new()),
        }
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<u64> {
        self.simulate_latency().await;
        match self.run_locked(sql, params)? {
            Outcome::Rows(rows) => Ok(rows.len() as u64),
            Outcome::Affected(n) => Ok(n),
        }
    }

    async fn execute_ddl(&self, sql: &str) -> CatalogResult<()> {
        self.simulate_latency().await;
        self.run_locked(sql, &[]).map(|_| ())
    }

    async fn execute_transaction(&self, statements: &[Statement]) -> CatalogResult<Vec<u64>> {
        self.simulate_latency().await;
        let mut state = self.lock();
        let snapshot = state.clone();
        let mut affected = Vec::with_capacity(statements.len());
        for statement in statements {
            match self.run(&mut state, &statement.sql, &statement.params) {
                Ok(Outcome::Affected(n)) => affected.push(n),
                Ok(Outcome::Rows(rows)) => affected.push(rows.len() as u64),
                Err(e) => {
                    let log = std::mem::take(&mut state.log);
                    *state = snapshot;
                    state.log = log;
                    state.log.push("ROLLBACK".to_string());
                    return Err(e);
                }
            }
        }
        state.log.push("COMMIT".to_string());
        Ok(affected)
    }
}

#[async_trait]
impl Catalog for MockDatabase {
    async fn list_tables(&self, scope: &SchemaScope) -> CatalogResult<Vec<TableMetadata>> {
        let schema = self.scope_schema(scope);
        let state = self.lock();
        Ok(state
            .schemas
            .get(&schema.to_lowercase())
            .map(|tables| {
                tables
                    .values()
                    .map(|t| {
                        let mut meta = t.meta.clone();
                        if meta.row_count_estimate.is_none() {
                            meta.row_count_estimate = Some(t.rows.len() as u64);
                        }
                        meta
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_columns(&self, scope: &SchemaScope, table: &str) -> CatalogResult<Vec<ColumnMetadata>> {
        let schema = self.scope_schema(scope);
        self.lock()
            .table(schema, table)
            .map(|t| t.meta.columns.clone())
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string(), schema.to_string()))
    }

    async fn table_exists(&self, scope: &SchemaScope, table: &str) -> CatalogResult<bool> {
        let schema = self.scope_schema(scope);
        Ok(self.lock().table(schema, table).is_some())
    }

    async fn list_schemas(&self) -> CatalogResult<Vec<String>> {
        Ok(self.lock().schema_names.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> MockDatabase {
        MockDatabase::new("login").with_table(
            TableMetadata::new("items", "login").with_columns(vec![
                ColumnMetadata::new("id", DataType::Integer)
                    .with_primary_key()
                    .with_auto_increment(),
                ColumnMetadata::new("code", DataType::Varchar(Some(4))).with_nullable(false),
                ColumnMetadata::new("qty", DataType::TinyInt),
            ]),
        )
    }

    #[tokio::test]
    async fn test_insert_assigns_auto_increment() {
        let db = db();
        let n = db
            .execute(
                "INSERT INTO `items` (`code`, `qty`) VALUES (?, ?), (?, ?)",
                &[SqlValue::from("a"), SqlValue::from("3"), SqlValue::from("b"), SqlValue::Null],
            )
            .await
            .unwrap();
        assert_eq!(n, 2);
        let rows = db.rows("items");
        assert_eq!(rows[1].get("id"), Some(&SqlValue::Int(2)));
        assert_eq!(rows[0].get("qty"), Some(&SqlValue::Int(3)));
    }

    #[tokio::test]
    async fn test_insert_errors_are_classified() {
        let db = db();
        let too_long = db
            .execute("INSERT INTO `items` (`code`) VALUES (?)", &[SqlValue::from("abcde")])
            .await;
        assert!(matches!(too_long, Err(CatalogError::ValueTooLong(_))));

        let out_of_range = db
            .execute("INSERT INTO `items` (`code`, `qty`) VALUES (?, ?)", &[SqlValue::from("a"), SqlValue::Int(300)])
            .await;
        assert!(matches!(out_of_range, Err(CatalogError::NumericOutOfRange(_))));

        let missing = db.execute("INSERT INTO `items` (`qty`) VALUES (?)", &[SqlValue::Int(1)]).await;
        assert!(matches!(missing, Err(CatalogError::RequiredFieldMissing(_))));

        db.execute("INSERT INTO `items` (`id`, `code`) VALUES (?, ?)", &[SqlValue::Int(9), SqlValue::from("x")])
            .await
            .unwrap();
        let duplicate = db
            .execute("INSERT INTO `items` (`id`, `code`) VALUES (?, ?)", &[SqlValue::Int(9), SqlValue::from("y")])
            .await;
        assert!(matches!(duplicate, Err(CatalogError::DuplicateKey(_))));
        assert_eq!(db.rows("items").len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_rolls_back() {
        let db = db();
        let result = db
            .execute_transaction(&[
                Statement::new("INSERT INTO `items` (`code`) VALUES (?)", vec![SqlValue::from("a")]),
                Statement::new("INSERT INTO `items` (`code`) VALUES (?)", vec![SqlValue::from("toolong")]),
            ])
            .await;
        assert!(result.is_err());
        assert!(db.rows("items").is_empty());
        assert_eq!(db.statements().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_failing_table_keeps_metadata() {
        let db = db().failing_table("items");
        assert!(db.query_i64("SELECT COUNT(*) FROM `items`", &[]).await.is_err());
        assert_eq!(db.get_columns(&SchemaScope::Current, "items").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_named_scope_and_ddl() {
        let db = db();
        db.execute_ddl("CREATE DATABASE `lab_2024` CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci")
            .await
            .unwrap();
        db.execute_ddl("CREATE TABLE `lab_2024`.`runs` (`id` BIGINT UNSIGNED NOT NULL AUTO_INCREMENT, PRIMARY KEY (`id`)) ENGINE=InnoDB")
            .await
            .unwrap();
        let scope = SchemaScope::Named("lab_2024".to_string());
        assert!(db.table_exists(&scope, "runs").await.unwrap());
        assert!(!db.table_exists(&SchemaScope::Current, "runs").await.unwrap());
        let columns = db.get_columns(&scope, "runs").await.unwrap();
        assert_eq!(columns[0].column_type, "bigint unsigned");
        assert!(columns[0].is_primary_key);

        db.execute_ddl("DROP DATABASE `lab_2024`").await.unwrap();
        assert!(!db.has_schema("lab_2024"));
    }
}
