// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL execution interface
//!
//! [`SqlExecutor`] is the per-datasource execution seam: parameterized queries,
//! updates, DDL and all-or-nothing transactions. Parameters are always bound
//! positionally, never spliced into the statement text.

use crate::error::{CatalogError, CatalogResult};
use crate::metadata::{SqlRow, SqlValue};
use async_trait::async_trait;

/// A statement with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Executes SQL against one physical connection pool
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a query and return every row
    async fn query(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<Vec<SqlRow>>;

    /// Run an INSERT/UPDATE/DELETE and return the affected row count
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<u64>;

    /// Run a DDL statement (no parameters)
    async fn execute_ddl(&self, sql: &str) -> CatalogResult<()>;

    /// Run every statement inside one transaction. On any failure nothing is
    /// committed and the failing statement's error is returned.
    async fn execute_transaction(&self, statements: &[Statement]) -> CatalogResult<Vec<u64>>;

    /// First column of the first row, if any
    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<Option<SqlValue>> {
        let rows = self.query(sql, params).await?;
        Ok(rows.into_iter().next().and_then(|row| row.value_at(0).cloned()))
    }

    /// Integer scalar, e.g. `COUNT(*)` or `EXISTS(...)`
    async fn query_i64(&self, sql: &str, params: &[SqlValue]) -> CatalogResult<i64> {
        match self.query_scalar(sql, params).await? {
            Some(value) => value.as_i64().ok_or_else(|| {
                CatalogError::QueryFailed(format!("expected an integer result, got {}", value))
            }),
            None => Err(CatalogError::QueryFailed(
                "query returned no rows".to_string(),
            )),
        }
    }

    /// Connectivity probe
    async fn ping(&self) -> CatalogResult<()> {
        self.query_i64("SELECT 1", &[]).await.map(|_| ())
    }
}
