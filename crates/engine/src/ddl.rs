// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # DDL generation
//!
//! Builds and runs `CREATE TABLE`, `ALTER TABLE ... MODIFY COLUMN`,
//! `DROP TABLE` and database statements from validated column specs.
//!
//! Every check (names, types, defaults, foreign key targets and type
//! compatibility) runs before a statement is sent, so a rejected request never
//! leaves a half-created table behind.
//!
//! ## Foreign key compatibility
//!
//! The referencing and referenced columns must have the same normalized type:
//! the base type, `UNSIGNED`, and the length or precision of variable-width
//! types. Integer display widths are ignored, `INTEGER` reads as `INT` and
//! `BOOLEAN` as `TINYINT`.

use crate::config::DdlConfig;
use crate::error::{EngineError, EngineResult};
use crate::ident::{
    MAX_IDENTIFIER_LEN, sanitize_column_name, validate_identifier, validate_new_identifier,
};
use crate::introspect::Introspector;
use crate::router::LogicalDataSource;
use serde::{Deserialize, Serialize};
use sqlscout_catalog::{ColumnMetadata, SqlRow, SqlValue, quote_identifier};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

/// Column types accepted in a [`ColumnSpec`]
pub const SUPPORTED_DATA_TYPES: &[&str] = &[
    "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "BIGINT", "DECIMAL", "NUMERIC", "FLOAT",
    "DOUBLE", "BIT", "BOOLEAN", "CHAR", "VARCHAR", "BINARY", "VARBINARY", "TINYTEXT", "TEXT",
    "MEDIUMTEXT", "LONGTEXT", "TINYBLOB", "BLOB", "MEDIUMBLOB", "LONGBLOB", "DATE", "TIME",
    "DATETIME", "TIMESTAMP", "YEAR", "JSON",
];

const INTEGER_TYPES: &[&str] = &["TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "BIGINT"];
const LENGTH_REQUIRED: &[&str] = &["VARCHAR", "CHAR", "VARBINARY", "BINARY", "DECIMAL", "NUMERIC"];
const DECIMALS_ALLOWED: &[&str] = &["DECIMAL", "NUMERIC", "FLOAT", "DOUBLE"];
const FRACTIONAL_TYPES: &[&str] = &["DECIMAL", "NUMERIC", "FLOAT", "DOUBLE"];
const TEMPORAL_TYPES: &[&str] = &["DATE", "TIME", "DATETIME", "TIMESTAMP", "YEAR"];
const NO_DEFAULT_TYPES: &[&str] = &[
    "TINYTEXT", "TEXT", "MEDIUMTEXT", "LONGTEXT", "TINYBLOB", "BLOB", "MEDIUMBLOB", "LONGBLOB",
    "JSON",
];

fn is_one_of(set: &[&str], ty: &str) -> bool {
    set.contains(&ty)
}

fn is_integer_type(ty: &str) -> bool {
    is_one_of(INTEGER_TYPES, ty)
}

fn is_numeric_type(ty: &str) -> bool {
    is_integer_type(ty) || is_one_of(FRACTIONAL_TYPES, ty) || ty == "BIT" || ty == "BOOLEAN"
}

fn length_allowed(ty: &str) -> bool {
    is_one_of(LENGTH_REQUIRED, ty) || is_integer_type(ty) || matches!(ty, "FLOAT" | "DOUBLE" | "BIT")
}

/// Referential action of a foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeignKeyAction {
    Restrict,
    Cascade,
    #[serde(alias = "SET NULL", alias = "set_null", alias = "set null")]
    SetNull,
    #[serde(alias = "NO ACTION", alias = "no_action", alias = "no action")]
    NoAction,
}

impl ForeignKeyAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ForeignKeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for ForeignKeyAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "RESTRICT" => Ok(ForeignKeyAction::Restrict),
            "CASCADE" => Ok(ForeignKeyAction::Cascade),
            "SET NULL" => Ok(ForeignKeyAction::SetNull),
            "NO ACTION" => Ok(ForeignKeyAction::NoAction),
            _ => Err(EngineError::InvalidArgument(format!(
                "unsupported foreign key action '{}', expected RESTRICT, CASCADE, SET NULL or NO ACTION",
                s
            ))),
        }
    }
}

/// Foreign key of a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub ref_table: String,
    pub ref_column: String,
    #[serde(default)]
    pub on_update: Option<ForeignKeyAction>,
    #[serde(default)]
    pub on_delete: Option<ForeignKeyAction>,
}

impl ForeignKeySpec {
    pub fn new(ref_table: impl Into<String>, ref_column: impl Into<String>) -> Self {
        Self {
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
            on_update: None,
            on_delete: None,
        }
    }

    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        self.on_update = Some(action);
        self
    }
}

/// Column definition for table creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub unsigned: bool,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub foreign_key: Option<ForeignKeySpec>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            length: None,
            decimals: None,
            unsigned: false,
            not_null: false,
            auto_increment: false,
            default_value: None,
            comment: None,
            primary_key: false,
            foreign_key: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Mark as primary key; implies NOT NULL
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn references(mut self, foreign_key: ForeignKeySpec) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    fn base_type(&self) -> String {
        self.declared_type.trim().to_uppercase()
    }

    /// Type as it will appear in the statement, e.g. `DECIMAL(10,2)`
    pub fn render_type(&self) -> EngineResult<String> {
        let ty = self.base_type();
        if !is_one_of(SUPPORTED_DATA_TYPES, &ty) {
            return Err(EngineError::InvalidArgument(format!(
                "unsupported data type '{}' for column '{}'",
                self.declared_type, self.name
            )));
        }

        let length = self.length.filter(|l| *l > 0);
        if is_one_of(LENGTH_REQUIRED, &ty) && length.is_none() {
            return Err(EngineError::InvalidArgument(format!(
                "column '{}' of type {} needs a length",
                self.name, ty
            )));
        }
        if length.is_some() && !length_allowed(&ty) {
            return Err(EngineError::InvalidArgument(format!(
                "column '{}' of type {} does not take a length",
                self.name, ty
            )));
        }
        if self.decimals.is_some() && !is_one_of(DECIMALS_ALLOWED, &ty) {
            return Err(EngineError::InvalidArgument(format!(
                "column '{}' of type {} does not take decimals",
                self.name, ty
            )));
        }

        Ok(match (length, self.decimals) {
            (Some(len), Some(dec)) => {
                if dec > len {
                    return Err(EngineError::InvalidArgument(format!(
                        "column '{}': decimals ({}) cannot exceed length ({})",
                        self.name, dec, len
                    )));
                }
                format!("{}({},{})", ty, len, dec)
            }
            (Some(len), None) => format!("{}({})", ty, len),
            (None, Some(_)) => {
                return Err(EngineError::InvalidArgument(format!(
                    "column '{}': decimals need a length",
                    self.name
                )));
            }
            (None, None) => ty,
        })
    }

    /// Full column clause
    pub fn render(&self) -> EngineResult<String> {
        validate_new_identifier(&self.name)?;
        let ty = self.base_type();
        let mut sql = format!("{} {}", quote_identifier(&self.name), self.render_type()?);

        if self.unsigned {
            if !is_numeric_type(&ty) || ty == "BIT" || ty == "BOOLEAN" {
                return Err(EngineError::InvalidArgument(format!(
                    "UNSIGNED is only valid on numeric columns ('{}' is {})",
                    self.name, ty
                )));
            }
            sql.push_str(" UNSIGNED");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.auto_increment {
            if !is_integer_type(&ty) {
                return Err(EngineError::InvalidArgument(format!(
                    "AUTO_INCREMENT is only valid on integer columns ('{}' is {})",
                    self.name, ty
                )));
            }
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(default) = render_default(&ty, &self.name, self.default_value.as_deref())? {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default);
        }
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            sql.push_str(" COMMENT ");
            sql.push_str(&quote_literal(comment));
        }
        Ok(sql)
    }

    /// Type used for foreign key compatibility
    pub fn normalized_type(&self) -> String {
        normalize_type(&self.base_type(), self.length, self.decimals, self.unsigned)
    }
}

/// Single-quoted SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn render_default(ty: &str, column: &str, raw: Option<&str>) -> EngineResult<Option<String>> {
    let raw = match raw.map(str::trim) {
        None => return Ok(None),
        Some(v) if v.is_empty() || v.eq_ignore_ascii_case("NULL") => return Ok(None),
        Some(v) => v,
    };

    if is_one_of(NO_DEFAULT_TYPES, ty) {
        return Err(EngineError::InvalidArgument(format!(
            "column '{}' of type {} cannot have a default",
            column, ty
        )));
    }

    if is_one_of(TEMPORAL_TYPES, ty) {
        let upper = raw.to_uppercase();
        if matches!(
            upper.as_str(),
            "CURRENT_TIMESTAMP" | "CURRENT_TIMESTAMP()" | "NOW()"
        ) {
            return Ok(Some("CURRENT_TIMESTAMP".to_string()));
        }
        return Ok(Some(quote_literal(raw)));
    }

    if ty == "BOOLEAN" {
        return match raw.to_lowercase().as_str() {
            "true" | "1" => Ok(Some("1".to_string())),
            "false" | "0" => Ok(Some("0".to_string())),
            _ => Err(EngineError::InvalidArgument(format!(
                "default '{}' of column '{}' is not a boolean",
                raw, column
            ))),
        };
    }

    if is_numeric_type(ty) {
        let valid = if is_integer_type(ty) || ty == "BIT" {
            raw.parse::<i64>().is_ok()
        } else {
            raw.parse::<f64>().is_ok_and(f64::is_finite)
        };
        if !valid {
            return Err(EngineError::InvalidArgument(format!(
                "default '{}' of column '{}' is not a valid {} value",
                raw, column, ty
            )));
        }
        return Ok(Some(raw.to_string()));
    }

    Ok(Some(quote_literal(raw)))
}

/// Normalize a type for foreign key comparison
fn normalize_type(base: &str, length: Option<u32>, decimals: Option<u32>, unsigned: bool) -> String {
    let base = match base {
        "INTEGER" => "INT",
        "BOOLEAN" | "BOOL" => "TINYINT",
        "NUMERIC" => "DECIMAL",
        other => other,
    };
    let sign = if unsigned { " UNSIGNED" } else { "" };
    match base {
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => format!("{}{}", base, sign),
        "VARCHAR" | "CHAR" | "VARBINARY" | "BINARY" => match length {
            Some(len) => format!("{}({})", base, len),
            None => base.to_string(),
        },
        "DECIMAL" => format!("DECIMAL({},{}){}", length.unwrap_or(10), decimals.unwrap_or(0), sign),
        "FLOAT" | "DOUBLE" => format!("{}{}", base, sign),
        other => other.to_string(),
    }
}

/// Normalize an `information_schema` column type such as `int(11) unsigned`
pub fn normalize_column_type(column_type: &str) -> String {
    let lower = column_type.trim().to_lowercase();
    let unsigned = lower.contains("unsigned");
    let base_end = lower.find(['(', ' ']).unwrap_or(lower.len());
    let base = lower[..base_end].to_uppercase();

    let args: Vec<u32> = match (lower.find('('), lower.find(')')) {
        (Some(open), Some(close)) if close > open => lower[open + 1..close]
            .split(',')
            .filter_map(|a| a.trim().parse().ok())
            .collect(),
        _ => Vec::new(),
    };
    normalize_type(&base, args.first().copied(), args.get(1).copied(), unsigned)
}

fn referenced_type(column: &ColumnMetadata) -> String {
    if column.column_type.trim().is_empty() {
        normalize_column_type(&column.data_type.mysql_name())
    } else {
        normalize_column_type(&column.column_type)
    }
}

/// Constraint name `fk_<table>_<column>`, cut to the identifier limit
pub fn foreign_key_name(table: &str, column: &str) -> String {
    let mut name = format!("fk_{}_{}", table, column);
    name.truncate(MAX_IDENTIFIER_LEN);
    name
}

/// Smallest signed integer type holding `[min, max]`
pub fn narrowest_integer_type(min: i64, max: i64) -> &'static str {
    if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
        "TINYINT"
    } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
        "SMALLINT"
    } else if (-8_388_608..=8_388_607).contains(&min) && (-8_388_608..=8_388_607).contains(&max) {
        "MEDIUMINT"
    } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
        "INT"
    } else {
        "BIGINT"
    }
}

/// One column of a table inferred from import data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportColumn {
    /// Header as it appeared in the input
    pub header: String,
    /// Sanitized column name
    pub name: String,
    pub declared_type: String,
}

/// Table layout inferred from headers and sample rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportTablePlan {
    pub table: String,
    pub key_column: String,
    pub columns: Vec<ImportColumn>,
}

impl ImportTablePlan {
    /// Column specs for the plan, surrogate key first
    pub fn column_specs(&self) -> Vec<ColumnSpec> {
        let mut specs = vec![
            ColumnSpec::new(&self.key_column, "BIGINT")
                .unsigned()
                .auto_increment()
                .primary_key(),
        ];
        for column in &self.columns {
            let spec = match column.declared_type.as_str() {
                "VARCHAR(255)" => ColumnSpec::new(&column.name, "VARCHAR").with_length(255),
                other => ColumnSpec::new(&column.name, other),
            };
            specs.push(spec);
        }
        specs
    }

    /// Re-key rows from original headers to sanitized column names
    pub fn rename_rows(&self, rows: &[SqlRow]) -> Vec<SqlRow> {
        rows.iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| {
                        (
                            c.name.clone(),
                            row.get(&c.header).cloned().unwrap_or(SqlValue::Null),
                        )
                    })
                    .collect()
            })
            .collect()
    }
}

/// Infer a table layout for `headers` from the values in `rows`
///
/// Integral columns get the narrowest integer type, other numeric columns
/// `DOUBLE`, short text `VARCHAR(255)` and anything longer `TEXT`. An
/// auto-increment surrogate key is added.
pub fn plan_import_table(table: &str, headers: &[String], rows: &[SqlRow]) -> EngineResult<ImportTablePlan> {
    validate_new_identifier(table)?;
    if headers.is_empty() {
        return Err(EngineError::InvalidArgument(
            "import needs at least one column".to_string(),
        ));
    }

    let mut used = HashSet::new();
    let mut columns = Vec::with_capacity(headers.len());
    for header in headers {
        let base = sanitize_column_name(header);
        let mut name = base.clone();
        let mut suffix = 2;
        while !used.insert(name.to_lowercase()) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        columns.push(ImportColumn {
            header: header.clone(),
            declared_type: infer_column_type(header, rows),
            name,
        });
    }

    let mut key_column = "id".to_string();
    let mut suffix = 2;
    while used.contains(&key_column) {
        key_column = format!("id_{}", suffix);
        suffix += 1;
    }

    Ok(ImportTablePlan {
        table: table.to_string(),
        key_column,
        columns,
    })
}

fn infer_column_type(header: &str, rows: &[SqlRow]) -> String {
    let mut min = i64::MAX;
    let mut max = i64::MIN;
    let mut all_int = true;
    let mut all_numeric = true;
    let mut max_len = 0;
    let mut seen = false;

    for value in rows.iter().filter_map(|r| r.get(header)) {
        let Some(text) = value.as_text() else { continue };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        seen = true;
        max_len = max_len.max(text.chars().count());
        match text.parse::<i64>() {
            Ok(i) => {
                min = min.min(i);
                max = max.max(i);
            }
            Err(_) => {
                all_int = false;
                if !text.parse::<f64>().is_ok_and(f64::is_finite) {
                    all_numeric = false;
                }
            }
        }
    }

    if !seen {
        "VARCHAR(255)".to_string()
    } else if all_int {
        narrowest_integer_type(min, max).to_string()
    } else if all_numeric {
        "DOUBLE".to_string()
    } else if max_len <= 255 {
        "VARCHAR(255)".to_string()
    } else {
        "TEXT".to_string()
    }
}

/// DDL operations on one datasource
pub struct DdlGenerator<'a> {
    ds: &'a LogicalDataSource,
    config: &'a DdlConfig,
}

impl<'a> DdlGenerator<'a> {
    pub fn new(ds: &'a LogicalDataSource, config: &'a DdlConfig) -> Self {
        Self { ds, config }
    }

    /// Validate everything and render the `CREATE TABLE` statement
    pub async fn build_create_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        comment: Option<&str>,
    ) -> EngineResult<String> {
        validate_new_identifier(table)?;
        if columns.is_empty() {
            return Err(EngineError::InvalidArgument(format!(
                "table '{}' needs at least one column",
                table
            )));
        }

        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.name.to_lowercase()) {
                return Err(EngineError::InvalidArgument(format!(
                    "column '{}' is declared twice",
                    column.name
                )));
            }
        }

        if Introspector::new(self.ds).table_exists(table).await? {
            return Err(EngineError::TableAlreadyExists(table.to_string()));
        }

        let mut definitions = Vec::with_capacity(columns.len() + 2);
        for column in columns {
            definitions.push(column.render()?);
        }

        let primary: Vec<String> = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote_identifier(&c.name))
            .collect();
        if !primary.is_empty() {
            definitions.push(format!("PRIMARY KEY ({})", primary.join(", ")));
        }

        for column in columns {
            if let Some(fk) = &column.foreign_key {
                definitions.push(self.foreign_key_clause(table, column, fk, columns).await?);
            }
        }

        let mut sql = format!(
            "CREATE TABLE {} ({}) ENGINE={} DEFAULT CHARSET={} COLLATE={}",
            self.ds.qualify(table),
            definitions.join(", "),
            self.config.engine,
            self.config.charset,
            self.config.collation
        );
        if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
            sql.push_str(" COMMENT=");
            sql.push_str(&quote_literal(comment));
        }
        Ok(sql)
    }

    async fn foreign_key_clause(
        &self,
        table: &str,
        column: &ColumnSpec,
        fk: &ForeignKeySpec,
        siblings: &[ColumnSpec],
    ) -> EngineResult<String> {
        validate_identifier(&fk.ref_table)?;
        validate_identifier(&fk.ref_column)?;
        let target = format!("{}.{}", fk.ref_table, fk.ref_column);

        let (ref_column, required) = if fk.ref_table.eq_ignore_ascii_case(table) {
            let sibling = siblings
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&fk.ref_column))
                .ok_or_else(|| EngineError::ForeignKeyTargetMissing(target.clone()))?;
            (sibling.name.clone(), sibling.normalized_type())
        } else {
            let ref_columns = match self
                .ds
                .catalog()
                .get_columns(self.ds.scope(), &fk.ref_table)
                .await
            {
                Ok(columns) => columns,
                Err(sqlscout_catalog::CatalogError::TableNotFound(_, _)) => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            let referenced = ref_columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&fk.ref_column))
                .ok_or_else(|| EngineError::ForeignKeyTargetMissing(target.clone()))?;
            (referenced.name.clone(), referenced_type(referenced))
        };

        let actual = column.normalized_type();
        if actual != required {
            return Err(EngineError::ForeignKeyTypeMismatch {
                column: column.name.clone(),
                ref_table: fk.ref_table.clone(),
                ref_column: ref_column.clone(),
                actual,
                required,
            });
        }

        let on_delete = fk.on_delete.unwrap_or(self.config.default_on_delete);
        let on_update = fk.on_update.unwrap_or(self.config.default_on_update);
        if column.not_null
            && (on_delete == ForeignKeyAction::SetNull || on_update == ForeignKeyAction::SetNull)
        {
            return Err(EngineError::InvalidArgument(format!(
                "column '{}' is NOT NULL and cannot use SET NULL",
                column.name
            )));
        }

        Ok(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            quote_identifier(&foreign_key_name(table, &column.name)),
            quote_identifier(&column.name),
            self.ds.qualify(&fk.ref_table),
            quote_identifier(&ref_column),
            on_delete,
            on_update
        ))
    }

    /// Create a table; returns the statement that ran
    pub async fn create_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
        comment: Option<&str>,
    ) -> EngineResult<String> {
        let sql = self.build_create_table(table, columns, comment).await?;
        self.ds.executor().execute_ddl(&sql).await?;
        info!(datasource = %self.ds.name(), table, columns = columns.len(), "Created table");
        Ok(sql)
    }

    pub async fn drop_table(&self, table: &str) -> EngineResult<()> {
        Introspector::new(self.ds).require_table(table).await?;
        let sql = format!("DROP TABLE {}", self.ds.qualify(table));
        self.ds.executor().execute_ddl(&sql).await?;
        warn!(datasource = %self.ds.name(), table, "Dropped table");
        Ok(())
    }

    /// Redefine an existing column
    pub async fn modify_column(&self, table: &str, column: &ColumnSpec) -> EngineResult<String> {
        if column.foreign_key.is_some() || column.primary_key {
            return Err(EngineError::InvalidArgument(
                "keys cannot be changed through a column modification".to_string(),
            ));
        }
        let existing = Introspector::new(self.ds).list_columns(table).await?;
        if !existing
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&column.name))
        {
            return Err(EngineError::ColumnNotFound(format!("{}.{}", table, column.name)));
        }

        let sql = format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.ds.qualify(table),
            column.render()?
        );
        self.ds.executor().execute_ddl(&sql).await?;
        info!(datasource = %self.ds.name(), table, column = %column.name, "Modified column");
        Ok(sql)
    }

    /// Create a table laid out for an import
    pub async fn create_table_for_import(
        &self,
        table: &str,
        headers: &[String],
        rows: &[SqlRow],
    ) -> EngineResult<ImportTablePlan> {
        let plan = plan_import_table(table, headers, rows)?;
        self.create_table(table, &plan.column_specs(), None).await?;
        Ok(plan)
    }
}

/// `CREATE DATABASE` on the server behind `ds`
pub async fn create_database(
    ds: &LogicalDataSource,
    name: &str,
    charset: Option<&str>,
    collation: Option<&str>,
    config: &DdlConfig,
) -> EngineResult<()> {
    validate_identifier(name)?;
    let charset = validate_identifier(charset.unwrap_or(&config.charset))?;
    let collation = validate_identifier(collation.unwrap_or(&config.collation))?;
    if ds.catalog().schema_exists(name).await? {
        return Err(EngineError::DatabaseAlreadyExists(name.to_string()));
    }
    let sql = format!(
        "CREATE DATABASE {} CHARACTER SET {} COLLATE {}",
        quote_identifier(name),
        charset,
        collation
    );
    ds.executor().execute_ddl(&sql).await?;
    info!(database = name, charset, collation, "Created database");
    Ok(())
}

/// `DROP DATABASE` on the server behind `ds`
pub async fn drop_database(ds: &LogicalDataSource, name: &str) -> EngineResult<()> {
    validate_identifier(name)?;
    if !ds.catalog().schema_exists(name).await? {
        return Err(EngineError::UnknownDataSource(name.to_string()));
    }
    ds.executor()
        .execute_ddl(&format!("DROP DATABASE {}", quote_identifier(name)))
        .await?;
    warn!(database = name, "Dropped database");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlscout_catalog::DataType;

    #[test]
    fn test_render_column() {
        let spec = ColumnSpec::new("weight", "decimal")
            .with_length(10)
            .with_decimals(2)
            .unsigned()
            .not_null()
            .with_default("0.00")
            .with_comment("g/mol");
        assert_eq!(
            spec.render().unwrap(),
            "`weight` DECIMAL(10,2) UNSIGNED NOT NULL DEFAULT 0.00 COMMENT 'g/mol'"
        );
    }

    #[test]
    fn test_render_string_default_is_escaped() {
        let spec = ColumnSpec::new("label", "VARCHAR")
            .with_length(32)
            .with_default("it's");
        assert_eq!(spec.render().unwrap(), "`label` VARCHAR(32) DEFAULT 'it''s'");
    }

    #[test]
    fn test_render_null_default_is_omitted() {
        let spec = ColumnSpec::new("label", "VARCHAR").with_length(32).with_default("null");
        assert_eq!(spec.render().unwrap(), "`label` VARCHAR(32)");
    }

    #[test]
    fn test_render_temporal_keyword() {
        let spec = ColumnSpec::new("created_at", "TIMESTAMP").with_default("current_timestamp");
        assert_eq!(
            spec.render().unwrap(),
            "`created_at` TIMESTAMP DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_render_rejects_bad_input() {
        assert!(matches!(
            ColumnSpec::new("name", "VARCHAR").render(),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            ColumnSpec::new("name", "ENUM").render(),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            ColumnSpec::new("qty", "INT").with_default("abc").render(),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            ColumnSpec::new("1qty", "INT").render(),
            Err(EngineError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            ColumnSpec::new("note", "TEXT").auto_increment().render(),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_normalized_types() {
        assert_eq!(ColumnSpec::new("a", "integer").normalized_type(), "INT");
        assert_eq!(ColumnSpec::new("a", "INT").with_length(11).normalized_type(), "INT");
        assert_eq!(ColumnSpec::new("a", "BIGINT").unsigned().normalized_type(), "BIGINT UNSIGNED");
        assert_eq!(ColumnSpec::new("a", "BOOLEAN").normalized_type(), "TINYINT");
        assert_eq!(
            ColumnSpec::new("a", "VARCHAR").with_length(64).normalized_type(),
            "VARCHAR(64)"
        );
        assert_eq!(
            ColumnSpec::new("a", "NUMERIC").with_length(8).normalized_type(),
            "DECIMAL(8,0)"
        );

        assert_eq!(normalize_column_type("int(11)"), "INT");
        assert_eq!(normalize_column_type("int(10) unsigned"), "INT UNSIGNED");
        assert_eq!(normalize_column_type("tinyint(1)"), "TINYINT");
        assert_eq!(normalize_column_type("varchar(64)"), "VARCHAR(64)");
        assert_eq!(normalize_column_type("decimal(10,2)"), "DECIMAL(10,2)");
    }

    #[test]
    fn test_referenced_type_falls_back_to_data_type() {
        let column = ColumnMetadata::new("id", DataType::Integer);
        assert_eq!(referenced_type(&column), "INT");
        let column = ColumnMetadata::new("code", DataType::Varchar(Some(16)))
            .with_column_type("varchar(16)");
        assert_eq!(referenced_type(&column), "VARCHAR(16)");
    }

    #[test]
    fn test_foreign_key_action_parse() {
        assert_eq!("set null".parse::<ForeignKeyAction>().unwrap(), ForeignKeyAction::SetNull);
        assert_eq!("NO_ACTION".parse::<ForeignKeyAction>().unwrap(), ForeignKeyAction::NoAction);
        assert_eq!("cascade".parse::<ForeignKeyAction>().unwrap(), ForeignKeyAction::Cascade);
        assert!("DROP".parse::<ForeignKeyAction>().is_err());
    }

    #[test]
    fn test_foreign_key_name_truncated() {
        let name = foreign_key_name(&"t".repeat(40), &"c".repeat(40));
        assert_eq!(name.len(), 64);
        assert!(name.starts_with("fk_ttt"));
    }

    #[test]
    fn test_narrowest_integer_type() {
        assert_eq!(narrowest_integer_type(0, 127), "TINYINT");
        assert_eq!(narrowest_integer_type(-129, 0), "SMALLINT");
        assert_eq!(narrowest_integer_type(0, 70_000), "MEDIUMINT");
        assert_eq!(narrowest_integer_type(0, 2_147_483_647), "INT");
        assert_eq!(narrowest_integer_type(0, 2_147_483_648), "BIGINT");
    }

    #[test]
    fn test_plan_import_table() {
        let headers = vec![
            "Compound ID".to_string(),
            "Weight".to_string(),
            "Name".to_string(),
            "id".to_string(),
        ];
        let rows = vec![
            SqlRow::new()
                .with("Compound ID", "12")
                .with("Weight", "180.16")
                .with("Name", "aspirin")
                .with("id", "7"),
            SqlRow::new()
                .with("Compound ID", "40000")
                .with("Weight", "")
                .with("Name", "caffeine")
                .with("id", "8"),
        ];
        let plan = plan_import_table("staging", &headers, &rows).unwrap();
        let types: Vec<_> = plan.columns.iter().map(|c| c.declared_type.as_str()).collect();
        assert_eq!(types, vec!["MEDIUMINT", "DOUBLE", "VARCHAR(255)", "TINYINT"]);
        assert_eq!(plan.columns[0].name, "Compound_ID");
        assert_eq!(plan.key_column, "id_2");

        let renamed = plan.rename_rows(&rows);
        assert_eq!(renamed[0].get("Compound_ID"), Some(&SqlValue::Text("12".to_string())));

        let specs = plan.column_specs();
        assert!(specs[0].primary_key && specs[0].auto_increment);
        assert_eq!(specs[3].render().unwrap(), "`Name` VARCHAR(255)");
    }
}
