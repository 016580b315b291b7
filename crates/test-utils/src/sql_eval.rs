// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Statement lowering and predicate evaluator
//!
//! Statements are parsed with `sqlparser`'s MySQL dialect and lowered into
//! the small statement model below, which covers what the engine emits:
//! value searches, paged selects, multi-row inserts, keyed updates and
//! deletes, and the table and database DDL. Predicates follow SQL
//! three-valued logic and MySQL's default case-insensitive collation.

use sqlparser::ast::{
    AlterTableOperation, AssignmentTarget, BinaryOperator, ColumnDef as SqlColumnDef,
    ColumnOption, CommentDef, CreateTable, CreateTableOptions, DataType as SqlDataType,
    Expr as SqlExpr, FromTable, LimitClause, ObjectName, ObjectType, Query, SelectItem, SetExpr,
    SqlOption, Statement, TableConstraint, TableFactor, TableObject, TableWithJoins,
    UnaryOperator, Value,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::Token;
use sqlscout_catalog::{CatalogError, CatalogResult, SqlValue};
use std::cmp::Ordering;
use std::fmt::Display;

fn syntax(message: &str) -> CatalogError {
    CatalogError::QueryFailed(format!("You have an error in your SQL syntax: {}", message))
}

fn parser_error(e: ParserError) -> CatalogError {
    syntax(&e.to_string())
}

fn unsupported(what: impl Display) -> CatalogError {
    syntax(&format!("unsupported statement shape: {}", what))
}

/// `schema.table` or bare `table`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

/// Value position in an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(String),
    Param(usize),
    Literal(SqlValue),
    /// `CAST(x AS CHAR)` or `CONVERT(x USING ...)`, optionally collated
    CastChar(Box<Operand>),
}

/// WHERE clause tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Eq(Operand, Operand),
    Like(Operand, Operand),
    IsNull { operand: Operand, negated: bool },
}

/// Column clause of `CREATE TABLE` or `MODIFY COLUMN`
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// Lower-case type text, e.g. `decimal(10,2) unsigned`
    pub column_type: String,
    pub not_null: bool,
    pub auto_increment: bool,
    pub default_value: Option<String>,
    pub comment: Option<String>,
}

/// `FOREIGN KEY (column) REFERENCES table (ref_column)`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedStatement {
    SelectOne,
    Exists {
        table: TableRef,
        filter: Expr,
    },
    Count {
        table: TableRef,
        filter: Option<Expr>,
    },
    SelectPage {
        table: TableRef,
        filter: Option<Expr>,
        offset: Operand,
        limit: Operand,
    },
    Insert {
        table: TableRef,
        columns: Vec<String>,
        rows: Vec<Vec<Operand>>,
    },
    Update {
        table: TableRef,
        assignments: Vec<(String, Operand)>,
        filter: Option<Expr>,
    },
    Delete {
        table: TableRef,
        filter: Option<Expr>,
    },
    CreateTable {
        table: TableRef,
        columns: Vec<ColumnDef>,
        primary_key: Vec<String>,
        foreign_keys: Vec<ForeignKeyDef>,
        comment: Option<String>,
    },
    DropTable {
        table: TableRef,
    },
    ModifyColumn {
        table: TableRef,
        column: ColumnDef,
    },
    CreateDatabase {
        name: String,
    },
    DropDatabase {
        name: String,
    },
}

impl ParsedStatement {
    /// Table the statement reads or writes, if any
    pub fn table(&self) -> Option<&TableRef> {
        match self {
            ParsedStatement::Exists { table, .. }
            | ParsedStatement::Count { table, .. }
            | ParsedStatement::SelectPage { table, .. }
            | ParsedStatement::Insert { table, .. }
            | ParsedStatement::Update { table, .. }
            | ParsedStatement::Delete { table, .. }
            | ParsedStatement::CreateTable { table, .. }
            | ParsedStatement::DropTable { table }
            | ParsedStatement::ModifyColumn { table, .. } => Some(table),
            _ => None,
        }
    }

    /// Whether the statement touches table rows (as opposed to DDL)
    pub fn is_data_access(&self) -> bool {
        matches!(
            self,
            ParsedStatement::Exists { .. }
                | ParsedStatement::Count { .. }
                | ParsedStatement::SelectPage { .. }
                | ParsedStatement::Insert { .. }
                | ParsedStatement::Update { .. }
                | ParsedStatement::Delete { .. }
        )
    }
}

/// Parse one statement
pub fn parse_statement(sql: &str) -> CatalogResult<ParsedStatement> {
    let dialect = MySqlDialect {};
    let mut parser = Parser::new(&dialect)
        .try_with_sql(sql)
        .map_err(parser_error)?;
    let statement = parser.parse_statement().map_err(parser_error)?;

    // Character set and collation of CREATE DATABASE are accepted as-is
    if !matches!(statement, Statement::CreateDatabase { .. }) {
        while parser.consume_token(&Token::SemiColon) {}
        let next = parser.peek_token();
        if next.token != Token::EOF {
            return Err(syntax(&format!("unexpected trailing input near '{}'", next.token)));
        }
    }

    Lowering::default().statement(&statement)
}

/// Walks the AST in source order so `?` placeholders get positional indexes
#[derive(Default)]
struct Lowering {
    next_param: usize,
}

impl Lowering {
    fn statement(&mut self, statement: &Statement) -> CatalogResult<ParsedStatement> {
        match statement {
            Statement::Query(query) => self.query(query),
            Statement::Insert(insert) => {
                let TableObject::TableName(name) = &insert.table else {
                    return Err(unsupported("INSERT into a table function"));
                };
                let source = insert
                    .source
                    .as_ref()
                    .ok_or_else(|| unsupported("INSERT without VALUES"))?;
                let SetExpr::Values(values) = source.body.as_ref() else {
                    return Err(unsupported("INSERT ... SELECT"));
                };
                let columns: Vec<String> = insert.columns.iter().map(|c| c.value.clone()).collect();

                let mut rows = Vec::with_capacity(values.rows.len());
                for (index, row) in values.rows.iter().enumerate() {
                    if row.len() != columns.len() {
                        return Err(CatalogError::QueryFailed(format!(
                            "Column count doesn't match value count at row {}",
                            index + 1
                        )));
                    }
                    rows.push(row.iter().map(|e| self.operand(e)).collect::<CatalogResult<_>>()?);
                }
                Ok(ParsedStatement::Insert {
                    table: table_ref(name)?,
                    columns,
                    rows,
                })
            }
            Statement::Update {
                table,
                assignments,
                selection,
                ..
            } => {
                let table = single_table(table)?;
                let mut lowered = Vec::with_capacity(assignments.len());
                for assignment in assignments {
                    let AssignmentTarget::ColumnName(column) = &assignment.target else {
                        return Err(unsupported("tuple assignment"));
                    };
                    lowered.push((leaf(column)?, self.operand(&assignment.value)?));
                }
                Ok(ParsedStatement::Update {
                    table,
                    assignments: lowered,
                    filter: self.optional_expr(selection.as_ref())?,
                })
            }
            Statement::Delete(delete) => {
                let tables = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => tables,
                };
                let [table] = tables.as_slice() else {
                    return Err(unsupported("multi-table DELETE"));
                };
                Ok(ParsedStatement::Delete {
                    table: single_table(table)?,
                    filter: self.optional_expr(delete.selection.as_ref())?,
                })
            }
            Statement::CreateTable(create) => self.create_table(create),
            Statement::AlterTable {
                name, operations, ..
            } => {
                let [AlterTableOperation::ModifyColumn {
                    col_name,
                    data_type,
                    options,
                    ..
                }] = operations.as_slice()
                else {
                    return Err(unsupported("ALTER TABLE other than MODIFY COLUMN"));
                };
                let mut column = ColumnDef::new(col_name.value.clone(), data_type);
                for option in options {
                    column.apply(option);
                }
                Ok(ParsedStatement::ModifyColumn {
                    table: table_ref(name)?,
                    column,
                })
            }
            Statement::CreateDatabase { db_name, .. } => Ok(ParsedStatement::CreateDatabase {
                name: leaf(db_name)?,
            }),
            Statement::Drop {
                object_type, names, ..
            } => {
                let [name] = names.as_slice() else {
                    return Err(unsupported("DROP of several objects"));
                };
                match object_type {
                    ObjectType::Table => Ok(ParsedStatement::DropTable {
                        table: table_ref(name)?,
                    }),
                    ObjectType::Database | ObjectType::Schema => Ok(ParsedStatement::DropDatabase {
                        name: leaf(name)?,
                    }),
                    other => Err(unsupported(format!("DROP {}", other))),
                }
            }
            other => Err(unsupported(other)),
        }
    }

    fn query(&mut self, query: &Query) -> CatalogResult<ParsedStatement> {
        let SetExpr::Select(select) = query.body.as_ref() else {
            return Err(unsupported(query));
        };
        let [item] = select.projection.as_slice() else {
            return Err(unsupported(query));
        };

        match item {
            SelectItem::UnnamedExpr(SqlExpr::Value(v))
                if select.from.is_empty() && matches!(&v.value, Value::Number(n, _) if n == "1") =>
            {
                Ok(ParsedStatement::SelectOne)
            }
            SelectItem::UnnamedExpr(SqlExpr::Exists {
                subquery,
                negated: false,
            }) if select.from.is_empty() => {
                let SetExpr::Select(inner) = subquery.body.as_ref() else {
                    return Err(unsupported(subquery));
                };
                let [from] = inner.from.as_slice() else {
                    return Err(unsupported(subquery));
                };
                let filter = self
                    .optional_expr(inner.selection.as_ref())?
                    .ok_or_else(|| unsupported("EXISTS without WHERE"))?;
                Ok(ParsedStatement::Exists {
                    table: single_table(from)?,
                    filter,
                })
            }
            SelectItem::UnnamedExpr(SqlExpr::Function(function))
                if function.name.to_string().eq_ignore_ascii_case("COUNT") =>
            {
                let [from] = select.from.as_slice() else {
                    return Err(unsupported(query));
                };
                Ok(ParsedStatement::Count {
                    table: single_table(from)?,
                    filter: self.optional_expr(select.selection.as_ref())?,
                })
            }
            SelectItem::Wildcard(_) => {
                let [from] = select.from.as_slice() else {
                    return Err(unsupported(query));
                };
                let table = single_table(from)?;
                let filter = self.optional_expr(select.selection.as_ref())?;
                let Some(LimitClause::OffsetCommaLimit { offset, limit }) = &query.limit_clause else {
                    return Err(unsupported("SELECT * without LIMIT offset, count"));
                };
                Ok(ParsedStatement::SelectPage {
                    table,
                    filter,
                    offset: self.operand(offset)?,
                    limit: self.operand(limit)?,
                })
            }
            _ => Err(unsupported(query)),
        }
    }

    fn create_table(&mut self, create: &CreateTable) -> CatalogResult<ParsedStatement> {
        let columns = create.columns.iter().map(ColumnDef::from_sql).collect();

        let mut primary_key = Vec::new();
        let mut foreign_keys = Vec::new();
        for constraint in &create.constraints {
            match constraint {
                TableConstraint::PrimaryKey { columns, .. } => {
                    primary_key = columns.iter().map(unquote).collect();
                }
                TableConstraint::ForeignKey {
                    columns,
                    foreign_table,
                    referred_columns,
                    ..
                } => {
                    let (Some(column), Some(ref_column)) = (columns.first(), referred_columns.first()) else {
                        return Err(unsupported("FOREIGN KEY without columns"));
                    };
                    foreign_keys.push(ForeignKeyDef {
                        column: column.value.clone(),
                        ref_table: leaf(foreign_table)?,
                        ref_column: ref_column.value.clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(ParsedStatement::CreateTable {
            table: table_ref(&create.name)?,
            columns,
            primary_key,
            foreign_keys,
            comment: table_comment(create),
        })
    }

    fn optional_expr(&mut self, expr: Option<&SqlExpr>) -> CatalogResult<Option<Expr>> {
        expr.map(|e| self.expr(e)).transpose()
    }

    fn expr(&mut self, expr: &SqlExpr) -> CatalogResult<Expr> {
        match expr {
            SqlExpr::Nested(inner) => self.expr(inner),
            SqlExpr::BinaryOp { left, op, right } => {
                let combine: fn(Box<Expr>, Box<Expr>) -> Expr = match op {
                    BinaryOperator::Or => Expr::Or,
                    BinaryOperator::And => Expr::And,
                    BinaryOperator::Eq => {
                        let left = self.operand(left)?;
                        return Ok(Expr::Eq(left, self.operand(right)?));
                    }
                    other => return Err(unsupported(format!("operator {}", other))),
                };
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                Ok(combine(Box::new(left), Box::new(right)))
            }
            SqlExpr::Like {
                negated: false,
                expr,
                pattern,
                ..
            } => {
                let left = self.operand(expr)?;
                Ok(Expr::Like(left, self.operand(pattern)?))
            }
            SqlExpr::IsNull(inner) => Ok(Expr::IsNull {
                operand: self.operand(inner)?,
                negated: false,
            }),
            SqlExpr::IsNotNull(inner) => Ok(Expr::IsNull {
                operand: self.operand(inner)?,
                negated: true,
            }),
            other => Err(unsupported(format!("predicate {}", other))),
        }
    }

    fn operand(&mut self, expr: &SqlExpr) -> CatalogResult<Operand> {
        match expr {
            SqlExpr::Nested(inner) | SqlExpr::Collate { expr: inner, .. } => self.operand(inner),
            SqlExpr::Identifier(ident) => Ok(Operand::Column(ident.value.clone())),
            SqlExpr::CompoundIdentifier(parts) => parts
                .last()
                .map(|ident| Operand::Column(ident.value.clone()))
                .ok_or_else(|| unsupported("empty identifier")),
            SqlExpr::Cast { expr, .. } | SqlExpr::Convert { expr, .. } => {
                Ok(Operand::CastChar(Box::new(self.operand(expr)?)))
            }
            SqlExpr::Value(v) => match &v.value {
                Value::Placeholder(_) => {
                    let index = self.next_param;
                    self.next_param += 1;
                    Ok(Operand::Param(index))
                }
                value => Ok(Operand::Literal(literal(value)?)),
            },
            SqlExpr::UnaryOp {
                op: UnaryOperator::Minus,
                expr,
            } => match self.operand(expr)? {
                Operand::Literal(SqlValue::Int(i)) => Ok(Operand::Literal(SqlValue::Int(-i))),
                Operand::Literal(SqlValue::Float(f)) => Ok(Operand::Literal(SqlValue::Float(-f))),
                _ => Err(unsupported(format!("negation of {}", expr))),
            },
            other => Err(unsupported(format!("operand {}", other))),
        }
    }
}

fn literal(value: &Value) -> CatalogResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Boolean(b) => Ok(SqlValue::Bool(*b)),
        Value::Number(n, _) => n
            .parse::<i64>()
            .map(SqlValue::Int)
            .or_else(|_| n.parse::<f64>().map(SqlValue::Float))
            .map_err(|_| syntax(&format!("bad number '{}'", n))),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => Ok(SqlValue::Text(s.clone())),
        other => Err(unsupported(format!("literal {}", other))),
    }
}

/// Text of a DEFAULT expression as MySQL reports it
fn default_text(expr: &SqlExpr) -> String {
    match expr {
        SqlExpr::Value(v) => match &v.value {
            Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) | Value::Number(s, _) => s.clone(),
            other => other.to_string(),
        },
        other => other.to_string(),
    }
}

/// Identifier text without MySQL backtick quoting
fn unquote(name: &impl Display) -> String {
    name.to_string().trim_matches('`').replace("``", "`")
}

fn leaf(name: &ObjectName) -> CatalogResult<String> {
    name.0
        .last()
        .and_then(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .ok_or_else(|| unsupported(format!("object name {}", name)))
}

fn table_ref(name: &ObjectName) -> CatalogResult<TableRef> {
    let parts: Vec<String> = name
        .0
        .iter()
        .filter_map(|part| part.as_ident())
        .map(|ident| ident.value.clone())
        .collect();
    match parts.as_slice() {
        [table] => Ok(TableRef {
            schema: None,
            name: table.clone(),
        }),
        [schema, table] => Ok(TableRef {
            schema: Some(schema.clone()),
            name: table.clone(),
        }),
        _ => Err(unsupported(format!("table name {}", name))),
    }
}

fn single_table(table: &TableWithJoins) -> CatalogResult<TableRef> {
    if !table.joins.is_empty() {
        return Err(unsupported("JOIN"));
    }
    let TableFactor::Table { name, .. } = &table.relation else {
        return Err(unsupported(format!("table factor {}", table.relation)));
    };
    table_ref(name)
}

fn table_comment(create: &CreateTable) -> Option<String> {
    let options = match &create.table_options {
        CreateTableOptions::With(options)
        | CreateTableOptions::Options(options)
        | CreateTableOptions::Plain(options)
        | CreateTableOptions::TableProperties(options) => options.as_slice(),
        CreateTableOptions::None => &[],
    };
    options.iter().find_map(|option| match option {
        SqlOption::Comment(comment) => Some(comment_text(comment)),
        SqlOption::KeyValue { key, value } if key.value.eq_ignore_ascii_case("COMMENT") => {
            Some(default_text(value))
        }
        _ => None,
    })
}

fn comment_text(comment: &CommentDef) -> String {
    match comment {
        CommentDef::WithEq(text) | CommentDef::WithoutEq(text) => text.clone(),
        #[allow(unreachable_patterns)]
        other => other.to_string(),
    }
}

impl ColumnDef {
    fn new(name: String, data_type: &SqlDataType) -> Self {
        Self {
            name,
            column_type: data_type.to_string().to_lowercase(),
            not_null: false,
            auto_increment: false,
            default_value: None,
            comment: None,
        }
    }

    fn from_sql(column: &SqlColumnDef) -> Self {
        let mut def = Self::new(column.name.value.clone(), &column.data_type);
        for option in &column.options {
            def.apply(&option.option);
        }
        def
    }

    fn apply(&mut self, option: &ColumnOption) {
        match option {
            ColumnOption::NotNull => self.not_null = true,
            ColumnOption::Null => self.not_null = false,
            ColumnOption::Default(expr) => self.default_value = Some(default_text(expr)),
            ColumnOption::Comment(text) => self.comment = Some(text.clone()),
            other if other.to_string().eq_ignore_ascii_case("AUTO_INCREMENT") => {
                self.auto_increment = true;
            }
            _ => {}
        }
    }
}

/// Row access for expression evaluation
pub trait RowContext {
    /// Value of `column`, or `None` when the column does not exist
    fn column(&self, column: &str) -> Option<SqlValue>;
}

/// Evaluate an operand against a row and the bound parameters
pub fn eval_operand(
    operand: &Operand,
    row: &dyn RowContext,
    params: &[SqlValue],
) -> CatalogResult<SqlValue> {
    match operand {
        Operand::Column(name) => row
            .column(name)
            .ok_or_else(|| CatalogError::UnknownColumn(format!("Unknown column '{}'", name))),
        Operand::Param(index) => params.get(*index).cloned().ok_or_else(|| {
            CatalogError::QueryFailed(format!("missing value for parameter {}", index + 1))
        }),
        Operand::Literal(value) => Ok(value.clone()),
        Operand::CastChar(inner) => Ok(match eval_operand(inner, row, params)? {
            SqlValue::Null => SqlValue::Null,
            value => SqlValue::Text(value.as_text().unwrap_or_default()),
        }),
    }
}

/// Evaluate a predicate; `None` is SQL UNKNOWN
pub fn eval_expr(expr: &Expr, row: &dyn RowContext, params: &[SqlValue]) -> CatalogResult<Option<bool>> {
    Ok(match expr {
        Expr::Or(left, right) => {
            let l = eval_expr(left, row, params)?;
            let r = eval_expr(right, row, params)?;
            match (l, r) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            }
        }
        Expr::And(left, right) => {
            let l = eval_expr(left, row, params)?;
            let r = eval_expr(right, row, params)?;
            match (l, r) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            }
        }
        Expr::Eq(left, right) => {
            let l = eval_operand(left, row, params)?;
            let r = eval_operand(right, row, params)?;
            compare(&l, &r).map(|o| o == Ordering::Equal)
        }
        Expr::Like(left, pattern) => {
            let l = eval_operand(left, row, params)?;
            let p = eval_operand(pattern, row, params)?;
            match (l.as_text(), p.as_text()) {
                (Some(text), Some(pattern)) => Some(like_matches(&text, &pattern)),
                _ => None,
            }
        }
        Expr::IsNull { operand, negated } => {
            let value = eval_operand(operand, row, params)?;
            Some(value.is_null() != *negated)
        }
    })
}

/// Whether a WHERE clause selects the row
pub fn matches(filter: Option<&Expr>, row: &dyn RowContext, params: &[SqlValue]) -> CatalogResult<bool> {
    match filter {
        Some(expr) => Ok(eval_expr(expr, row, params)? == Some(true)),
        None => Ok(true),
    }
}

fn is_number(value: &SqlValue) -> bool {
    matches!(value, SqlValue::Int(_) | SqlValue::Float(_) | SqlValue::Bool(_))
}

/// MySQL comparison: numeric when either side is a number, else
/// case-insensitive text
pub fn compare(left: &SqlValue, right: &SqlValue) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    if is_number(left) || is_number(right) {
        let l = left.as_f64().unwrap_or(0.0);
        let r = right.as_f64().unwrap_or(0.0);
        return l.partial_cmp(&r);
    }
    let l = left.as_text().unwrap_or_default().to_lowercase();
    let r = right.as_text().unwrap_or_default().to_lowercase();
    Some(l.trim_end().cmp(r.trim_end()))
}

/// Case-insensitive LIKE with `%`, `_` and backslash escapes
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();

    enum Part {
        Any,
        One,
        Lit(char),
    }
    let mut parts = Vec::new();
    let mut chars = pattern.to_lowercase().chars().collect::<Vec<_>>().into_iter();
    while let Some(c) = chars.next() {
        parts.push(match c {
            '%' => Part::Any,
            '_' => Part::One,
            '\\' => Part::Lit(chars.next().unwrap_or('\\')),
            other => Part::Lit(other),
        });
    }

    // reachable[j]: text[..j] matches the parts consumed so far
    let mut reachable = vec![false; text.len() + 1];
    reachable[0] = true;
    for part in &parts {
        let mut next = vec![false; text.len() + 1];
        match part {
            Part::Any => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= reachable[j];
                    next[j] = seen;
                }
            }
            Part::One => {
                for j in 0..text.len() {
                    next[j + 1] = reachable[j];
                }
            }
            Part::Lit(c) => {
                for j in 0..text.len() {
                    next[j + 1] = reachable[j] && text[j] == *c;
                }
            }
        }
        reachable = next;
    }
    reachable[text.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapRow(HashMap<String, SqlValue>);

    impl RowContext for MapRow {
        fn column(&self, column: &str) -> Option<SqlValue> {
            self.0.get(column).cloned()
        }
    }

    fn row(pairs: &[(&str, SqlValue)]) -> MapRow {
        MapRow(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn test_like_matches() {
        assert!(like_matches("Aspirin", "%spir%"));
        assert!(like_matches("abc", "a_c"));
        assert!(!like_matches("abc", "a_d"));
        assert!(like_matches("50%", "%0\\%"));
        assert!(!like_matches("500", "%0\\%"));
        assert!(like_matches("", "%"));
    }

    #[test]
    fn test_parse_value_search() {
        let stmt = parse_statement(
            "SELECT EXISTS(SELECT 1 FROM `lab`.`compounds` WHERE (`id` = ? OR CAST(`id` AS CHAR) LIKE ?) OR CONVERT(`name` USING utf8mb4) COLLATE utf8mb4_general_ci LIKE ?)",
        )
        .unwrap();
        let ParsedStatement::Exists { table, filter } = stmt else {
            panic!("expected EXISTS");
        };
        assert_eq!(table.schema.as_deref(), Some("lab"));
        assert_eq!(table.name, "compounds");

        let params = vec![SqlValue::Int(7), SqlValue::from("%7%"), SqlValue::from("%7%")];
        let hit = row(&[("id", SqlValue::Int(7)), ("name", SqlValue::from("x"))]);
        let miss = row(&[("id", SqlValue::Int(8)), ("name", SqlValue::Null)]);
        assert_eq!(eval_expr(&filter, &hit, &params).unwrap(), Some(true));
        assert_eq!(eval_expr(&filter, &miss, &params).unwrap(), None);
    }

    #[test]
    fn test_null_safe_equality() {
        let stmt = parse_statement(
            "SELECT COUNT(*) FROM `t` WHERE (`a` = ? OR (`a` IS NULL AND ? IS NULL)) AND `b` = ?",
        )
        .unwrap();
        let ParsedStatement::Count { filter, .. } = stmt else {
            panic!("expected COUNT");
        };
        let filter = filter.unwrap();
        let r = row(&[("a", SqlValue::Null), ("b", SqlValue::Int(1))]);
        let params = vec![SqlValue::Null, SqlValue::Null, SqlValue::from("1")];
        assert!(matches(Some(&filter), &r, &params).unwrap());
    }

    #[test]
    fn test_parse_create_table() {
        let stmt = parse_statement(
            "CREATE TABLE `assays` (`id` INT NOT NULL AUTO_INCREMENT, `weight` DECIMAL(10,2) DEFAULT 0.00 COMMENT 'g/mol', `compound_id` BIGINT UNSIGNED, PRIMARY KEY (`id`), CONSTRAINT `fk_assays_compound_id` FOREIGN KEY (`compound_id`) REFERENCES `compounds` (`id`) ON DELETE SET NULL ON UPDATE NO ACTION) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci COMMENT='Assay runs'",
        )
        .unwrap();
        let ParsedStatement::CreateTable {
            columns,
            primary_key,
            foreign_keys,
            comment,
            ..
        } = stmt
        else {
            panic!("expected CREATE TABLE");
        };
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1].column_type, "decimal(10,2)");
        assert_eq!(columns[1].default_value.as_deref(), Some("0.00"));
        assert_eq!(columns[1].comment.as_deref(), Some("g/mol"));
        assert_eq!(columns[2].column_type, "bigint unsigned");
        assert!(columns[0].auto_increment);
        assert_eq!(primary_key, vec!["id".to_string()]);
        assert_eq!(foreign_keys[0].ref_table, "compounds");
        assert_eq!(comment.as_deref(), Some("Assay runs"));
    }

    #[test]
    fn test_parse_update_binds_in_order() {
        let stmt = parse_statement("UPDATE `t` SET `a` = ?, `b` = ? WHERE `id` = ? AND `c` IS NULL").unwrap();
        let ParsedStatement::Update {
            assignments, filter, ..
        } = stmt
        else {
            panic!("expected UPDATE");
        };
        assert_eq!(assignments[1].1, Operand::Param(1));
        assert!(matches!(filter, Some(Expr::And(..))));
    }

    #[test]
    fn test_parse_create_database_with_charset() {
        let stmt =
            parse_statement("CREATE DATABASE `lab_2024` CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci").unwrap();
        assert_eq!(
            stmt,
            ParsedStatement::CreateDatabase {
                name: "lab_2024".to_string()
            }
        );
    }

    #[test]
    fn test_parse_paged_select_numbers_limit_after_filter() {
        let stmt = parse_statement("SELECT * FROM `t` WHERE `a` LIKE ? LIMIT ?, ?").unwrap();
        let ParsedStatement::SelectPage { offset, limit, .. } = stmt else {
            panic!("expected paged SELECT");
        };
        assert_eq!(offset, Operand::Param(1));
        assert_eq!(limit, Operand::Param(2));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_statement("SELEC 1").is_err());
        assert!(parse_statement("SELECT 1; SELECT 2").is_err());
    }
}
