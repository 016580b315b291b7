// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Metadata types for database schema information
//!
//! This module defines the types used to represent schema metadata read from
//! `information_schema`: tables, columns and their declared types.
//!
//! Columns keep both a parsed [`DataType`] (used for classification, e.g. deciding
//! whether a column is numeric) and the raw `COLUMN_TYPE` text reported by the
//! server (used where exact type comparison matters, e.g. foreign key validation).

use serde::{Deserialize, Serialize};

/// MySQL data types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DataType {
    // Integer types
    TinyInt,
    SmallInt,
    MediumInt,
    Integer,
    BigInt,

    // Fixed and floating point types
    Decimal(Option<u32>, Option<u32>),
    Float,
    Double,
    Bit,

    // String types
    Varchar(Option<usize>),
    Char(Option<usize>),
    Text,

    // Binary types
    Binary(Option<usize>),
    VarBinary(Option<usize>),
    Blob,

    // Date/Time types
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,

    // Boolean (MySQL alias for tinyint(1))
    Boolean,

    // JSON
    Json,

    // ENUM('a', 'b', ...)
    Enum(Vec<String>),

    // Unknown/Other (with original type name)
    Other(String),
}

impl DataType {
    /// Parse a MySQL type string (`DATA_TYPE` or `COLUMN_TYPE`, e.g. "varchar(255)",
    /// "int(11) unsigned", "decimal(10,2)") into a `DataType`.
    pub fn parse_mysql(mysql_type: &str) -> DataType {
        let type_lower = mysql_type.trim().to_lowercase();

        let type_name: String = type_lower
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();

        match type_name.as_str() {
            "tinyint" if extract_length(&type_lower) == Some(1) => DataType::Boolean,
            "tinyint" => DataType::TinyInt,
            "smallint" => DataType::SmallInt,
            "mediumint" => DataType::MediumInt,
            "int" | "integer" => DataType::Integer,
            "bigint" => DataType::BigInt,

            "decimal" | "numeric" | "dec" | "fixed" => {
                let (precision, scale) = extract_precision(&type_lower);
                DataType::Decimal(precision, scale)
            }
            "float" => DataType::Float,
            "double" | "real" => DataType::Double,
            "bit" => DataType::Bit,

            "varchar" => DataType::Varchar(extract_length(&type_lower)),
            "char" => DataType::Char(extract_length(&type_lower)),
            "text" | "tinytext" | "mediumtext" | "longtext" => DataType::Text,

            "binary" => DataType::Binary(extract_length(&type_lower)),
            "varbinary" => DataType::VarBinary(extract_length(&type_lower)),
            "blob" | "tinyblob" | "mediumblob" | "longblob" => DataType::Blob,

            "date" => DataType::Date,
            "time" => DataType::Time,
            "datetime" => DataType::DateTime,
            "timestamp" => DataType::Timestamp,
            "year" => DataType::Year,

            "bool" | "boolean" => DataType::Boolean,
            "json" => DataType::Json,
            "enum" => DataType::Enum(extract_enum_values(mysql_type)),

            _ => DataType::Other(mysql_type.to_string()),
        }
    }

    /// Whether values of this type are compared numerically.
    ///
    /// Numeric columns get an exact-equality branch in value-search predicates.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::MediumInt
                | DataType::Integer
                | DataType::BigInt
                | DataType::Decimal(_, _)
                | DataType::Float
                | DataType::Double
                | DataType::Bit
                | DataType::Boolean
        )
    }

    /// Whether this is one of the integer family types
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::MediumInt
                | DataType::Integer
                | DataType::BigInt
                | DataType::Boolean
        )
    }

    /// Whether default values of this type are written as quoted string literals
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            DataType::Varchar(_)
                | DataType::Char(_)
                | DataType::Text
                | DataType::Json
                | DataType::Enum(_)
        )
    }

    /// Whether this is a date or time type
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::Time | DataType::DateTime | DataType::Timestamp | DataType::Year
        )
    }

    /// Render the type the way `information_schema.COLUMNS.COLUMN_TYPE` reports it
    pub fn mysql_name(&self) -> String {
        fn sized(name: &str, len: &Option<usize>) -> String {
            match len {
                Some(len) => format!("{}({})", name, len),
                None => name.to_string(),
            }
        }

        match self {
            DataType::TinyInt => "tinyint".to_string(),
            DataType::SmallInt => "smallint".to_string(),
            DataType::MediumInt => "mediumint".to_string(),
            DataType::Integer => "int".to_string(),
            DataType::BigInt => "bigint".to_string(),
            DataType::Decimal(precision, scale) => format!(
                "decimal({},{})",
                precision.unwrap_or(10),
                scale.unwrap_or(0)
            ),
            DataType::Float => "float".to_string(),
            DataType::Double => "double".to_string(),
            DataType::Bit => "bit(1)".to_string(),
            DataType::Varchar(len) => sized("varchar", len),
            DataType::Char(len) => sized("char", &Some(len.unwrap_or(1))),
            DataType::Text => "text".to_string(),
            DataType::Binary(len) => sized("binary", &Some(len.unwrap_or(1))),
            DataType::VarBinary(len) => sized("varbinary", len),
            DataType::Blob => "blob".to_string(),
            DataType::Date => "date".to_string(),
            DataType::Time => "time".to_string(),
            DataType::DateTime => "datetime".to_string(),
            DataType::Timestamp => "timestamp".to_string(),
            DataType::Year => "year".to_string(),
            DataType::Boolean => "tinyint(1)".to_string(),
            DataType::Json => "json".to_string(),
            DataType::Enum(values) => {
                let quoted: Vec<String> = values
                    .iter()
                    .map(|v| format!("'{}'", v.replace('\'', "''")))
                    .collect();
                format!("enum({})", quoted.join(","))
            }
            DataType::Other(name) => name.to_lowercase(),
        }
    }
}

/// Extract length from type string (e.g., "varchar(255)" -> Some(255))
fn extract_length(type_str: &str) -> Option<usize> {
    type_str
        .find('(')
        .and_then(|pos| {
            let end = type_str[pos..].find(')')?;
            type_str[pos + 1..pos + end].trim().parse().ok()
        })
        .and_then(|len: usize| if len == 0 { None } else { Some(len) })
}

/// Extract precision and scale from "decimal(10,2)"
fn extract_precision(type_str: &str) -> (Option<u32>, Option<u32>) {
    let Some(open) = type_str.find('(') else {
        return (None, None);
    };
    let Some(close) = type_str[open..].find(')') else {
        return (None, None);
    };
    let mut parts = type_str[open + 1..open + close].split(',');
    let precision = parts.next().and_then(|p| p.trim().parse().ok());
    let scale = parts.next().and_then(|s| s.trim().parse().ok());
    (precision, scale)
}

/// Extract the member list of "enum('a','b')"
fn extract_enum_values(type_str: &str) -> Vec<String> {
    let (Some(open), Some(close)) = (type_str.find('('), type_str.rfind(')')) else {
        return Vec::new();
    };
    if close <= open {
        return Vec::new();
    }
    type_str[open + 1..close]
        .split(',')
        .map(|v| v.trim().trim_matches('\'').replace("''", "'"))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Table type classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    Table,
    View,
    System,
    Other(String),
}

/// Reference to a table (for foreign keys)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableReference {
    pub table: String,
    pub column: String,
}

/// Metadata for a database column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name
    pub name: String,
    /// Parsed data type
    pub data_type: DataType,
    /// Full type text as reported by the server (e.g. "int(11) unsigned")
    pub column_type: String,
    /// Whether the column is nullable
    pub nullable: bool,
    /// Default value (as SQL expression string)
    pub default_value: Option<String>,
    /// Column comment/description
    pub comment: Option<String>,
    /// Whether this is a primary key column
    pub is_primary_key: bool,
    /// Whether the column is AUTO_INCREMENT
    pub is_auto_increment: bool,
    /// Whether this is a foreign key column
    pub is_foreign_key: bool,
    /// Referenced table (if foreign key)
    pub references: Option<TableReference>,
}

impl ColumnMetadata {
    /// Create a new column metadata with builder pattern
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let column_type = data_type.mysql_name();
        Self {
            name: name.into(),
            data_type,
            column_type,
            nullable: true,
            default_value: None,
            comment: None,
            is_primary_key: false,
            is_auto_increment: false,
            is_foreign_key: false,
            references: None,
        }
    }

    /// Builder method: override the raw column type text
    pub fn with_column_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    /// Builder method: set nullable
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Builder method: set default value
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Builder method: set comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builder method: mark as primary key (primary keys are never nullable)
    pub fn with_primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    /// Builder method: mark as AUTO_INCREMENT
    pub fn with_auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    /// Builder method: set foreign key reference
    pub fn with_foreign_key(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.is_foreign_key = true;
        self.references = Some(TableReference {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    /// Whether an insert must supply a value for this column
    pub fn is_required(&self) -> bool {
        !self.nullable && self.default_value.is_none() && !self.is_auto_increment
    }
}

/// Metadata for a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name
    pub name: String,
    /// Schema/database name
    pub schema: String,
    /// Column definitions, in ordinal order
    pub columns: Vec<ColumnMetadata>,
    /// Row count estimate from `information_schema.TABLES.TABLE_ROWS`
    pub row_count_estimate: Option<u64>,
    /// Table comment/description
    pub comment: Option<String>,
    /// Table type (BASE TABLE, VIEW, ...)
    pub table_type: TableType,
}

impl TableMetadata {
    /// Create new table metadata with builder pattern
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            columns: Vec::new(),
            row_count_estimate: None,
            comment: None,
            table_type: TableType::Table,
        }
    }

    /// Builder method: add columns
    pub fn with_columns(mut self, columns: Vec<ColumnMetadata>) -> Self {
        self.columns = columns;
        self
    }

    /// Builder method: set row count estimate
    pub fn with_row_count(mut self, count: u64) -> Self {
        self.row_count_estimate = Some(count);
        self
    }

    /// Builder method: set comment
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Builder method: set table type
    pub fn with_type(mut self, table_type: TableType) -> Self {
        self.table_type = table_type;
        self
    }

    /// Get column by name (case-insensitive, as MySQL column names are)
    pub fn get_column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Get primary key columns
    pub fn primary_keys(&self) -> Vec<&ColumnMetadata> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }
}

/// A column located by a name search, together with its owning table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMatch {
    /// Owning table name
    pub table: String,
    /// Owning table comment
    pub table_comment: Option<String>,
    /// The matching column
    pub column: ColumnMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mysql_varchar() {
        assert_eq!(DataType::parse_mysql("varchar(255)"), DataType::Varchar(Some(255)));
    }

    #[test]
    fn test_parse_mysql_int_with_display_width() {
        assert_eq!(DataType::parse_mysql("int(11) unsigned"), DataType::Integer);
        assert_eq!(DataType::parse_mysql("BIGINT"), DataType::BigInt);
    }

    #[test]
    fn test_parse_mysql_tinyint_one_is_boolean() {
        assert_eq!(DataType::parse_mysql("tinyint(1)"), DataType::Boolean);
        assert_eq!(DataType::parse_mysql("tinyint(4)"), DataType::TinyInt);
    }

    #[test]
    fn test_parse_mysql_decimal_precision() {
        assert_eq!(
            DataType::parse_mysql("decimal(10,2)"),
            DataType::Decimal(Some(10), Some(2))
        );
        assert_eq!(DataType::parse_mysql("decimal"), DataType::Decimal(None, None));
    }

    #[test]
    fn test_parse_mysql_enum_values() {
        assert_eq!(
            DataType::parse_mysql("enum('active','it''s')"),
            DataType::Enum(vec!["active".to_string(), "it's".to_string()])
        );
    }

    #[test]
    fn test_parse_mysql_unknown_keeps_name() {
        assert_eq!(
            DataType::parse_mysql("geometry"),
            DataType::Other("geometry".to_string())
        );
    }

    #[test]
    fn test_point_is_not_numeric() {
        // "point" contains "int" but is a spatial type
        assert!(!DataType::parse_mysql("point").is_numeric());
    }

    #[test]
    fn test_numeric_classification() {
        for ty in ["int", "bigint(20)", "decimal(5,2)", "double", "float", "smallint"] {
            assert!(DataType::parse_mysql(ty).is_numeric(), "{ty} should be numeric");
        }
        for ty in ["varchar(10)", "text", "date", "json", "blob"] {
            assert!(!DataType::parse_mysql(ty).is_numeric(), "{ty} should be text");
        }
    }

    #[test]
    fn test_mysql_name_roundtrips_common_types() {
        assert_eq!(DataType::Varchar(Some(64)).mysql_name(), "varchar(64)");
        assert_eq!(DataType::Decimal(Some(10), Some(2)).mysql_name(), "decimal(10,2)");
        assert_eq!(DataType::Integer.mysql_name(), "int");
    }

    #[test]
    fn test_column_required() {
        let id = ColumnMetadata::new("id", DataType::Integer)
            .with_primary_key()
            .with_auto_increment();
        let name = ColumnMetadata::new("name", DataType::Varchar(Some(64))).with_nullable(false);
        let note = ColumnMetadata::new("note", DataType::Text);
        assert!(!id.is_required());
        assert!(name.is_required());
        assert!(!note.is_required());
    }

    #[test]
    fn test_table_get_column_case_insensitive() {
        let table = TableMetadata::new("compounds", "lab").with_columns(vec![
            ColumnMetadata::new("ID", DataType::Integer).with_primary_key(),
        ]);
        assert!(table.get_column("id").is_some());
        assert_eq!(table.primary_keys().len(), 1);
    }
}
