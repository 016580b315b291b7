// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Test fixtures: a small laboratory database
//!
//! | table       | rows | notes                                        |
//! |-------------|------|----------------------------------------------|
//! | `compounds` | 5    | stale row estimate; "aspirin" appears once   |
//! | `assays`    | 3    | `compound_id` references `compounds.id`      |
//! | `readings`  | 2    | numeric columns only                         |

use crate::mock_database::MockDatabase;
use sqlscout_catalog::{ColumnMetadata, DataType, SqlRow, SqlValue, TableMetadata};

/// Default schema of [`lab_database`]
pub const LAB_SCHEMA: &str = "login";

/// Rows in `compounds`
pub const COMPOUND_ROWS: usize = 5;

/// Row estimate the catalog reports for `compounds`
pub const COMPOUND_ESTIMATE: u64 = 4;

pub fn compounds_table() -> TableMetadata {
    TableMetadata::new("compounds", LAB_SCHEMA)
        .with_columns(vec![
            ColumnMetadata::new("id", DataType::Integer)
                .with_primary_key()
                .with_auto_increment(),
            ColumnMetadata::new("name", DataType::Varchar(Some(64))).with_nullable(false),
            ColumnMetadata::new("formula", DataType::Varchar(Some(32))),
            ColumnMetadata::new("weight", DataType::Decimal(Some(10), Some(2))),
            ColumnMetadata::new("cas_number", DataType::Varchar(Some(16))),
            ColumnMetadata::new("notes", DataType::Text),
        ])
        .with_row_count(COMPOUND_ESTIMATE)
        .with_comment("Reference compounds")
}

pub fn assays_table() -> TableMetadata {
    TableMetadata::new("assays", LAB_SCHEMA)
        .with_columns(vec![
            ColumnMetadata::new("id", DataType::Integer)
                .with_primary_key()
                .with_auto_increment(),
            ColumnMetadata::new("compound_id", DataType::Integer)
                .with_foreign_key("compounds", "id"),
            ColumnMetadata::new("result", DataType::Double),
            ColumnMetadata::new("assay_date", DataType::Date),
            ColumnMetadata::new("notes", DataType::Varchar(Some(255))),
        ])
        .with_comment("Assay runs")
}

pub fn readings_table() -> TableMetadata {
    TableMetadata::new("readings", LAB_SCHEMA).with_columns(vec![
        ColumnMetadata::new("id", DataType::BigInt).with_primary_key(),
        ColumnMetadata::new("value", DataType::Double),
    ])
}

fn compound(id: i64, name: &str, formula: &str, weight: f64, cas: &str, notes: Option<&str>) -> SqlRow {
    SqlRow::new()
        .with("id", id)
        .with("name", name)
        .with("formula", formula)
        .with("weight", weight)
        .with("cas_number", cas)
        .with("notes", notes)
}

fn assay(id: i64, compound_id: i64, result: f64, date: &str, notes: &str) -> SqlRow {
    SqlRow::new()
        .with("id", id)
        .with("compound_id", compound_id)
        .with("result", result)
        .with("assay_date", date)
        .with("notes", notes)
}

pub fn compound_rows() -> Vec<SqlRow> {
    vec![
        compound(1, "aspirin", "C9H8O4", 180.16, "50-78-2", Some("analgesic")),
        compound(2, "caffeine", "C8H10N4O2", 194.19, "58-08-2", None),
        compound(3, "ibuprofen", "C13H18O2", 206.28, "15687-27-1", Some("NSAID")),
        compound(4, "paracetamol", "C8H9NO2", 151.16, "103-90-2", Some("50% of stock expired")),
        compound(5, "sodium chloride", "NaCl", 58.44, "7647-14-5", None),
    ]
}

pub fn assay_rows() -> Vec<SqlRow> {
    vec![
        assay(1, 1, 0.82, "2024-03-01", "COX inhibition"),
        assay(2, 2, 1.5, "2024-03-02", "adenosine antagonist"),
        assay(3, 1, 0.79, "2024-03-05", "repeat run"),
    ]
}

pub fn reading_rows() -> Vec<SqlRow> {
    vec![
        SqlRow::new().with("id", 1i64).with("value", 36.6),
        SqlRow::new().with("id", 2i64).with("value", SqlValue::Float(37.1)),
    ]
}

/// The lab database with every table seeded
pub fn lab_database() -> MockDatabase {
    MockDatabase::new(LAB_SCHEMA)
        .with_table(compounds_table())
        .with_table(assays_table())
        .with_table(readings_table())
        .with_rows("compounds", compound_rows())
        .with_rows("assays", assay_rows())
        .with_rows("readings", reading_rows())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_database_seeded() {
        let db = lab_database();
        assert_eq!(db.rows("compounds").len(), COMPOUND_ROWS);
        assert_eq!(db.rows("assays").len(), 3);
        let names: Vec<_> = db
            .rows("compounds")
            .iter()
            .filter_map(|r| r.get("name").and_then(SqlValue::as_text))
            .filter(|n| n.contains("aspirin"))
            .collect();
        assert_eq!(names.len(), 1);
    }
}
