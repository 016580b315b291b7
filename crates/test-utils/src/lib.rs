// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Testing utilities for sqlscout
//!
//! This crate provides common testing components including:
//! - An in-memory database implementing the catalog and executor traits
//! - A parser and evaluator for the statements the engine emits
//! - Test fixtures and sample data

pub mod fixtures;
pub mod mock_database;
pub mod sql_eval;

// Re-exports for convenience
pub use mock_database::MockDatabase;
pub use sql_eval::{ParsedStatement, parse_statement};
