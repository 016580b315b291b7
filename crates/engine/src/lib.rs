// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # sqlscout engine
//!
//! Schema browse, value search and bulk-load engine for MySQL servers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │      SearchEngine (facade, Clone)       │
//! └──────────────┬──────────────────────────┘
//!                │ logical datasource name
//!                ↓
//! ┌─────────────────────────────────────────┐
//! │           DataSourceRouter              │
//! │  configured pools / user-created DBs    │
//! └──────────────┬──────────────────────────┘
//!                │ LogicalDataSource
//!     ┌──────────┼───────────┬─────────────┐
//!     ↓          ↓           ↓             ↓
//! ┌────────┐ ┌────────┐ ┌──────────┐ ┌──────────┐
//! │Introsp.│ │  Scan  │ │   DDL    │ │   Bulk   │
//! └────────┘ └───┬────┘ └──────────┘ └────┬─────┘
//!                ↓                        │ invalidates
//!          ┌────────────┐                 │
//!          │SearchCache │←────────────────┘
//!          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration with environment fallback
//! - [`router`]: logical datasource resolution
//! - [`introspect`]: tables, columns, row counts, browsing
//! - [`predicate`]: parameterized search predicates
//! - [`cache`]: TTL and idle-expiring search cache
//! - [`scan`]: cross-table scans, blocking or progressive
//! - [`ddl`]: table and database DDL
//! - [`bulk`]: batched imports and row edits
//! - [`engine`]: the [`SearchEngine`] facade

pub mod bulk;
pub mod cache;
pub mod config;
pub mod ddl;
pub mod engine;
pub mod error;
pub mod ident;
pub mod introspect;
pub mod page;
pub mod predicate;
pub mod router;
pub mod scan;

pub use bulk::{BulkLoader, ImportReport, ImportStrategy, ValidationFinding, ValidationReport};
pub use cache::{CacheKey, CacheStats, CachedSearch, Generation, SearchCache, SweeperHandle};
pub use config::{
    BulkConfig, CacheConfig, ConfigError, ConnectionPoolConfig, DataSourceConfig, DdlConfig,
    EngineConfig, PaginationConfig, ScanConfig,
};
pub use ddl::{ColumnSpec, DdlGenerator, ForeignKeyAction, ForeignKeySpec, ImportTablePlan};
pub use engine::{SearchEngine, SearchOutcome, SearchPage};
pub use error::{EngineError, EngineResult};
pub use introspect::{Introspector, RowCount, TablePage};
pub use page::PageWindow;
pub use router::{
    DataSourceHandle, DataSourceInfo, DataSourceKind, DataSourceRouter, LogicalDataSource,
};
pub use scan::{
    ScanEvent, ScanOutcome, ScanReport, ScanRequest, ScanStream, TableFailure, TableMatch,
};

pub use sqlscout_catalog::{SqlRow, SqlValue};
pub use sqlscout_ir::{SearchMode, is_numeric_literal};
