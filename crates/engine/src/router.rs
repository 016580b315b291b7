// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Datasource router
//!
//! Resolves a logical datasource name to a connection handle and a schema scope.
//!
//! Two kinds of datasource exist:
//! - **Configured**: has its own pool; statements use unqualified table names
//!   and catalog queries run against `DATABASE()`.
//! - **UserCreated**: any other schema on the default server. It is reached
//!   through the default pool and every table reference is schema-qualified.
//!
//! Callers receive a [`LogicalDataSource`] and never branch on the kind again.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ident::validate_identifier;
use dashmap::DashMap;
use serde::Serialize;
use sqlscout_catalog::{Catalog, SchemaScope, SqlExecutor};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How a datasource was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    Configured,
    UserCreated,
}

/// Executor and catalog for one physical connection
#[derive(Clone)]
pub struct DataSourceHandle {
    executor: Arc<dyn SqlExecutor>,
    catalog: Arc<dyn Catalog>,
}

impl DataSourceHandle {
    pub fn new(executor: Arc<dyn SqlExecutor>, catalog: Arc<dyn Catalog>) -> Self {
        Self { executor, catalog }
    }

    /// Build a handle from one backend that implements both traits
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: SqlExecutor + Catalog + 'static,
    {
        Self {
            executor: backend.clone(),
            catalog: backend,
        }
    }

    pub fn executor(&self) -> &dyn SqlExecutor {
        self.executor.as_ref()
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }
}

impl fmt::Debug for DataSourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceHandle").finish_non_exhaustive()
    }
}

/// A resolved datasource
#[derive(Debug, Clone)]
pub struct LogicalDataSource {
    name: String,
    kind: DataSourceKind,
    scope: SchemaScope,
    handle: DataSourceHandle,
}

impl LogicalDataSource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DataSourceKind {
        self.kind
    }

    pub fn is_user_created(&self) -> bool {
        self.kind == DataSourceKind::UserCreated
    }

    /// Scope for catalog queries
    pub fn scope(&self) -> &SchemaScope {
        &self.scope
    }

    /// Quoted table reference, schema-qualified for user-created databases
    pub fn qualify(&self, table: &str) -> String {
        self.scope.qualify(table)
    }

    pub fn executor(&self) -> &dyn SqlExecutor {
        self.handle.executor()
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.handle.catalog()
    }
}

/// Overview entry returned by [`DataSourceRouter::datasources`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSourceInfo {
    pub name: String,
    pub kind: DataSourceKind,
    pub is_default: bool,
}

/// Maps logical names to connections
pub struct DataSourceRouter {
    default_name: String,
    configured: DashMap<String, DataSourceHandle>,
    system_schemas: Vec<String>,
}

impl DataSourceRouter {
    /// Create a router whose default datasource is `default_name`
    pub fn new(
        default_name: impl Into<String>,
        default_handle: DataSourceHandle,
        system_schemas: Vec<String>,
    ) -> Self {
        let default_name = default_name.into();
        let configured = DashMap::new();
        configured.insert(default_name.clone(), default_handle);
        Self {
            default_name,
            configured,
            system_schemas,
        }
    }

    /// Open a lazy MySQL pool for every datasource in the configuration
    #[cfg(feature = "mysql")]
    pub fn connect(config: &EngineConfig) -> EngineResult<Self> {
        use sqlscout_catalog::{LiveMySQLCatalog, PoolOptions};

        config.validate()?;

        let open = |ds: &crate::config::DataSourceConfig| -> EngineResult<DataSourceHandle> {
            let pool = config.pool_for(ds);
            let options = PoolOptions {
                max_connections: pool.max_connections,
                min_connections: pool.min_connections,
                acquire_timeout_secs: pool.connection_timeout_secs,
                idle_timeout_secs: pool.idle_timeout_secs,
                max_lifetime_secs: pool.max_lifetime_secs,
            };
            let backend = LiveMySQLCatalog::with_options(&ds.url, options)?;
            Ok(DataSourceHandle::from_backend(Arc::new(backend)))
        };

        let router = Self::new(
            config.default_datasource.name.clone(),
            open(&config.default_datasource)?,
            config.system_schemas.clone(),
        );
        for ds in &config.datasources {
            router.register(&ds.name, open(ds)?)?;
        }

        info!(
            default = %router.default_name,
            configured = router.configured.len(),
            "Datasource router ready"
        );
        Ok(router)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Whether `name` is one of the protected system schemas
    pub fn is_system_schema(&self, name: &str) -> bool {
        self.system_schemas
            .iter()
            .any(|s| s.eq_ignore_ascii_case(name))
    }

    pub fn system_schemas(&self) -> &[String] {
        &self.system_schemas
    }

    /// Register an additional configured datasource
    pub fn register(&self, name: &str, handle: DataSourceHandle) -> EngineResult<()> {
        validate_identifier(name)?;
        if self.is_system_schema(name) {
            return Err(EngineError::ProtectedDataSource(format!(
                "'{}' is a system schema",
                name
            )));
        }
        match self.configured.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(EngineError::DataSourceAlreadyExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handle);
                info!(datasource = %name, "Registered datasource");
                Ok(())
            }
        }
    }

    /// Remove a configured datasource; the default one cannot be removed
    pub fn deregister(&self, name: &str) -> EngineResult<()> {
        if name == self.default_name {
            return Err(EngineError::ProtectedDataSource(format!(
                "'{}' is the default datasource",
                name
            )));
        }
        match self.configured.remove(name) {
            Some(_) => {
                info!(datasource = %name, "Deregistered datasource");
                Ok(())
            }
            None => Err(EngineError::UnknownDataSource(name.to_string())),
        }
    }

    /// Resolve a logical name
    pub fn resolve(&self, name: &str) -> EngineResult<LogicalDataSource> {
        let name = name.trim();
        let name = if name.is_empty() {
            self.default_name.as_str()
        } else {
            name
        };
        validate_identifier(name).map_err(|_| EngineError::UnknownDataSource(name.to_string()))?;

        if let Some(handle) = self.configured.get(name) {
            return Ok(LogicalDataSource {
                name: name.to_string(),
                kind: DataSourceKind::Configured,
                scope: SchemaScope::Current,
                handle: handle.clone(),
            });
        }

        if self.is_system_schema(name) {
            warn!(datasource = %name, "Refusing to resolve system schema");
            return Err(EngineError::UnknownDataSource(name.to_string()));
        }

        let handle = self
            .configured
            .get(&self.default_name)
            .map(|h| h.clone())
            .ok_or_else(|| EngineError::UnknownDataSource(self.default_name.clone()))?;
        debug!(datasource = %name, via = %self.default_name, "Resolved user-created database");

        Ok(LogicalDataSource {
            name: name.to_string(),
            kind: DataSourceKind::UserCreated,
            scope: SchemaScope::Named(name.to_string()),
            handle,
        })
    }

    /// Resolve the target of a DDL call: an explicit database wins over the datasource
    pub fn resolve_for_database(
        &self,
        datasource: &str,
        database: Option<&str>,
    ) -> EngineResult<LogicalDataSource> {
        match database.map(str::trim).filter(|d| !d.is_empty()) {
            Some(database) => self.resolve(database),
            None => self.resolve(datasource),
        }
    }

    /// Whether `name` resolves to a user-created database
    pub fn is_user_created(&self, name: &str) -> bool {
        self.resolve(name)
            .map(|ds| ds.is_user_created())
            .unwrap_or(false)
    }

    /// Configured datasources, default first, then by name
    pub fn datasources(&self) -> Vec<DataSourceInfo> {
        let mut list: Vec<DataSourceInfo> = self
            .configured
            .iter()
            .map(|entry| DataSourceInfo {
                name: entry.key().clone(),
                kind: DataSourceKind::Configured,
                is_default: *entry.key() == self.default_name,
            })
            .collect();
        list.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.name.cmp(&b.name)));
        list
    }

    /// Run `SELECT 1` against a datasource
    pub async fn test_connection(&self, name: &str) -> EngineResult<bool> {
        let ds = self.resolve(name)?;
        match ds.executor().ping().await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(datasource = %ds.name(), error = %e, "Connection test failed");
                Ok(false)
            }
        }
    }
}

impl fmt::Debug for DataSourceRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceRouter")
            .field("default_name", &self.default_name)
            .field("configured", &self.configured.len())
            .field("system_schemas", &self.system_schemas)
            .finish()
    }
}
