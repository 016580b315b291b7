// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Search cache
//!
//! Remembers the predicate and exact match count computed for a
//! `(datasource, table, value, mode)` key so repeated searches and page
//! requests skip the `COUNT(*)`.
//!
//! ## Validity
//!
//! An entry is served only while it is younger than the TTL and was accessed
//! within the idle timeout. A hit refreshes the access time. Stale entries are
//! dropped on lookup, on insert when the cache is full, and by the periodic
//! sweeper started with [`SearchCache::start_sweeper`].
//!
//! ## Invalidation
//!
//! Any write to a table must call [`SearchCache::invalidate_table`] before the
//! write is reported, otherwise a cached count could outlive the data it
//! describes. Table names are compared case-insensitively on invalidation.
//!
//! A reader that computes a count takes a [`Generation`] before querying and
//! stores the result with [`SearchCache::put_if_current`]. Every invalidation
//! advances the generation of what it covers, so a count read before a
//! concurrent write is never kept.

use crate::config::CacheConfig;
use dashmap::DashMap;
use serde::Serialize;
use sqlscout_catalog::SqlValue;
use sqlscout_ir::SearchMode;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub datasource: String,
    pub table: String,
    pub value: String,
    pub mode: SearchMode,
}

impl CacheKey {
    pub fn new(
        datasource: impl Into<String>,
        table: impl Into<String>,
        value: impl Into<String>,
        mode: SearchMode,
    ) -> Self {
        Self {
            datasource: datasource.into(),
            table: table.into(),
            value: value.into(),
            mode,
        }
    }
}

/// Cached search result
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSearch {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
    pub match_count: u64,
}

/// Invalidation generation observed for one `(datasource, table)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

#[derive(Debug)]
struct CacheEntry {
    value: CachedSearch,
    generation: Generation,
    created_at: Instant,
    last_accessed: Instant,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant, config: &CacheConfig) -> bool {
        now.duration_since(self.created_at) < config.ttl()
            && now.duration_since(self.last_accessed) < config.idle_timeout()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_minutes: u64,
    pub idle_timeout_minutes: u64,
    pub expired_count: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent search cache
#[derive(Debug)]
pub struct SearchCache {
    entries: DashMap<CacheKey, CacheEntry>,
    // Last invalidation stamp per (datasource, lowercased table), per datasource, and global.
    table_generations: DashMap<(String, String), u64>,
    datasource_generations: DashMap<String, u64>,
    global_generation: AtomicU64,
    clock: AtomicU64,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SearchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            table_generations: DashMap::new(),
            datasource_generations: DashMap::new(),
            global_generation: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a valid entry, refreshing its access time
    pub fn get(&self, key: &CacheKey) -> Option<CachedSearch> {
        let now = Instant::now();
        let stale = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if entry.is_valid(now, &self.config) {
                    entry.last_accessed = now;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };

        if stale {
            self.entries
                .remove_if(key, |_, entry| !entry.is_valid(now, &self.config));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Current invalidation generation covering `(datasource, table)`
    pub fn generation(&self, datasource: &str, table: &str) -> Generation {
        let table_gen = self
            .table_generations
            .get(&(datasource.to_string(), table.to_ascii_lowercase()))
            .map_or(0, |g| *g);
        let datasource_gen = self.datasource_generations.get(datasource).map_or(0, |g| *g);
        let global = self.global_generation.load(Ordering::Acquire);
        Generation(table_gen.max(datasource_gen).max(global))
    }

    fn next_stamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Insert or replace an entry
    pub fn put(&self, key: CacheKey, value: CachedSearch) {
        let generation = self.generation(&key.datasource, &key.table);
        self.insert(key, value, generation);
    }

    /// Insert an entry computed after `seen` was taken, unless an
    /// invalidation covering its table happened since
    ///
    /// Returns whether the entry was kept.
    pub fn put_if_current(&self, key: CacheKey, value: CachedSearch, seen: Generation) -> bool {
        if self.generation(&key.datasource, &key.table) != seen {
            debug!(datasource = %key.datasource, table = %key.table, "Discarded count read before a write");
            return false;
        }
        self.insert(key.clone(), value, seen);

        // An invalidation may have advanced between the check and the insert.
        if self.generation(&key.datasource, &key.table) != seen {
            self.entries.remove_if(&key, |_, entry| entry.generation == seen);
            debug!(datasource = %key.datasource, table = %key.table, "Discarded count read before a write");
            return false;
        }
        true
    }

    fn insert(&self, key: CacheKey, value: CachedSearch, generation: Generation) {
        if self.entries.len() >= self.config.capacity {
            self.purge_expired();
            if self.entries.len() >= self.config.capacity {
                self.evict_oldest();
            }
        }

        let now = Instant::now();
        self.entries.insert(
            key,
            CacheEntry {
                value,
                generation,
                created_at: now,
                last_accessed: now,
            },
        );
    }

    /// Drop the oldest quarter of the entries by creation time
    fn evict_oldest(&self) {
        let mut by_age: Vec<(CacheKey, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().created_at))
            .collect();
        by_age.sort_by_key(|(_, created)| *created);

        let count = (by_age.len() / 4).max(1);
        for (key, _) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        debug!(evicted = count, "Evicted oldest search cache entries");
    }

    /// Remove every entry for `(datasource, table)`, returning how many went
    pub fn invalidate_table(&self, datasource: &str, table: &str) -> usize {
        let stamp = self.next_stamp();
        self.table_generations
            .insert((datasource.to_string(), table.to_ascii_lowercase()), stamp);

        let mut removed = 0;
        self.entries.retain(|key, _| {
            let hit = key.datasource == datasource && key.table.eq_ignore_ascii_case(table);
            if hit {
                removed += 1;
            }
            !hit
        });
        if removed > 0 {
            debug!(datasource, table, removed, "Invalidated search cache");
        }
        removed
    }

    /// Remove every entry of a datasource
    pub fn invalidate_datasource(&self, datasource: &str) -> usize {
        let stamp = self.next_stamp();
        self.datasource_generations.insert(datasource.to_string(), stamp);
        let before = self.entries.len();
        self.entries.retain(|key, _| key.datasource != datasource);
        before.saturating_sub(self.entries.len())
    }

    pub fn invalidate_all(&self) {
        let stamp = self.next_stamp();
        self.global_generation.fetch_max(stamp, Ordering::AcqRel);
        let count = self.entries.len();
        self.entries.clear();
        info!(removed = count, "Cleared search cache");
    }

    /// Remove every stale entry
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.is_valid(now, &self.config));
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let expired_count = self
            .entries
            .iter()
            .filter(|e| !e.value().is_valid(now, &self.config))
            .count();
        CacheStats {
            entries: self.entries.len(),
            capacity: self.config.capacity,
            ttl_minutes: self.config.ttl_secs / 60,
            idle_timeout_minutes: self.config.idle_timeout_secs / 60,
            expired_count,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Spawn the periodic purge task
    pub fn start_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let cache = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = self.config.sweep_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, remaining = cache.len(), "Swept search cache");
                        }
                    }
                }
            }
            debug!("Search cache sweeper stopped");
        });

        info!(interval_secs = period.as_secs(), "Search cache sweeper started");
        SweeperHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Handle to the sweeper task; dropping it cancels the task
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Cancel the sweeper and wait for it to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
