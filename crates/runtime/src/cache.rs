//! Result cache keyed by query fingerprint.
//!
//! Backed by a `moka` future cache. Each entry expires after the TTL configured
//! for its entity; expired entries read as misses and are purged lazily.
//! `invalidate(entity)` drops every entry whose fingerprint names that entity.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tallygate_common::config::CacheSettings;
use tallygate_common::models::RowSet;
use tallygate_error::{ErrorCode, GateError};
use tallygate_sql::{Entity, Fingerprint};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("result of {rows} rows exceeds the per-entry limit of {max}")]
    PayloadTooLarge { rows: usize, max: usize },

    #[error("cache invalidation failed: {0}")]
    Invalidation(String),
}

impl From<CacheError> for GateError {
    fn from(err: CacheError) -> Self {
        GateError::new(ErrorCode::Internal, err.to_string())
    }
}

/// A stored result. Readers share the rows through an `Arc`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub rows: Arc<RowSet>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

struct EntityExpiry;

impl Expiry<Fingerprint, CacheEntry> for EntityExpiry {
    fn expire_after_create(
        &self,
        _key: &Fingerprint,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    // A replacing write starts a fresh TTL.
    fn expire_after_update(
        &self,
        _key: &Fingerprint,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct ResultCache {
    settings: CacheSettings,
    cache: Cache<Fingerprint, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(settings: CacheSettings) -> Self {
        info!(
            target: "cache",
            enabled = settings.enabled,
            max_entries = settings.max_entries,
            max_rows_per_entry = settings.max_rows_per_entry,
            "Initializing result cache"
        );

        let cache = Cache::builder()
            .max_capacity(settings.max_entries)
            .expire_after(EntityExpiry)
            .support_invalidation_closures()
            .build();

        Self {
            settings,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Configured time-to-live for results of `entity`.
    pub fn ttl_for(&self, entity: Entity) -> Duration {
        let ttl = &self.settings.ttl;
        let secs = match entity {
            Entity::Company => ttl.company_secs,
            Entity::Ledger => ttl.ledger_secs,
            Entity::StockItem => ttl.stock_item_secs,
            Entity::Voucher => ttl.voucher_secs,
        };
        Duration::from_secs(secs)
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        if !self.settings.enabled {
            return None;
        }

        match self.cache.get(fingerprint).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    target: "cache",
                    key = %fingerprint.short(),
                    entity = %fingerprint.entity,
                    rows = entry.rows.len(),
                    "Cache hit"
                );
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(target: "cache", key = %fingerprint.short(), "Cache miss");
                None
            }
        }
    }

    /// Store `rows` under `fingerprint`. A later write for the same key replaces the earlier one.
    pub async fn put(
        &self,
        fingerprint: Fingerprint,
        rows: Arc<RowSet>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if !self.settings.enabled {
            return Ok(());
        }
        if rows.len() > self.settings.max_rows_per_entry {
            return Err(CacheError::PayloadTooLarge {
                rows: rows.len(),
                max: self.settings.max_rows_per_entry,
            });
        }

        debug!(
            target: "cache",
            key = %fingerprint.short(),
            entity = %fingerprint.entity,
            rows = rows.len(),
            ttl_secs = ttl.as_secs(),
            "Cached query result"
        );

        let entry = CacheEntry {
            fingerprint,
            rows,
            created_at: Utc::now(),
            ttl,
        };
        self.cache.insert(fingerprint, entry).await;
        Ok(())
    }

    /// Drop every entry for `entity`.
    pub fn invalidate(&self, entity: Entity) -> Result<(), CacheError> {
        self.cache
            .invalidate_entries_if(move |key, _| key.entity == entity)
            .map_err(|e| CacheError::Invalidation(e.to_string()))?;
        info!(target: "cache", entity = %entity, "Invalidated cached results");
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        CacheStats {
            enabled: self.settings.enabled,
            entries: self.cache.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
