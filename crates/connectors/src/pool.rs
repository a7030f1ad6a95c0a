//! Bounded pool of source sessions.
//!
//! A semaphore caps checked-out sessions at `max_size`; idle sessions sit in a
//! queue behind a mutex. A checked-out session is wrapped in a
//! [`PooledSession`] that holds the permit. Releasing it as healthy puts the
//! session back on the idle queue. Releasing it as unhealthy, or dropping it
//! without a release, discards the session and frees the slot; a replacement
//! is opened lazily on the next acquire.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tallygate_common::config::{PoolSettings, RetrySettings};
use tallygate_common::models::RowSet;
use tallygate_common::retry::retry_async_if;
use tallygate_sql::CanonicalQuery;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, PoolError};
use crate::sources::{Connector, SourceSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_size: usize,
    pub idle: usize,
    pub in_use: usize,
    pub opened: u64,
    pub discarded: u64,
    pub acquire_timeouts: u64,
}

struct PoolInner {
    connector: Arc<dyn Connector>,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<Box<dyn SourceSession>>>,
    max_size: usize,
    retry: RetrySettings,
    opened: AtomicU64,
    discarded: AtomicU64,
    acquire_timeouts: AtomicU64,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, VecDeque<Box<dyn SourceSession>>> {
        // A poisoned queue only ever holds whole sessions, so it is still usable.
        self.idle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        debug!(target: "pool", source = %self.connector.name(), "Session discarded");
    }
}

/// Shared handle to the pool. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    acquire_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, settings: PoolSettings, retry: RetrySettings) -> Self {
        let max_size = settings.max_size.max(1);
        info!(
            target: "pool",
            source = %connector.name(),
            max_size,
            acquire_timeout_ms = settings.acquire_timeout_ms,
            "Initializing connection pool"
        );
        Self {
            inner: Arc::new(PoolInner {
                connector,
                semaphore: Arc::new(Semaphore::new(max_size)),
                idle: Mutex::new(VecDeque::with_capacity(max_size)),
                max_size,
                retry,
                opened: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
                acquire_timeouts: AtomicU64::new(0),
            }),
            acquire_timeout: Duration::from_millis(settings.acquire_timeout_ms),
        }
    }

    pub fn source_name(&self) -> &str {
        self.inner.connector.name()
    }

    /// Acquire with the configured timeout.
    pub async fn get(&self) -> Result<PooledSession, PoolError> {
        self.acquire(self.acquire_timeout).await
    }

    /// Wait up to `timeout` for a free slot, then hand out an idle session or open a new one.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledSession, PoolError> {
        let started = Instant::now();
        let permit = match tokio::time::timeout(timeout, self.inner.semaphore.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => permit,
            // The semaphore is never closed, so the only failure is the deadline.
            _ => {
                self.inner.acquire_timeouts.fetch_add(1, Ordering::Relaxed);
                let waited_ms = started.elapsed().as_millis() as u64;
                warn!(target: "pool", source = %self.source_name(), waited_ms, "Acquire timed out");
                return Err(PoolError::Timeout { waited_ms });
            }
        };

        let reused = self.inner.idle().pop_front();
        let session = match reused {
            Some(session) => session,
            None => self.open().await?,
        };

        Ok(PooledSession {
            session: Some(session),
            _permit: permit,
            pool: self.inner.clone(),
        })
    }

    /// Open a session, retrying transient failures with backoff.
    async fn open(&self) -> Result<Box<dyn SourceSession>, PoolError> {
        let attempts = AtomicU32::new(0);
        let connector = &self.inner.connector;
        let result = retry_async_if(
            "open session",
            self.inner.retry,
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                connector.connect()
            },
            |e| e.is_transient(),
        )
        .await;

        match result {
            Ok(session) => {
                self.inner.opened.fetch_add(1, Ordering::Relaxed);
                debug!(target: "pool", source = %connector.name(), "Session opened");
                Ok(session)
            }
            Err(source) => Err(PoolError::ConnectFailed {
                attempts: attempts.load(Ordering::Relaxed),
                source,
            }),
        }
    }

    /// Return a session. Unhealthy sessions are discarded.
    pub fn release(&self, session: PooledSession, healthy: bool) {
        session.release(healthy);
    }

    pub fn stats(&self) -> PoolStats {
        let available = self.inner.semaphore.available_permits();
        PoolStats {
            max_size: self.inner.max_size,
            idle: self.inner.idle().len(),
            in_use: self.inner.max_size.saturating_sub(available),
            opened: self.inner.opened.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
            acquire_timeouts: self.inner.acquire_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// A session checked out of the pool.
pub struct PooledSession {
    session: Option<Box<dyn SourceSession>>,
    _permit: OwnedSemaphorePermit,
    pool: Arc<PoolInner>,
}

impl PooledSession {
    pub async fn execute(&mut self, query: &CanonicalQuery) -> Result<RowSet, ExecutionError> {
        match self.session.as_mut() {
            Some(session) => session.execute(query).await,
            None => Err(ExecutionError::ConnectivityLost(
                "session already released".to_string(),
            )),
        }
    }

    pub async fn ping(&mut self) -> Result<(), ExecutionError> {
        match self.session.as_mut() {
            Some(session) => session.ping().await,
            None => Err(ExecutionError::ConnectivityLost(
                "session already released".to_string(),
            )),
        }
    }

    /// Give the session back. The slot is freed when `self` drops at the end of this call.
    pub fn release(mut self, healthy: bool) {
        if let Some(session) = self.session.take() {
            if healthy {
                self.pool.idle().push_back(session);
            } else {
                drop(session);
                self.pool.discard();
            }
        }
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        // Never released: state unknown, so the session is not reused.
        if self.session.take().is_some() {
            self.pool.discard();
        }
    }
}
