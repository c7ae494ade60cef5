//! Shared store handles injected into every service

use crate::retry::{retry_transient, Backoff};
use crate::{CoordinatorConfig, CoordinatorError};
use casegraph_domain::traits::StagingStore;
use casegraph_store::{DocumentSnapshot, MemoryBackend, PermanentStore, SqliteStagingStore, StoreError, WriterLock};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A staging store the services can share across threads
pub trait StagingHandle: StagingStore<Error = StoreError> + Send + 'static {}

impl<T> StagingHandle for T where T: StagingStore<Error = StoreError> + Send + 'static {}

/// The staging workspace and permanent store, opened once per process
pub struct StoreHandles<S = SqliteStagingStore> {
    staging: Arc<Mutex<S>>,
    permanent: Arc<PermanentStore>,
}

impl<S> Clone for StoreHandles<S> {
    fn clone(&self) -> Self {
        Self {
            staging: Arc::clone(&self.staging),
            permanent: Arc::clone(&self.permanent),
        }
    }
}

impl<S: StagingHandle> StoreHandles<S> {
    /// Wrap already-open stores
    pub fn new(staging: S, permanent: PermanentStore) -> Self {
        Self {
            staging: Arc::new(Mutex::new(staging)),
            permanent: Arc::new(permanent),
        }
    }

    /// The permanent store
    pub fn permanent(&self) -> &Arc<PermanentStore> {
        &self.permanent
    }

    /// Run a closure against the staging store
    pub fn with_staging<T>(&self, f: impl FnOnce(&mut S) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut staging = self
            .staging
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&mut staging)
    }

    /// Take the writer lock shared with every other process on the same data
    ///
    /// Waits at most `lock_timeout`, sleeping the current thread between
    /// attempts, so call it from blocking code only.
    pub fn lock_writers(&self, config: &CoordinatorConfig) -> Result<WriterLock, CoordinatorError> {
        let deadline = Instant::now() + config.lock_timeout();
        let mut backoff = Backoff::from_config(config);

        loop {
            if let Some(lock) = retry_transient(config, "take writer lock", || self.permanent.try_lock_writers())? {
                return Ok(lock);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CoordinatorError::ConcurrencyConflict(format!(
                    "writer lock still held by another process after {:?}",
                    config.lock_timeout()
                )));
            }

            let delay = backoff
                .next_delay()
                .max(Duration::from_millis(1))
                .min(deadline - now);
            tracing::debug!("Writer lock busy; retrying in {:?}", delay);
            std::thread::sleep(delay);
        }
    }

    /// Remove the versions an aborted operation wrote
    ///
    /// Only versions recorded in `snapshot` are removed; versions published
    /// by anyone else survive.
    ///
    /// Returns the error to surface: `original` if the restore worked,
    /// `RollbackFailed` otherwise.
    pub fn rollback(
        &self,
        config: &CoordinatorConfig,
        snapshot: &DocumentSnapshot,
        original: CoordinatorError,
    ) -> CoordinatorError {
        tracing::warn!("Rolling back after error: {}", original);

        match retry_transient(config, "restore snapshot", || self.permanent.restore(snapshot)) {
            Ok(removed) => {
                tracing::warn!("Rollback removed {} document versions", removed);
                original
            }
            Err(e) => {
                tracing::error!("Rollback failed: {} (original error: {})", e, original);
                CoordinatorError::RollbackFailed {
                    original: original.to_string(),
                    rollback: e.to_string(),
                }
            }
        }
    }
}

impl StoreHandles<SqliteStagingStore> {
    /// Open `<data_dir>/staging.db` and `<data_dir>/documents`
    pub fn open<P: AsRef<Path>>(data_dir: P, config: &CoordinatorConfig) -> Result<Self, CoordinatorError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir).map_err(StoreError::from)?;

        let staging =
            SqliteStagingStore::with_busy_timeout(data_dir.join("staging.db"), config.sqlite_busy_timeout())?;
        let permanent = PermanentStore::open(data_dir.join("documents"))?;

        tracing::debug!("Opened stores under {}", data_dir.display());
        Ok(Self::new(staging, permanent))
    }

    /// In-memory stores, returning the document backend for failure injection
    pub fn in_memory() -> Result<(Self, Arc<MemoryBackend>), CoordinatorError> {
        let staging = SqliteStagingStore::new(":memory:")?;
        let (permanent, backend) = PermanentStore::in_memory();
        Ok((Self::new(staging, permanent), backend))
    }
}
