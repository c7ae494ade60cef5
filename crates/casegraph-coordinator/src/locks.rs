//! Per-case and classes-document locks
//!
//! Lock order is always case first, then classes. Guards are owned so they
//! can move into the blocking task that finishes (or rolls back) an
//! operation after the caller has gone away.
//!
//! These locks coordinate tasks inside one process. Other processes are
//! kept out by the document writer lock (see `StoreHandles::lock_writers`).

use crate::retry::Backoff;
use crate::{CoordinatorConfig, CoordinatorError};
use casegraph_domain::CaseId;
use casegraph_store::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type CaseMutexes = Arc<std::sync::Mutex<HashMap<CaseId, Arc<Mutex<()>>>>>;

/// Drop a case's mutex once no guard or waiter refers to it
fn prune_case(cases: &CaseMutexes, case_id: CaseId) {
    let Ok(mut cases) = cases.lock() else {
        return;
    };
    if cases
        .get(&case_id)
        .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
    {
        cases.remove(&case_id);
    }
}

/// Exclusive hold on one case's staging rows and individuals document
pub struct CaseGuard {
    case_id: CaseId,
    guard: Option<OwnedMutexGuard<()>>,
    cases: CaseMutexes,
}

impl CaseGuard {
    /// The locked case
    pub fn case_id(&self) -> CaseId {
        self.case_id
    }
}

impl Drop for CaseGuard {
    fn drop(&mut self) {
        // Release first so the guard's own reference is gone when pruning
        self.guard.take();
        prune_case(&self.cases, self.case_id);
    }
}

/// Exclusive hold on the shared classes document
pub struct ClassesGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of the coordination points shared by all services
pub struct LockRegistry {
    cases: CaseMutexes,
    classes: Arc<Mutex<()>>,
    config: CoordinatorConfig,
}

impl LockRegistry {
    /// Create a registry with the given wait bounds
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            cases: Arc::new(std::sync::Mutex::new(HashMap::new())),
            classes: Arc::new(Mutex::new(())),
            config,
        }
    }

    /// Lock a case, waiting at most `max_attempts` times `lock_timeout`
    pub async fn lock_case(&self, case_id: CaseId) -> Result<CaseGuard, CoordinatorError> {
        let mutex = self.case_mutex(case_id)?;
        match self.acquire(mutex, &format!("case {}", case_id)).await {
            Ok(guard) => Ok(CaseGuard {
                case_id,
                guard: Some(guard),
                cases: Arc::clone(&self.cases),
            }),
            Err(e) => {
                prune_case(&self.cases, case_id);
                Err(e)
            }
        }
    }

    /// Wait bounds shared by every lock and blocking retry
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Cases that currently have a mutex (held or awaited)
    pub fn tracked_cases(&self) -> usize {
        self.cases.lock().map(|cases| cases.len()).unwrap_or(0)
    }

    /// Lock the classes document
    pub async fn lock_classes(&self) -> Result<ClassesGuard, CoordinatorError> {
        let guard = self.acquire(self.classes.clone(), "classes").await?;
        Ok(ClassesGuard { _guard: guard })
    }

    fn case_mutex(&self, case_id: CaseId) -> Result<Arc<Mutex<()>>, CoordinatorError> {
        let mut cases = self
            .cases
            .lock()
            .map_err(|e| CoordinatorError::Store(StoreError::LockPoisoned(e.to_string())))?;
        Ok(cases.entry(case_id).or_default().clone())
    }

    async fn acquire(&self, mutex: Arc<Mutex<()>>, what: &str) -> Result<OwnedMutexGuard<()>, CoordinatorError> {
        let mut backoff = Backoff::from_config(&self.config);
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(self.config.lock_timeout(), mutex.clone().lock_owned()).await {
                Ok(guard) => return Ok(guard),
                Err(_) if attempt < max_attempts => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        "Timed out waiting for {} lock (attempt {}/{}); retrying in {:?}",
                        what,
                        attempt,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {}
            }
        }

        Err(CoordinatorError::ConcurrencyConflict(format!(
            "{} lock still held after {} attempts",
            what, max_attempts
        )))
    }
}
