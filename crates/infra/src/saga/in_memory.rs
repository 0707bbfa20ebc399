use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, RwLock};

use tracing::{debug, warn};

use sagabus_core::{CorrelationId, SagaOperationError, SagaResult};
use sagabus_events::SagaStateMachine;

use crate::config::{ExistingSagaPolicy, RepositoryConfig};

use super::{SagaCursor, SagaRef, SagaRepository};

/// In-memory saga repository.
///
/// Intended for tests/dev. Instances are stored as shared handles, so
/// transitions applied through a dispatch are persisted in place.
///
/// Advancing a cursor **claims** its correlation id until the cursor is closed
/// or dropped. A second cursor advancing while the claim is held waits for the
/// release, up to `RepositoryConfig::claim_timeout`, and only then fails with
/// `SagaOperationError::Concurrency`. Combined with the existence check under
/// the store's write lock this gives at most one initiation per id.
#[derive(Debug)]
pub struct InMemorySagaRepository<S> {
    sagas: RwLock<HashMap<CorrelationId, SagaRef<S>>>,
    claims: Mutex<HashSet<CorrelationId>>,
    released: Condvar,
    config: RepositoryConfig,
}

impl<S> Default for InMemorySagaRepository<S> {
    fn default() -> Self {
        Self {
            sagas: RwLock::new(HashMap::new()),
            claims: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            config: RepositoryConfig::default(),
        }
    }
}

impl<S> InMemorySagaRepository<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    pub fn get(&self, correlation_id: CorrelationId) -> Option<SagaRef<S>> {
        self.sagas.read().ok()?.get(&correlation_id).cloned()
    }

    pub fn contains(&self, correlation_id: CorrelationId) -> bool {
        self.get(correlation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sagas.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiers of every stored saga, in ascending (creation-time) order.
    pub fn correlation_ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<_> = self
            .sagas
            .read()
            .map(|s| s.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Whether an open cursor currently holds `correlation_id`.
    pub fn is_claimed(&self, correlation_id: CorrelationId) -> bool {
        self.claims
            .lock()
            .map(|c| c.contains(&correlation_id))
            .unwrap_or(false)
    }

    /// Drop the saga stored under `correlation_id` and hand it back.
    pub fn remove(&self, correlation_id: CorrelationId) -> SagaResult<SagaRef<S>> {
        let mut sagas = self
            .sagas
            .write()
            .map_err(|_| SagaOperationError::unavailable("saga store lock poisoned"))?;
        sagas
            .remove(&correlation_id)
            .ok_or(SagaOperationError::NotFound(correlation_id))
    }

    fn claim(&self, correlation_id: CorrelationId) -> SagaResult<()> {
        let claims = self
            .claims
            .lock()
            .map_err(|_| SagaOperationError::unavailable("claim lock poisoned"))?;

        let timeout = self.config.claim_timeout;
        let (mut claims, wait) = self
            .released
            .wait_timeout_while(claims, timeout, |held| held.contains(&correlation_id))
            .map_err(|_| SagaOperationError::unavailable("claim lock poisoned"))?;

        if wait.timed_out() {
            return Err(SagaOperationError::concurrency(format!(
                "saga {correlation_id} still held by another dispatch after {timeout:?}"
            )));
        }
        claims.insert(correlation_id);
        Ok(())
    }

    fn release(&self, correlation_id: CorrelationId) -> SagaResult<()> {
        {
            let mut claims = self
                .claims
                .lock()
                .map_err(|_| SagaOperationError::release("claim lock poisoned"))?;
            claims.remove(&correlation_id);
        }
        self.released.notify_all();
        Ok(())
    }

    fn load(&self, correlation_id: CorrelationId) -> SagaResult<Option<SagaRef<S>>> {
        let sagas = self
            .sagas
            .read()
            .map_err(|_| SagaOperationError::unavailable("saga store lock poisoned"))?;
        Ok(sagas.get(&correlation_id).cloned())
    }
}

impl<S> InMemorySagaRepository<S>
where
    S: SagaStateMachine,
{
    /// Store an already-built instance (e.g. seeding or migration).
    pub fn insert(&self, saga: S) -> SagaResult<SagaRef<S>> {
        let correlation_id = saga.correlation_id();
        let mut sagas = self
            .sagas
            .write()
            .map_err(|_| SagaOperationError::unavailable("saga store lock poisoned"))?;

        if sagas.contains_key(&correlation_id) {
            return Err(SagaOperationError::AlreadyExists(correlation_id));
        }
        let saga = Arc::new(Mutex::new(saga));
        sagas.insert(correlation_id, saga.clone());
        Ok(saga)
    }

    fn initiate(&self, correlation_id: CorrelationId) -> SagaResult<SagaRef<S>> {
        let mut sagas = self
            .sagas
            .write()
            .map_err(|_| SagaOperationError::unavailable("saga store lock poisoned"))?;

        if let Some(existing) = sagas.get(&correlation_id) {
            return match self.config.existing_saga {
                ExistingSagaPolicy::Reject => Err(SagaOperationError::AlreadyExists(correlation_id)),
                ExistingSagaPolicy::Load => Ok(existing.clone()),
            };
        }

        let saga = Arc::new(Mutex::new(S::initiate(correlation_id)));
        sagas.insert(correlation_id, saga.clone());
        debug!(
            saga_type = S::saga_type(),
            correlation_id = %correlation_id,
            "initiated saga"
        );
        Ok(saga)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CursorMode {
    Initiate,
    Orchestrate,
}

/// Cursor over an [`InMemorySagaRepository`].
///
/// Yields at most one instance (the store keeps one per id).
#[derive(Debug)]
pub struct InMemorySagaCursor<'a, S> {
    repository: &'a InMemorySagaRepository<S>,
    correlation_id: CorrelationId,
    mode: CursorMode,
    advanced: bool,
    claimed: bool,
}

impl<'a, S> InMemorySagaCursor<'a, S> {
    fn new(repository: &'a InMemorySagaRepository<S>, correlation_id: CorrelationId, mode: CursorMode) -> Self {
        Self {
            repository,
            correlation_id,
            mode,
            advanced: false,
            claimed: false,
        }
    }

    fn release_claim(&mut self) -> SagaResult<()> {
        self.advanced = true;
        if !self.claimed {
            return Ok(());
        }
        self.claimed = false;
        self.repository.release(self.correlation_id)
    }
}

impl<S> Iterator for InMemorySagaCursor<'_, S>
where
    S: SagaStateMachine,
{
    type Item = SagaResult<SagaRef<S>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advanced {
            return None;
        }
        self.advanced = true;

        if let Err(err) = self.repository.claim(self.correlation_id) {
            return Some(Err(err));
        }
        self.claimed = true;

        match self.mode {
            CursorMode::Initiate => Some(self.repository.initiate(self.correlation_id)),
            CursorMode::Orchestrate => self.repository.load(self.correlation_id).transpose(),
        }
    }
}

impl<S> SagaCursor<S> for InMemorySagaCursor<'_, S>
where
    S: SagaStateMachine,
{
    fn close(&mut self) -> SagaResult<()> {
        self.release_claim()
    }
}

impl<S> Drop for InMemorySagaCursor<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.release_claim() {
            warn!(
                correlation_id = %self.correlation_id,
                error = %err,
                "failed to release saga claim"
            );
        }
    }
}

impl<S> SagaRepository<S> for InMemorySagaRepository<S>
where
    S: SagaStateMachine,
{
    type Cursor<'a>
        = InMemorySagaCursor<'a, S>
    where
        Self: 'a;

    fn initiate_new_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_> {
        InMemorySagaCursor::new(self, correlation_id, CursorMode::Initiate)
    }

    fn orchestrate_existing_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_> {
        InMemorySagaCursor::new(self, correlation_id, CursorMode::Orchestrate)
    }
}
