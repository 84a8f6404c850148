//! Sync Coordinator
//!
//! Owns one ordered collection. Holds two snapshots: `authoritative` (last
//! state confirmed by the repository) and `working` (what readers see,
//! possibly ahead of storage). Mutations are serialized through an async
//! mutex; reads never wait on storage.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio::sync::{Mutex, MutexGuard};

use crate::domain::{Completable, DomainError, DomainResult, Relocatable};
use crate::ordering::{
    apply_transitions, normalize_all, settle_completion, verify_contiguous, RearmPolicy, Transitions,
};
use crate::repository::{Repository, RewardLedger};

/// Snapshot pair guarded by the coordinator
#[derive(Debug, Clone, Default)]
pub struct SyncState<T> {
    pub authoritative: Vec<T>,
    pub working: Vec<T>,
    /// Last failure, kept until the next successful mutation
    pub error: Option<DomainError>,
}

pub struct SyncCoordinator<T, R>
where
    T: Relocatable + Completable,
    R: Repository<T>,
{
    repo: Arc<R>,
    ledger: Arc<dyn RewardLedger>,
    policy: RearmPolicy,
    state: RwLock<SyncState<T>>,
    writer: Mutex<()>,
}

impl<T, R> SyncCoordinator<T, R>
where
    T: Relocatable + Completable + PartialEq + Debug,
    T::Id: AsRef<str>,
    R: Repository<T>,
{
    pub fn new(repo: Arc<R>, ledger: Arc<dyn RewardLedger>, policy: RearmPolicy) -> Self {
        Self {
            repo,
            ledger,
            policy,
            state: RwLock::new(SyncState {
                authoritative: Vec::new(),
                working: Vec::new(),
                error: None,
            }),
            writer: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn ledger(&self) -> &Arc<dyn RewardLedger> {
        &self.ledger
    }

    /// Current working snapshot (may include unconfirmed changes)
    pub fn snapshot(&self) -> Vec<T> {
        self.read().working.clone()
    }

    /// Last snapshot confirmed by the repository
    pub fn authoritative(&self) -> Vec<T> {
        self.read().authoritative.clone()
    }

    pub fn last_error(&self) -> Option<DomainError> {
        self.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    /// Wait for in-flight mutations and take the mutation lock
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    /// Replace both snapshots with the repository's contents
    pub async fn reload(&self) -> DomainResult<()> {
        let _guard = self.lock().await;
        self.reload_locked().await
    }

    pub(crate) async fn reload_locked(&self) -> DomainResult<()> {
        match self.repo.list().await {
            Ok(items) => {
                let items = loaded(items);
                let mut state = self.write();
                state.authoritative = items.clone();
                state.working = items;
                state.error = None;
                Ok(())
            }
            Err(e) => {
                log::error!("reload failed: {}", e);
                self.write().error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Commit a proposed collection
    pub async fn apply(&self, next: Vec<T>) -> DomainResult<()> {
        let _guard = self.lock().await;
        self.apply_locked(next).await
    }

    /// Body of [`apply`]; the caller must hold [`lock`]
    ///
    /// Awards are credited only after the write carrying the paid flag
    /// succeeded, so a failed write never leaves a credit behind for state
    /// that is about to be rolled back.
    pub(crate) async fn apply_locked(&self, next: Vec<T>) -> DomainResult<()> {
        let previous = self.read().authoritative.clone();

        let Transitions { items, awards } = apply_transitions(&previous, next, self.policy, Utc::now());
        let normalized = normalize_all(items);
        verify_contiguous(&normalized)?;

        {
            let mut state = self.write();
            state.working = normalized.clone();
            state.error = None;
        }

        let before: HashMap<&T::Id, &T> = previous.iter().map(|item| (item.id(), item)).collect();
        let changed: Vec<&T> = normalized
            .iter()
            .filter(|item| before.get(item.id()) != Some(item))
            .collect();

        if changed.is_empty() {
            return Ok(());
        }
        log::debug!("persisting {} of {} items", changed.len(), normalized.len());

        let mut confirmed: HashMap<T::Id, T> = HashMap::with_capacity(changed.len());
        let mut failure = None;

        for item in changed {
            if let Err(e) = self.repo.update(item).await.map(|stored| {
                confirmed.insert(stored.id().clone(), stored);
            }) {
                failure = Some(e);
                break;
            }

            for award in awards.iter().filter(|award| &award.item_id == item.id()) {
                if let Err(e) = self.ledger.credit(award.item_id.as_ref(), award.amount).await {
                    log::error!("credit for {:?} failed: {}", award.item_id, e);
                    failure = Some(e);
                }
            }
            if failure.is_some() {
                break;
            }
        }

        if let Some(e) = failure {
            return Err(self.recover(e).await);
        }

        let committed: Vec<T> = normalized
            .into_iter()
            .map(|item| confirmed.remove(item.id()).unwrap_or(item))
            .collect();

        let mut state = self.write();
        state.authoritative = committed.clone();
        state.working = committed;
        Ok(())
    }

    /// Drop the optimistic state and go back to what storage holds
    pub(crate) async fn recover(&self, cause: DomainError) -> DomainError {
        log::warn!("persist failed, reloading: {}", cause);

        match self.repo.list().await {
            Ok(items) => {
                let items = loaded(items);
                let mut state = self.write();
                state.authoritative = items.clone();
                state.working = items;
            }
            Err(reload) => {
                log::error!("reload after failure also failed: {}", reload);
                let mut state = self.write();
                state.working = state.authoritative.clone();
            }
        }

        self.write().error = Some(cause.clone());
        cause
    }

    /// Record a failure that did not touch the working snapshot
    pub(crate) fn record_error(&self, error: DomainError) -> DomainError {
        self.write().error = Some(error.clone());
        error
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, SyncState<T>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SyncState<T>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Storage contents as readers should see them
fn loaded<T: Relocatable + Completable>(items: Vec<T>) -> Vec<T> {
    settle_completion(normalize_all(items), Utc::now())
}
