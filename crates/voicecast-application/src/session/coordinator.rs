//! Optimistic mutation coordinator.
//!
//! The coordinator is the only writer of the [`DocumentCache`]. An edit is
//! published speculatively the moment it is submitted, then committed to
//! the remote store under optimistic concurrency; the store's canonical
//! snapshot supersedes the speculative one on success, and every failure
//! path restores the pre-mutation snapshot before the error is surfaced.
//!
//! Per session, at most one commit is in flight. Later edits queue behind
//! it: their speculative effect is applied on top of the earlier edit's
//! snapshot immediately, while their own commit waits for the earlier one
//! to be accepted (then uses the canonical version) or rolled back (then
//! uses the original base version again).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;
use voicecast_core::error::{CastingError, Result};
use voicecast_core::session::{RemoteStore, Session, SessionEdit};

use super::cache::DocumentCache;

/// Where a session currently is in the optimistic-commit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SyncPhase {
    /// No uncommitted local state
    Idle,
    /// Speculative edits published, none currently committing
    OptimisticallyApplied,
    /// The head edit's commit is in flight
    Committing,
    /// The last commit failed and the cache was restored
    RolledBack,
}

struct QueuedEdit {
    ticket: u64,
    edit: SessionEdit,
}

struct SyncState {
    /// Last snapshot acknowledged by the remote store
    canonical: Arc<Session>,
    /// Edits applied optimistically but not yet committed, FIFO
    pending: VecDeque<QueuedEdit>,
    /// canonical + pending, i.e. what the cache currently shows
    published: Arc<Session>,
    phase: SyncPhase,
    /// Bumped whenever the session's authoritative state moves; fetches
    /// started under an older generation are discarded on resolution
    generation: u64,
    next_ticket: u64,
}

struct SessionSlot {
    state: Mutex<SyncState>,
    /// Wakes queued submissions when the head of the queue changes
    turn: Notify,
    cancel: std::sync::Mutex<CancellationToken>,
}

impl SessionSlot {
    fn new(snapshot: Arc<Session>) -> Self {
        Self {
            state: Mutex::new(SyncState {
                canonical: snapshot.clone(),
                pending: VecDeque::new(),
                published: snapshot,
                phase: SyncPhase::Idle,
                generation: 0,
                next_ticket: 0,
            }),
            turn: Notify::new(),
            cancel: std::sync::Mutex::new(CancellationToken::new()),
        }
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().expect("cancel token lock poisoned").clone()
    }
}

/// Orchestrates speculative edits, remote commits, reconciliation and
/// rollback for all sessions.
pub struct MutationCoordinator {
    cache: Arc<DocumentCache>,
    store: Arc<dyn RemoteStore>,
    slots: RwLock<HashMap<String, Arc<SessionSlot>>>,
}

impl MutationCoordinator {
    /// Creates a coordinator writing through the given cache.
    pub fn new(cache: Arc<DocumentCache>, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache,
            store,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached snapshot for a session, fetching it lazily from
    /// the remote store on first access or after invalidation.
    pub async fn open_session(&self, session_id: &str) -> Result<Arc<Session>> {
        if let Some(snapshot) = self.cache.get(session_id).await {
            return Ok(snapshot);
        }

        if self.slot(session_id).await.is_some() {
            // Known session whose cache entry went stale: refetch. A refresh
            // can legitimately be discarded (a mutation landed meanwhile);
            // the published snapshot is then already the freshest view.
            if let Some(snapshot) = self.refresh(session_id).await? {
                return Ok(snapshot);
            }
            return self
                .cache
                .peek(session_id)
                .await
                .ok_or_else(|| CastingError::not_found("Session", session_id));
        }

        self.fetch_and_init(session_id).await
    }

    /// Submits an edit: publishes its speculative result immediately, then
    /// commits it to the remote store in queue order.
    ///
    /// Returns the published snapshot after reconciliation (the canonical
    /// snapshot when no further edits are queued behind this one).
    ///
    /// # Errors
    ///
    /// - `Validation` when the edit does not apply to the current snapshot
    /// - `VersionConflict` when the store has moved past the observed
    ///   version; the caller must refetch before retrying
    /// - `Cancelled` when [`MutationCoordinator::cancel`] interrupted the
    ///   commit
    /// - any other store error, verbatim
    ///
    /// On every failure the cache is restored to the snapshot published
    /// immediately before this submission.
    pub async fn submit(&self, session_id: &str, edit: SessionEdit) -> Result<Arc<Session>> {
        self.ensure_open(session_id).await?;
        let slot = self
            .slot(session_id)
            .await
            .ok_or_else(|| CastingError::not_found("Session", session_id))?;
        let cancel = slot.cancel_token();

        // Speculative apply and immediate publication. Nothing is enqueued
        // if the edit fails to apply, so there is nothing to roll back.
        let ticket;
        {
            let mut state = slot.state.lock().await;
            let speculative = Arc::new(edit.apply(&state.published)?);
            ticket = state.next_ticket;
            state.next_ticket += 1;
            state.pending.push_back(QueuedEdit {
                ticket,
                edit: edit.clone(),
            });
            state.published = speculative.clone();
            if state.phase != SyncPhase::Committing {
                state.phase = SyncPhase::OptimisticallyApplied;
            }
            tracing::debug!(
                "[MutationCoordinator] {} published speculatively for {} (version {})",
                edit.label(),
                session_id,
                speculative.version
            );
            self.cache.publish(session_id, speculative).await;
        }

        // Wait for our turn at the head of the queue, so only one commit is
        // in flight and queued edits never race with a colliding expected
        // version.
        loop {
            let notified = slot.turn.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let state = slot.state.lock().await;
                match state.pending.front() {
                    Some(head) if head.ticket == ticket => break,
                    _ if !state.pending.iter().any(|q| q.ticket == ticket) => {
                        // A rebase dropped this edit: its speculative effect
                        // is already gone from the published snapshot.
                        return Err(CastingError::validation([format!(
                            "{} no longer applies after reconciliation",
                            edit.label()
                        )]));
                    }
                    _ => {}
                }
            }
            tokio::select! {
                _ = &mut notified => {}
                _ = cancel.cancelled() => {
                    return Err(self
                        .settle_failure(
                            session_id,
                            &slot,
                            ticket,
                            CastingError::cancelled("session mutation cancelled"),
                        )
                        .await);
                }
            }
        }

        // Commit against the canonical version observed before our edit.
        let expected_version = {
            let mut state = slot.state.lock().await;
            state.phase = SyncPhase::Committing;
            state.canonical.version
        };
        tracing::debug!(
            "[MutationCoordinator] Committing {} for {} (expected version {})",
            edit.label(),
            session_id,
            expected_version
        );
        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                Err(CastingError::cancelled("session commit cancelled"))
            }
            result = self.dispatch(session_id, &edit, expected_version) => result,
        };

        match outcome {
            Ok(canonical) => Ok(self
                .settle_success(session_id, &slot, ticket, canonical)
                .await),
            Err(err) => {
                tracing::error!(
                    "[MutationCoordinator] {} failed for {}: {}",
                    edit.label(),
                    session_id,
                    err
                );
                Err(self.settle_failure(session_id, &slot, ticket, err).await)
            }
        }
    }

    /// Refetches a session from the remote store.
    ///
    /// Returns `Ok(None)` when the fetched result was discarded: the
    /// session's generation moved while the fetch was in flight, optimistic
    /// edits are pending, or the fetched version would regress the cache.
    /// A `Parse` failure degrades to the cached view instead of failing the
    /// whole session.
    pub async fn refresh(&self, session_id: &str) -> Result<Option<Arc<Session>>> {
        let slot = match self.slot(session_id).await {
            Some(slot) => slot,
            None => return self.fetch_and_init(session_id).await.map(Some),
        };

        let started_generation = {
            let state = slot.state.lock().await;
            state.generation
        };

        let fetched = match self.store.fetch_session(session_id).await {
            Ok(session) => Arc::new(session),
            Err(err) if err.is_parse() => {
                tracing::warn!(
                    "[MutationCoordinator] Fetch of {} failed to parse, serving cached view: {}",
                    session_id,
                    err
                );
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let mut state = slot.state.lock().await;
        if state.generation != started_generation {
            tracing::warn!(
                "[MutationCoordinator] Discarding stale fetch of {} (generation {} -> {})",
                session_id,
                started_generation,
                state.generation
            );
            return Ok(None);
        }
        if !state.pending.is_empty() {
            tracing::debug!(
                "[MutationCoordinator] Discarding fetch of {}: {} optimistic edit(s) pending",
                session_id,
                state.pending.len()
            );
            return Ok(None);
        }
        if fetched.version < state.canonical.version {
            tracing::warn!(
                "[MutationCoordinator] Discarding fetch of {}: version {} behind canonical {}",
                session_id,
                fetched.version,
                state.canonical.version
            );
            return Ok(None);
        }

        state.canonical = fetched.clone();
        state.published = fetched.clone();
        state.generation += 1;
        self.cache.admit(session_id, fetched.clone()).await;
        Ok(Some(fetched))
    }

    /// Cancels the session's in-flight and queued commits.
    ///
    /// Used when the user navigates away: each interrupted submission
    /// unwinds through the rollback path, so the cache never retains an
    /// unacknowledged optimistic state. The session remains usable; later
    /// submissions get a fresh cancellation scope.
    pub async fn cancel(&self, session_id: &str) {
        if let Some(slot) = self.slot(session_id).await {
            let mut token = slot.cancel.lock().expect("cancel token lock poisoned");
            token.cancel();
            *token = CancellationToken::new();
            tracing::debug!("[MutationCoordinator] Cancelled in-flight work for {}", session_id);
        }
    }

    /// The session's current phase in the optimistic-commit cycle, if known.
    pub async fn phase(&self, session_id: &str) -> Option<SyncPhase> {
        let slot = self.slot(session_id).await?;
        let state = slot.state.lock().await;
        Some(state.phase)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn slot(&self, session_id: &str) -> Option<Arc<SessionSlot>> {
        let slots = self.slots.read().await;
        slots.get(session_id).cloned()
    }

    async fn ensure_open(&self, session_id: &str) -> Result<()> {
        if self.slot(session_id).await.is_none() {
            self.fetch_and_init(session_id).await?;
        }
        Ok(())
    }

    async fn fetch_and_init(&self, session_id: &str) -> Result<Arc<Session>> {
        let fetched = match self.store.fetch_session(session_id).await {
            Ok(session) => Arc::new(session),
            Err(err) if err.is_parse() => {
                // Best-effort degradation: an invalid in-progress document
                // must not take down the whole session view.
                if let Some(cached) = self.cache.peek(session_id).await {
                    tracing::warn!(
                        "[MutationCoordinator] Fetch of {} failed to parse, degrading to cached view: {}",
                        session_id,
                        err
                    );
                    self.cache.publish(session_id, cached.clone()).await;
                    cached
                } else {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        };

        {
            let mut slots = self.slots.write().await;
            slots
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(SessionSlot::new(fetched.clone())));
        }

        if !self.cache.admit(session_id, fetched.clone()).await {
            // A newer snapshot is already cached; serve that one.
            if let Some(cached) = self.cache.peek(session_id).await {
                return Ok(cached);
            }
        }
        Ok(fetched)
    }

    async fn dispatch(
        &self,
        session_id: &str,
        edit: &SessionEdit,
        expected_version: u64,
    ) -> Result<Session> {
        match edit {
            SessionEdit::ReplaceDocument { document_text } => {
                self.store
                    .commit_document(session_id, document_text, expected_version)
                    .await
            }
            SessionEdit::PatchAssignment { character, patch } => {
                self.store
                    .commit_assignment_metadata(session_id, character, patch, expected_version)
                    .await
            }
            SessionEdit::ClearAssignment { character } => {
                self.store
                    .clear_assignment(session_id, character, expected_version)
                    .await
            }
        }
    }

    /// Adopts the canonical snapshot, rebases the remaining queue on top of
    /// it, and republishes.
    async fn settle_success(
        &self,
        session_id: &str,
        slot: &SessionSlot,
        ticket: u64,
        canonical: Session,
    ) -> Arc<Session> {
        let mut state = slot.state.lock().await;
        state.pending.retain(|q| q.ticket != ticket);

        let canonical = Arc::new(canonical);
        if canonical.version <= state.canonical.version {
            // The store must advance the version by one per accepted commit;
            // keep the newer local canonical rather than regress.
            tracing::warn!(
                "[MutationCoordinator] Store returned non-advancing version {} for {} (canonical {})",
                canonical.version,
                session_id,
                state.canonical.version
            );
        } else {
            state.canonical = canonical;
        }

        let published = Self::rebase(session_id, state.canonical.clone(), &mut state.pending);
        state.published = published.clone();
        state.generation += 1;
        state.phase = if state.pending.is_empty() {
            SyncPhase::Idle
        } else {
            SyncPhase::OptimisticallyApplied
        };
        self.cache.admit(session_id, published.clone()).await;
        slot.turn.notify_waiters();
        published
    }

    /// Drops the failed edit, restores the published snapshot from the
    /// canonical base plus whatever is still queued, and republishes. For an
    /// empty queue this is exactly the pre-mutation snapshot.
    async fn settle_failure(
        &self,
        session_id: &str,
        slot: &SessionSlot,
        ticket: u64,
        err: CastingError,
    ) -> CastingError {
        let mut state = slot.state.lock().await;
        // A cancelled waiter settles while the head edit's commit is still
        // in flight; that commit's phase must survive the rollback.
        let commit_still_in_flight = state.phase == SyncPhase::Committing
            && state.pending.front().map(|q| q.ticket) != Some(ticket);
        state.pending.retain(|q| q.ticket != ticket);

        let published = Self::rebase(session_id, state.canonical.clone(), &mut state.pending);
        state.published = published.clone();
        state.generation += 1;
        state.phase = if commit_still_in_flight {
            SyncPhase::Committing
        } else if state.pending.is_empty() {
            SyncPhase::RolledBack
        } else {
            SyncPhase::OptimisticallyApplied
        };
        self.cache.publish(session_id, published).await;
        slot.turn.notify_waiters();
        err
    }

    /// Re-applies the queued edits on top of a canonical base. Edits that no
    /// longer apply are dropped; their submitters observe the drop and
    /// surface a validation error.
    fn rebase(
        session_id: &str,
        canonical: Arc<Session>,
        pending: &mut VecDeque<QueuedEdit>,
    ) -> Arc<Session> {
        let mut snapshot = canonical;
        pending.retain(|queued| match queued.edit.apply(&snapshot) {
            Ok(next) => {
                snapshot = Arc::new(next);
                true
            }
            Err(err) => {
                tracing::warn!(
                    "[MutationCoordinator] Dropping queued {} for {}: {}",
                    queued.edit.label(),
                    session_id,
                    err
                );
                false
            }
        });
        snapshot
    }
}
