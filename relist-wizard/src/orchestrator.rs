use relist_core::models::{Decision, DecisionKind, SessionStatus, SuggestionSet, WizardSession};
use relist_core::repository::{CatalogStore, ListLockStore, RateLimiter, SearchEngine, SessionStore};
use relist_core::{WizardError, WizardResult};
use std::sync::Arc;
use uuid::Uuid;

use crate::detector::ExpiredItemDetector;
use crate::explain::ExplanationBuilder;
use crate::scorer::Scorer;
use crate::search::CandidateSearch;
use crate::store_selector::StoreSelector;
use crate::WizardRules;

/// Owns the wizard session state machine:
/// NONE -> ACTIVE -> { COMPLETED, CANCELLED, EXPIRED }.
///
/// Start composes detector -> search -> scorer -> store selection into a
/// persisted session and takes the list lock; Decide and Cancel mutate
/// the session under owner and liveness checks. Confirmation lives in
/// [`crate::ConfirmationEngine`].
pub struct WizardOrchestrator {
    detector: ExpiredItemDetector,
    search: CandidateSearch,
    scorer: Scorer,
    selector: StoreSelector,
    sessions: Arc<dyn SessionStore>,
    locks: Arc<dyn ListLockStore>,
    limiter: Arc<dyn RateLimiter>,
}

impl WizardOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        engine: Arc<dyn SearchEngine>,
        sessions: Arc<dyn SessionStore>,
        locks: Arc<dyn ListLockStore>,
        limiter: Arc<dyn RateLimiter>,
        rules: WizardRules,
    ) -> Self {
        // Fetch more hits than we keep so scoring has slack to reorder.
        let fetch_limit = rules.max_candidates * 4;
        Self {
            detector: ExpiredItemDetector::new(catalog),
            search: CandidateSearch::new(engine, rules.min_brand_results, fetch_limit),
            scorer: Scorer::new(rules.max_candidates),
            selector: StoreSelector::new(rules.max_stores),
            sessions,
            locks,
            limiter,
        }
    }

    /// Starts a migration session for a list.
    ///
    /// Ordering is part of the contract: rate limit, advisory lock check,
    /// detection and ranking, persist, then the atomic lock. If the lock
    /// is not acquired after the session was persisted, the session is
    /// torn down before returning so no ACTIVE session survives without a
    /// lock.
    pub async fn start(&self, list_id: Uuid, user_id: &str) -> WizardResult<WizardSession> {
        if !self.limiter.try_acquire(user_id).await? {
            return Err(WizardError::RateLimited(format!(
                "user {user_id} exceeded the session start quota"
            )));
        }

        self.check_or_reclaim_lock(list_id).await?;

        let expired = self.detector.detect(list_id).await?;
        if expired.is_empty() {
            return Err(WizardError::ValidationFailed(format!(
                "list {list_id} has no expired items to migrate"
            )));
        }

        let mut sets = Vec::with_capacity(expired.len());
        for item in expired {
            let hits = self.search.candidates_for(&item).await?;
            let mut candidates = self.scorer.score_hits(&item, hits);
            for candidate in &mut candidates {
                candidate.explanation = ExplanationBuilder::build(&item, candidate);
            }
            sets.push(SuggestionSet {
                item,
                candidates,
                recommended_candidate_id: None,
            });
        }

        let allocations = self.selector.select(&mut sets);

        let mut session = WizardSession::new(user_id.to_string(), list_id);
        session.items = sets;
        session.selected_stores = allocations;

        self.sessions.create(&session).await?;

        match self.locks.try_lock(list_id, session.id).await {
            Ok(true) => {}
            Ok(false) => {
                // Compensating rollback: the session must not outlive a
                // lock we failed to take.
                self.sessions.delete(session.id).await?;
                return Err(WizardError::Conflict(format!(
                    "list {list_id} was locked concurrently"
                )));
            }
            Err(err) => {
                if let Err(cleanup) = self.sessions.delete(session.id).await {
                    tracing::error!(session_id = %session.id, %cleanup, "Failed to tear down session after lock failure");
                }
                return Err(err);
            }
        }

        tracing::info!(
            session_id = %session.id,
            %list_id,
            items = session.items.len(),
            stores = session.selected_stores.len(),
            "Wizard session started"
        );
        Ok(session)
    }

    /// Fetches a session for its owner. A session read past its TTL
    /// reports EXPIRED and triggers lazy cleanup of the lock and cache
    /// entry.
    pub async fn get(&self, session_id: Uuid, user_id: &str) -> WizardResult<WizardSession> {
        let mut session = self.load_owned(session_id, user_id).await?;
        if session.effective_status() == SessionStatus::Expired {
            self.expire_cleanup(&session).await;
            session.status = SessionStatus::Expired;
        }
        Ok(session)
    }

    /// Records (or overwrites) one item decision. Re-recording the same
    /// resolution is a no-op returning the unchanged session. The save
    /// preserves the session's remaining TTL.
    pub async fn decide(
        &self,
        session_id: Uuid,
        user_id: &str,
        item_id: Uuid,
        kind: DecisionKind,
        candidate_id: Option<Uuid>,
    ) -> WizardResult<WizardSession> {
        let mut session = self.require_active(session_id, user_id).await?;

        let suggestion = session.suggestion_for(item_id).ok_or_else(|| {
            WizardError::NotFound(format!("item {item_id} is not part of session {session_id}"))
        })?;

        match kind {
            DecisionKind::Replace => {
                let candidate_id = candidate_id.ok_or_else(|| {
                    WizardError::ValidationFailed(
                        "REPLACE decision requires a candidate_id".to_string(),
                    )
                })?;
                if !suggestion
                    .candidates
                    .iter()
                    .any(|c| c.candidate_id == candidate_id)
                {
                    return Err(WizardError::ValidationFailed(format!(
                        "candidate {candidate_id} does not belong to item {item_id}"
                    )));
                }
            }
            DecisionKind::Skip | DecisionKind::Remove => {
                if candidate_id.is_some() {
                    return Err(WizardError::ValidationFailed(
                        "SKIP/REMOVE decisions do not take a candidate_id".to_string(),
                    ));
                }
            }
        }

        if let Some(existing) = session.decisions.get(&item_id) {
            if existing.same_resolution(kind, candidate_id) {
                // Idempotent re-record: same result, no extra write.
                return Ok(session);
            }
        }

        session.decisions.insert(
            item_id,
            Decision {
                item_id,
                kind,
                candidate_id,
                recorded_at: chrono::Utc::now(),
            },
        );
        self.sessions.save(&session).await?;
        tracing::debug!(
            %session_id,
            %item_id,
            decided = session.decided_count(),
            "Decision recorded"
        );
        Ok(session)
    }

    /// Cancels an active session: CANCELLED, list unlocked, cache entry
    /// removed. No catalog or list-item mutation occurs. Unlock comes
    /// first: if it fails the session survives and cancel can be
    /// retried.
    pub async fn cancel(&self, session_id: Uuid, user_id: &str) -> WizardResult<WizardSession> {
        let mut session = self.require_active(session_id, user_id).await?;

        session.status = SessionStatus::Cancelled;
        self.locks.unlock(session.list_id).await?;
        self.sessions.delete(session.id).await?;
        tracing::info!(%session_id, list_id = %session.list_id, "Wizard session cancelled");
        Ok(session)
    }

    /// A held lock only blocks Start while its owning session is still
    /// ACTIVE. When the owner has lapsed, or its cache entry is gone
    /// entirely, the lock is reclaimed here so an abandoned session can
    /// never strand its list.
    async fn check_or_reclaim_lock(&self, list_id: Uuid) -> WizardResult<()> {
        let Some(holder) = self.locks.holder(list_id).await? else {
            return Ok(());
        };
        match self.sessions.get(holder).await? {
            Some(live) if live.effective_status() == SessionStatus::Active => {
                Err(WizardError::Conflict(format!(
                    "list {list_id} already has an active migration session"
                )))
            }
            stale => {
                if let Some(stale) = stale {
                    self.sessions.delete(stale.id).await?;
                }
                self.locks.unlock(list_id).await?;
                tracing::info!(%list_id, stale_session = %holder, "Reclaimed list lock from lapsed session");
                Ok(())
            }
        }
    }

    async fn load_owned(&self, session_id: Uuid, user_id: &str) -> WizardResult<WizardSession> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or_else(|| WizardError::NotFound(format!("session {session_id}")))?;
        if session.user_id != user_id {
            return Err(WizardError::Forbidden(format!(
                "session {session_id} belongs to another user"
            )));
        }
        Ok(session)
    }

    async fn require_active(&self, session_id: Uuid, user_id: &str) -> WizardResult<WizardSession> {
        let session = self.load_owned(session_id, user_id).await?;
        match session.effective_status() {
            SessionStatus::Active => Ok(session),
            SessionStatus::Expired => {
                self.expire_cleanup(&session).await;
                Err(WizardError::Expired(session_id))
            }
            status => Err(WizardError::Conflict(format!(
                "session {session_id} is {status:?}, not ACTIVE"
            ))),
        }
    }

    /// Expiry is detected lazily on read; correctness never depends on a
    /// background sweeper. Cleanup failures are logged, not surfaced: the
    /// caller already gets the EXPIRED answer.
    async fn expire_cleanup(&self, session: &WizardSession) {
        if let Err(err) = self.locks.unlock(session.list_id).await {
            tracing::warn!(session_id = %session.id, %err, "Failed to unlock list for expired session");
        }
        if let Err(err) = self.sessions.delete(session.id).await {
            tracing::warn!(session_id = %session.id, %err, "Failed to drop expired session");
        }
    }
}
