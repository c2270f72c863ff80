use relist_core::models::{
    ConfirmOutcome, DecisionKind, MigrationPlan, Replacement, SessionStatus, WizardSession,
};
use relist_core::repository::{CatalogStore, ListLockStore, ListWriter, SessionStore};
use relist_core::{WizardError, WizardResult};
use std::sync::Arc;
use uuid::Uuid;

/// Server-derived key when the caller supplies none: a session confirms
/// at most once, so one default key per session suffices.
const DEFAULT_IDEMPOTENCY_KEY: &str = "confirm";

/// Revalidates the recorded decisions against live data and applies them
/// inside one all-or-nothing transaction.
///
/// Guarantee: after Confirm the list is either fully migrated per the
/// decisions or entirely unchanged, never a partial mix.
pub struct ConfirmationEngine {
    catalog: Arc<dyn CatalogStore>,
    writer: Arc<dyn ListWriter>,
    sessions: Arc<dyn SessionStore>,
    locks: Arc<dyn ListLockStore>,
}

impl ConfirmationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        writer: Arc<dyn ListWriter>,
        sessions: Arc<dyn SessionStore>,
        locks: Arc<dyn ListLockStore>,
    ) -> Self {
        Self {
            catalog,
            writer,
            sessions,
            locks,
        }
    }

    pub async fn confirm(
        &self,
        session_id: Uuid,
        user_id: &str,
        idempotency_key: Option<&str>,
    ) -> WizardResult<ConfirmOutcome> {
        let key = idempotency_key.unwrap_or(DEFAULT_IDEMPOTENCY_KEY);

        // Ledger first: a completed confirm replays its stored result,
        // even after the session itself has been evicted.
        if let Some(outcome) = self.sessions.ledger_get(session_id, key).await? {
            tracing::info!(%session_id, key, "Confirm replayed from idempotency ledger");
            return Ok(outcome);
        }

        let session = self.require_active(session_id, user_id).await?;

        let stale_items = self.revalidate(&session).await?;
        if !stale_items.is_empty() {
            return Err(WizardError::StaleData {
                stale_count: stale_items.len(),
                stale_items,
            });
        }

        let (plan, skipped) = build_plan(&session)?;
        let replaced = plan.replacements.len();
        let removed = plan.removals.len();

        // One atomic unit of work; any failure leaves the list untouched
        // and the session ACTIVE so the user can retry.
        self.writer.apply_migration(&plan).await?;

        let outcome = ConfirmOutcome {
            session_id,
            list_id: session.list_id,
            replaced,
            removed,
            skipped,
            confirmed_at: chrono::Utc::now(),
        };

        // Ledger before any cleanup so a crash between the two still
        // leaves retries answerable. Past this point the confirm is
        // committed; cleanup failures are logged, not surfaced, and a
        // lock left behind is reclaimed by the next Start once the
        // session is gone.
        self.sessions.ledger_put(session_id, key, &outcome).await?;
        if let Err(err) = self.locks.unlock(session.list_id).await {
            tracing::warn!(%session_id, %err, "Failed to unlock list after confirm");
        }
        if let Err(err) = self.sessions.delete(session_id).await {
            tracing::warn!(%session_id, %err, "Failed to drop confirmed session");
        }

        tracing::info!(
            %session_id,
            list_id = %session.list_id,
            replaced,
            removed,
            skipped,
            "Wizard session confirmed"
        );
        Ok(outcome)
    }

    /// Flyers can have rotated again since the session started: every
    /// REPLACE target is re-checked now. Any stale candidate aborts the
    /// whole confirm; partial application is forbidden.
    async fn revalidate(&self, session: &WizardSession) -> WizardResult<Vec<Uuid>> {
        let mut stale = Vec::new();
        for decision in session.decisions.values() {
            if decision.kind != DecisionKind::Replace {
                continue;
            }
            let Some(candidate) = decision.candidate_id.and_then(|id| {
                session
                    .suggestion_for(decision.item_id)
                    .and_then(|s| s.candidates.iter().find(|c| c.candidate_id == id))
            }) else {
                // A decision pointing outside its suggestion set cannot be
                // applied; treat it as stale so the client re-searches.
                stale.push(decision.item_id);
                continue;
            };
            let valid = self
                .catalog
                .offer_is_valid(candidate.product_id, candidate.store_id, candidate.price_cents)
                .await?;
            if !valid {
                stale.push(decision.item_id);
            }
        }
        stale.sort();
        Ok(stale)
    }

    async fn require_active(&self, session_id: Uuid, user_id: &str) -> WizardResult<WizardSession> {
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
        match session.effective_status() {
            SessionStatus::Active => Ok(session),
            SessionStatus::Expired => {
                if let Err(err) = self.locks.unlock(session.list_id).await {
                    tracing::warn!(%session_id, %err, "Failed to unlock list for expired session");
                }
                if let Err(err) = self.sessions.delete(session_id).await {
                    tracing::warn!(%session_id, %err, "Failed to drop expired session");
                }
                Err(WizardError::Expired(session_id))
            }
            status => Err(WizardError::Conflict(format!(
                "session {session_id} is {status:?}, not ACTIVE"
            ))),
        }
    }
}

/// Builds the transactional plan from the decision map. Undecided items
/// are left untouched, like an explicit SKIP. Returns the plan plus the
/// explicit skip count for the outcome.
fn build_plan(session: &WizardSession) -> WizardResult<(MigrationPlan, usize)> {
    let mut replacements = Vec::new();
    let mut removals = Vec::new();
    let mut skipped = 0usize;

    for decision in session.decisions.values() {
        match decision.kind {
            DecisionKind::Replace => {
                let candidate = decision
                    .candidate_id
                    .and_then(|id| {
                        session
                            .suggestion_for(decision.item_id)
                            .and_then(|s| s.candidates.iter().find(|c| c.candidate_id == id))
                    })
                    .ok_or_else(|| {
                        WizardError::ValidationFailed(format!(
                            "REPLACE decision for item {} has no resolvable candidate",
                            decision.item_id
                        ))
                    })?;
                replacements.push(Replacement {
                    item_id: decision.item_id,
                    product_id: candidate.product_id,
                    store_id: candidate.store_id,
                    price_cents: candidate.price_cents,
                });
            }
            DecisionKind::Remove => removals.push(decision.item_id),
            DecisionKind::Skip => skipped += 1,
        }
    }

    Ok((
        MigrationPlan {
            session_id: session.id,
            list_id: session.list_id,
            replacements,
            removals,
        },
        skipped,
    ))
}
