use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Session lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

/// A shopping-list entry whose linked promotional offer is no longer
/// valid in any current flyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiredItem {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub store_id: Uuid,
    pub price_cents: i64,
}

/// A currently valid product proposed as a replacement for an expired item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub name: String,
    pub brand: Option<String>,
    pub price_cents: i64,
    pub brand_match: bool,
    pub similarity: f64,
    pub total_score: f64,
    pub explanation: String,
}

/// One expired item plus its ranked replacement candidates. Created once
/// at wizard start; immutable afterwards except for which candidate the
/// user picks via a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub item: ExpiredItem,
    pub candidates: Vec<Candidate>,
    /// Best candidate confined to one of the selected stores, if any.
    pub recommended_candidate_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    Replace,
    Skip,
    Remove,
}

/// The user's per-item resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub item_id: Uuid,
    pub kind: DecisionKind,
    pub candidate_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

impl Decision {
    /// Two decisions are the same resolution when kind and candidate
    /// agree; `recorded_at` is bookkeeping, not identity.
    pub fn same_resolution(&self, kind: DecisionKind, candidate_id: Option<Uuid>) -> bool {
        self.kind == kind && self.candidate_id == candidate_id
    }
}

/// Items covered by one selected store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreAllocation {
    pub store_id: Uuid,
    pub item_ids: Vec<Uuid>,
}

/// A bounded, time-limited interactive migration unit covering one
/// shopping list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSession {
    pub id: Uuid,
    pub user_id: String,
    pub list_id: Uuid,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub selected_stores: Vec<StoreAllocation>,
    pub items: Vec<SuggestionSet>,
    // BTreeMap keeps serialized output order deterministic.
    pub decisions: BTreeMap<Uuid, Decision>,
}

impl WizardSession {
    /// Fixed, non-renewable session lifetime.
    pub const TTL_MINUTES: i64 = 30;

    pub fn new(user_id: String, list_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            list_id,
            status: SessionStatus::Active,
            created_at: now,
            expires_at: now + Duration::minutes(Self::TTL_MINUTES),
            selected_stores: Vec::new(),
            items: Vec::new(),
            decisions: BTreeMap::new(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// EXPIRED is computed at read time, never stored as a transition.
    pub fn effective_status(&self) -> SessionStatus {
        if self.status == SessionStatus::Active && self.is_expired() {
            SessionStatus::Expired
        } else {
            self.status
        }
    }

    pub fn is_active(&self) -> bool {
        self.effective_status() == SessionStatus::Active
    }

    pub fn suggestion_for(&self, item_id: Uuid) -> Option<&SuggestionSet> {
        self.items.iter().find(|s| s.item.item_id == item_id)
    }

    pub fn decided_count(&self) -> usize {
        self.decisions.len()
    }
}

/// Immutable audit record of the price/store/product actually applied for
/// a REPLACE decision, distinct from the live, mutable catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSnapshot {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub price_cents: i64,
    pub applied_at: DateTime<Utc>,
}

/// One REPLACE mutation within a migration plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replacement {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub price_cents: i64,
}

/// Everything the confirmation transaction applies, atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub session_id: Uuid,
    pub list_id: Uuid,
    pub replacements: Vec<Replacement>,
    pub removals: Vec<Uuid>,
}

/// The durable result of a committed confirm, stored in the idempotency
/// ledger and replayed verbatim on retries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub session_id: Uuid,
    pub list_id: Uuid,
    pub replaced: usize,
    pub removed: usize,
    pub skipped: usize,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ttl_is_exactly_thirty_minutes() {
        let session = WizardSession::new("user-1".to_string(), Uuid::new_v4());
        assert_eq!(
            session.expires_at - session.created_at,
            Duration::minutes(30)
        );
    }

    #[test]
    fn test_expired_status_is_computed_not_stored() {
        let mut session = WizardSession::new("user-1".to_string(), Uuid::new_v4());
        assert_eq!(session.effective_status(), SessionStatus::Active);

        session.expires_at = Utc::now() - Duration::minutes(1);
        assert_eq!(session.effective_status(), SessionStatus::Expired);
        // Stored status is untouched
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn test_terminal_status_wins_over_expiry() {
        let mut session = WizardSession::new("user-1".to_string(), Uuid::new_v4());
        session.status = SessionStatus::Completed;
        session.expires_at = Utc::now() - Duration::minutes(1);
        assert_eq!(session.effective_status(), SessionStatus::Completed);
    }

    #[test]
    fn test_decision_resolution_identity() {
        let candidate = Uuid::new_v4();
        let decision = Decision {
            item_id: Uuid::new_v4(),
            kind: DecisionKind::Replace,
            candidate_id: Some(candidate),
            recorded_at: Utc::now(),
        };
        assert!(decision.same_resolution(DecisionKind::Replace, Some(candidate)));
        assert!(!decision.same_resolution(DecisionKind::Replace, Some(Uuid::new_v4())));
        assert!(!decision.same_resolution(DecisionKind::Skip, None));
    }
}
