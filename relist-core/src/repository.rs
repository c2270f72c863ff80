use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ConfirmOutcome, ExpiredItem, MigrationPlan, WizardSession};
use crate::search::{SearchHit, SearchQuery};
use crate::WizardResult;

/// Read access to the catalog/offer store.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Items on the list whose linked offer is outside its validity
    /// window or archived, ordered by item id. An error here must abort
    /// wizard start; partial results are never returned.
    async fn expired_items(&self, list_id: Uuid) -> WizardResult<Vec<ExpiredItem>>;

    /// Whether a product+store+price triple is still valid right now.
    async fn offer_is_valid(
        &self,
        product_id: Uuid,
        store_id: Uuid,
        price_cents: i64,
    ) -> WizardResult<bool>;
}

/// Black-box candidate search engine.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn find_similar(&self, query: &SearchQuery) -> WizardResult<Vec<SearchHit>>;
}

/// Mutual-exclusion flag preventing two concurrent migration sessions on
/// one list. The lock is tagged with the owning session id so that a
/// lock whose session has lapsed or been evicted can be reclaimed
/// instead of stranding the list.
#[async_trait]
pub trait ListLockStore: Send + Sync {
    /// Session currently holding the lock, if any. Also the advisory
    /// read used before doing any expensive work.
    async fn holder(&self, list_id: Uuid) -> WizardResult<Option<Uuid>>;

    /// Atomic set-if-unset, recording `session_id` as the owner.
    /// Returns false when the list is already locked.
    async fn try_lock(&self, list_id: Uuid, session_id: Uuid) -> WizardResult<bool>;

    async fn unlock(&self, list_id: Uuid) -> WizardResult<()>;
}

/// Keyed session cache with TTL plus the idempotency ledger.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &WizardSession) -> WizardResult<()>;

    async fn get(&self, id: Uuid) -> WizardResult<Option<WizardSession>>;

    /// Re-persist a session without resetting its expiry clock.
    async fn save(&self, session: &WizardSession) -> WizardResult<()>;

    async fn delete(&self, id: Uuid) -> WizardResult<()>;

    /// The ledger has its own TTL, independent of the session's, so a
    /// retried confirm after the session closed still replays the
    /// original result.
    async fn ledger_get(
        &self,
        session_id: Uuid,
        key: &str,
    ) -> WizardResult<Option<ConfirmOutcome>>;

    async fn ledger_put(
        &self,
        session_id: Uuid,
        key: &str,
        outcome: &ConfirmOutcome,
    ) -> WizardResult<()>;
}

/// Sliding-window cap on wizard starts per user.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Atomic check-and-increment: true when the start is admitted.
    async fn try_acquire(&self, user_id: &str) -> WizardResult<bool>;
}

/// Applies a migration plan inside one all-or-nothing transaction.
#[async_trait]
pub trait ListWriter: Send + Sync {
    async fn apply_migration(&self, plan: &MigrationPlan) -> WizardResult<()>;
}
