pub mod models;
pub mod repository;
pub mod search;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Session expired: {0}")]
    Expired(Uuid),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Revalidation at confirm time found decisions whose offers are no
    /// longer valid. Carries the offending item ids so the client can
    /// re-run search for just those items.
    #[error("{stale_count} decision(s) reference offers that are no longer valid")]
    StaleData {
        stale_count: usize,
        stale_items: Vec<Uuid>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type WizardResult<T> = Result<T, WizardError>;
