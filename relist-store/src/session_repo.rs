use async_trait::async_trait;
use relist_core::models::{ConfirmOutcome, WizardSession};
use relist_core::repository::{RateLimiter, SessionStore};
use relist_core::{WizardError, WizardResult};
use uuid::Uuid;

use crate::redis_repo::RedisClient;

/// The cache entry outlives the logical 30-minute session so a read
/// inside the grace window can compute EXPIRED from `expires_at` instead
/// of surfacing NotFound. Correctness never depends on Redis eviction.
const CACHE_GRACE_FACTOR: u64 = 2;

/// The ledger answers confirm retries long after the session closed.
const LEDGER_TTL_SECONDS: u64 = 24 * 3600;

pub struct RedisSessionStore {
    client: RedisClient,
}

impl RedisSessionStore {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn cache_ttl() -> u64 {
        (WizardSession::TTL_MINUTES as u64) * 60 * CACHE_GRACE_FACTOR
    }
}

fn internal(context: &str, err: impl std::fmt::Display) -> WizardError {
    tracing::error!("{context}: {err}");
    WizardError::Internal(context.to_string())
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session: &WizardSession) -> WizardResult<()> {
        let json = serde_json::to_string(session)
            .map_err(|e| internal("serialize session", e))?;
        self.client
            .set_session(session.id, &json, Self::cache_ttl())
            .await
            .map_err(|e| internal("session cache write failed", e))
    }

    async fn get(&self, id: Uuid) -> WizardResult<Option<WizardSession>> {
        let json = self
            .client
            .get_session(id)
            .await
            .map_err(|e| internal("session cache read failed", e))?;
        match json {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|e| internal("deserialize session", e))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &WizardSession) -> WizardResult<()> {
        let json = serde_json::to_string(session)
            .map_err(|e| internal("serialize session", e))?;
        let existed = self
            .client
            .save_session(session.id, &json)
            .await
            .map_err(|e| internal("session cache write failed", e))?;
        if !existed {
            // Evicted between the caller's read and this write.
            return Err(WizardError::NotFound(format!("session {}", session.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> WizardResult<()> {
        self.client
            .del_session(id)
            .await
            .map_err(|e| internal("session cache delete failed", e))
    }

    async fn ledger_get(&self, session_id: Uuid, key: &str) -> WizardResult<Option<ConfirmOutcome>> {
        let json = self
            .client
            .get_ledger(session_id, key)
            .await
            .map_err(|e| internal("ledger read failed", e))?;
        match json {
            Some(json) => {
                let outcome = serde_json::from_str(&json)
                    .map_err(|e| internal("deserialize ledger entry", e))?;
                Ok(Some(outcome))
            }
            None => Ok(None),
        }
    }

    async fn ledger_put(
        &self,
        session_id: Uuid,
        key: &str,
        outcome: &ConfirmOutcome,
    ) -> WizardResult<()> {
        let json = serde_json::to_string(outcome)
            .map_err(|e| internal("serialize ledger entry", e))?;
        self.client
            .set_ledger(session_id, key, &json, LEDGER_TTL_SECONDS)
            .await
            .map_err(|e| internal("ledger write failed", e))
    }
}

pub struct RedisRateLimiter {
    client: RedisClient,
    capacity: u32,
    window_seconds: u64,
}

impl RedisRateLimiter {
    pub fn new(client: RedisClient, capacity: u32, window_seconds: u64) -> Self {
        Self {
            client,
            capacity,
            window_seconds,
        }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn try_acquire(&self, user_id: &str) -> WizardResult<bool> {
        match self
            .client
            .rate_limit_allow(user_id, self.capacity, self.window_seconds)
            .await
        {
            Ok(allowed) => Ok(allowed),
            Err(err) => {
                // Fail open: a cache outage must not deny every user
                // their wizard. Explicit policy, loudly logged.
                tracing::warn!(%err, user_id, "Rate limiter backend failed, admitting request");
                Ok(true)
            }
        }
    }
}
