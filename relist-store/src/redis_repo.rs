use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Thin async Redis wrapper holding the raw key and command layout for
/// the wizard: session JSON blobs, the idempotency ledger, and the
/// sliding-window rate limit.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    fn session_key(id: Uuid) -> String {
        format!("wizard:session:{}", id)
    }

    fn ledger_key(session_id: Uuid, idempotency_key: &str) -> String {
        format!("wizard:ledger:{}:{}", session_id, idempotency_key)
    }

    fn rate_key(user_id: &str) -> String {
        format!("wizard:rl:{}", user_id)
    }

    pub async fn set_session(&self, id: Uuid, json: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(Self::session_key(id), json, ttl_seconds)
            .await?;
        Ok(())
    }

    pub async fn get_session(&self, id: Uuid) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(Self::session_key(id)).await
    }

    /// Overwrite an existing session without resetting its TTL.
    /// XX so an already-evicted session is not resurrected; KEEPTTL so a
    /// decision never extends the expiry clock.
    pub async fn save_session(&self, id: Uuid, json: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(Self::session_key(id))
            .arg(json)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await?;
        Ok(result.is_some())
    }

    pub async fn del_session(&self, id: Uuid) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::session_key(id)).await?;
        Ok(())
    }

    pub async fn set_ledger(
        &self,
        session_id: Uuid,
        idempotency_key: &str,
        json: &str,
        ttl_seconds: u64,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(Self::ledger_key(session_id, idempotency_key), json, ttl_seconds)
            .await?;
        Ok(())
    }

    pub async fn get_ledger(
        &self,
        session_id: Uuid,
        idempotency_key: &str,
    ) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(Self::ledger_key(session_id, idempotency_key)).await
    }

    /// Atomic sliding-window check-and-add: prune entries older than the
    /// window, admit only while the cardinality is below capacity. Runs
    /// as one Lua script so concurrent starts from the same user cannot
    /// race a read-then-write.
    pub async fn rate_limit_allow(
        &self,
        user_id: &str,
        capacity: u32,
        window_seconds: u64,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let script = redis::Script::new(
            r#"
            local now = tonumber(ARGV[1])
            local window = tonumber(ARGV[2])
            local capacity = tonumber(ARGV[3])
            redis.call("ZREMRANGEBYSCORE", KEYS[1], 0, now - window)
            if redis.call("ZCARD", KEYS[1]) >= capacity then
                return 0
            end
            redis.call("ZADD", KEYS[1], now, ARGV[4])
            redis.call("EXPIRE", KEYS[1], ARGV[5])
            return 1
        "#,
        );

        let now_ms = chrono::Utc::now().timestamp_millis();
        let admitted: i64 = script
            .key(Self::rate_key(user_id))
            .arg(now_ms)
            .arg(window_seconds * 1000)
            .arg(capacity)
            .arg(Uuid::new_v4().to_string())
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(admitted == 1)
    }
}
