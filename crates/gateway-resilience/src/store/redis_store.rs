//! Redis store backend.

use super::{KeyValueStore, ScoreBound, StoreError, StoreResult, WindowAdmission, WindowOutcome};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, RedisResult};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Purge, count and conditionally insert in one server-side step.
///
/// KEYS[1] window set, ARGV: window start, now, limit, member, ttl seconds.
const SLIDING_WINDOW_SCRIPT: &str = r"
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', '(' .. ARGV[1])
local count = redis.call('ZCARD', KEYS[1])
if count >= tonumber(ARGV[3]) then
  return {0, count}
end
redis.call('ZADD', KEYS[1], ARGV[2], ARGV[4])
redis.call('EXPIRE', KEYS[1], ARGV[5])
return {1, count + 1}
";

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_io_error()
        {
            Self::Unavailable(err.to_string())
        } else {
            Self::Backend(err.to_string())
        }
    }
}

/// Store backed by a Redis server.
///
/// Holds a [`ConnectionManager`], which reconnects on its own after a dropped
/// connection. Every command is bounded by the operation timeout.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    url: String,
    operation_timeout: Duration,
    window_script: redis::Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("url", &self.url)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect and verify the server answers PING
    ///
    /// # Errors
    /// Returns `StoreError::Connection` for a malformed URL or refused
    /// connection, `StoreError::Timeout` if connecting takes too long
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        operation_timeout: Duration,
    ) -> StoreResult<Self> {
        let sanitized = sanitize_url(url);
        debug!(url = %sanitized, "Connecting to Redis");

        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Connection(format!("{sanitized}: {e}")))?;

        let manager = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))?
            .map_err(|e| StoreError::Connection(format!("{sanitized}: {e}")))?;

        let store = Self {
            manager,
            url: sanitized,
            operation_timeout,
            window_script: redis::Script::new(SLIDING_WINDOW_SCRIPT),
        };
        store.ping().await?;

        info!(url = %store.url, "Redis store connected");
        Ok(store)
    }

    /// Release the connection
    pub async fn close(self) {
        info!(url = %self.url, "Redis store closed");
        drop(self.manager);
    }

    /// Connection URL with any password masked
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn bounded<T>(&self, op: impl Future<Output = RedisResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.operation_timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.operation_timeout)),
        }
    }
}

/// Whole seconds for EXPIRE/SETEX, never below one
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

/// Mask the password component of a connection URL
pub fn sanitize_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let mut sanitized = parsed.clone();
        if sanitized.password().is_some() {
            let _ = sanitized.set_password(Some("***"));
        }
        sanitized.to_string()
    } else {
        "invalid_url".to_string()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        self.bounded(async move {
            match ttl {
                Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let removed: u64 = self.bounded(async move { conn.del(key).await }).await?;
        Ok(removed > 0)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.incr(key, 1_i64).await })
            .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let secs = ttl_secs(ttl) as i64;
        self.bounded(async move { conn.expire(key, secs).await })
            .await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.zadd::<_, _, _, ()>(key, member, score).await })
            .await
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
    ) -> StoreResult<u64> {
        let mut conn = self.manager.clone();
        let (min, max) = (min.to_string(), max.to_string());
        self.bounded(async move { conn.zrembyscore(key, min, max).await })
            .await
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.manager.clone();
        self.bounded(async move { conn.zcard(key).await }).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let pong: String = self
            .bounded(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Backend(format!("unexpected PING reply: {pong}")))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }

    fn is_distributed(&self) -> bool {
        true
    }

    async fn sliding_window_admit(
        &self,
        admission: &WindowAdmission<'_>,
    ) -> StoreResult<WindowOutcome> {
        let mut conn = self.manager.clone();
        let mut invocation = self.window_script.key(admission.key);
        invocation
            .arg(admission.window_start())
            .arg(admission.now)
            .arg(admission.max_requests)
            .arg(admission.member)
            .arg(ttl_secs(admission.ttl()));

        let (admitted, count): (i64, u64) = self
            .bounded(async move { invocation.invoke_async(&mut conn).await })
            .await?;

        Ok(WindowOutcome {
            admitted: admitted == 1,
            count,
        })
    }
}
