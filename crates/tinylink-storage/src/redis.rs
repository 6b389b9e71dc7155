use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult, Script};
use std::future::Future;
use std::time::Duration;
use tinylink_core::error::Result;
use tinylink_core::{Claim, MappingBackend, ShortCode, StorageError, SuffixChain};
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

/// Key family of the forward index: `short_to_long:<code>` -> long URL.
pub const FORWARD_PREFIX: &str = "short_to_long:";
/// Key family of the reverse index: `long_to_short:<long url>` -> code.
pub const REVERSE_PREFIX: &str = "long_to_short:";

pub const DEFAULT_MAPPING_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

/// Largest `PX` accepted. Redis rejects expiries whose absolute unix time in
/// milliseconds overflows an `i64`.
const MAX_TTL_MILLIS: u64 = (i64::MAX / 2) as u64;

/// KEYS[1] reverse key, KEYS[2] forward key.
/// ARGV[1] long url, ARGV[2] code, ARGV[3] ttl in milliseconds (0 for none),
/// ARGV[4] forward key prefix.
const CLAIM_SCRIPT: &str = r#"
local existing = redis.call('GET', KEYS[1])
if existing and redis.call('GET', ARGV[4] .. existing) == ARGV[1] then
  return {'existing', existing}
end
if redis.call('EXISTS', KEYS[2]) == 1 then
  return {'taken'}
end
if ARGV[3] == '0' then
  redis.call('SET', KEYS[2], ARGV[1])
  redis.call('SET', KEYS[1], ARGV[2])
else
  redis.call('SET', KEYS[2], ARGV[1], 'PX', ARGV[3])
  redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
end
return {'created', ARGV[2]}
"#;

/// KEYS[1] forward key, KEYS[2] reverse key.
/// ARGV[1] long url, ARGV[2] code, ARGV[3] ttl in milliseconds (0 for none),
/// ARGV[4] forward key prefix, ARGV[5] reverse key prefix.
///
/// Drops the reverse key of the URL the code pointed at before, and the
/// forward key of the code the URL pointed at before, so that both indexes
/// keep describing the same set of mappings.
const PUT_SCRIPT: &str = r#"
local previous_url = redis.call('GET', KEYS[1])
if previous_url and previous_url ~= ARGV[1] then
  local stale = ARGV[5] .. previous_url
  if redis.call('GET', stale) == ARGV[2] then
    redis.call('DEL', stale)
  end
end
local previous_code = redis.call('GET', KEYS[2])
if previous_code and previous_code ~= ARGV[2] then
  local stale = ARGV[4] .. previous_code
  if redis.call('GET', stale) == ARGV[1] then
    redis.call('DEL', stale)
  end
end
if ARGV[3] == '0' then
  redis.call('SET', KEYS[1], ARGV[1])
  redis.call('SET', KEYS[2], ARGV[2])
else
  redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[3])
  redis.call('SET', KEYS[2], ARGV[2], 'PX', ARGV[3])
end
return 1
"#;

/// Connection settings for [`RedisBackend`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tinylink_storage::RedisConfig;
///
/// let config = RedisConfig::builder()
///     .url("redis://127.0.0.1:6379")
///     .ttl(Duration::from_secs(3600))
///     .build();
/// assert_eq!(config.namespace(), "");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    #[builder(setter(into))]
    url: String,
    /// Expiry written with both keys of every mapping.
    #[builder(default = DEFAULT_MAPPING_TTL)]
    ttl: Duration,
    /// Deadline for connecting and the initial `PING`.
    #[builder(default = DEFAULT_CONNECT_TIMEOUT)]
    connect_timeout: Duration,
    /// Deadline for every command after construction.
    #[builder(default = DEFAULT_OPERATION_TIMEOUT)]
    operation_timeout: Duration,
    /// Prepended to both key families. Empty by default, which keeps the
    /// keys exactly `short_to_long:<code>` and `long_to_short:<url>`.
    #[builder(default, setter(into))]
    namespace: String,
}

impl RedisConfig {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

fn map_redis_error(operation: &str, err: RedisError) -> StorageError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        StorageError::Timeout(message)
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StorageError::Unavailable(message)
    } else {
        StorageError::Operation(message)
    }
}

/// Milliseconds for a `PX` argument, or 0 for no expiry. Redis rejects
/// `PX 0`, so sub-millisecond TTLs round up to one.
fn ttl_millis(ttl: Option<Duration>) -> u64 {
    ttl.map_or(0, |ttl| {
        u64::try_from(ttl.as_millis())
            .unwrap_or(u64::MAX)
            .clamp(1, MAX_TTL_MILLIS)
    })
}

fn stored_code(value: &str) -> Result<ShortCode> {
    ShortCode::new(value)
        .map_err(|e| StorageError::InvalidData(format!("reverse index holds a bad code: {e}")))
}

/// Reply of the claim script for one candidate.
#[derive(Debug, PartialEq, Eq)]
enum ScriptReply {
    Existing(ShortCode),
    Taken,
    Created(ShortCode),
}

fn parse_claim_reply(reply: &[String]) -> Result<ScriptReply> {
    match reply {
        [tag, code] if tag == "existing" => Ok(ScriptReply::Existing(stored_code(code)?)),
        [tag, code] if tag == "created" => Ok(ScriptReply::Created(ShortCode::new_unchecked(code))),
        [tag] if tag == "taken" => Ok(ScriptReply::Taken),
        other => Err(StorageError::InvalidData(format!(
            "unexpected claim script reply: {other:?}"
        ))),
    }
}

/// A Redis implementation of [`MappingBackend`].
///
/// Every mapping is stored as two string keys, one per direction, both
/// written with the configured TTL. Both writes run as Lua scripts, so the
/// two keys never diverge: [`put`](MappingBackend::put) also removes the
/// keys an overwrite leaves dangling, and [`claim`](MappingBackend::claim)
/// re-checks the reverse key and refuses a taken code before writing.
/// Concurrent first-time claims for the same URL therefore agree on one code.
///
/// A reverse key only counts while the forward key it names maps back to the
/// same URL.
///
/// Each command runs under the configured operation timeout; an elapsed
/// deadline is reported as [`StorageError::Timeout`].
#[derive(Debug, Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    claim_script: Script,
    put_script: Script,
    ttl: Duration,
    operation_timeout: Duration,
    namespace: String,
}

impl RedisBackend {
    /// Connects to Redis and verifies the connection with a `PING`.
    ///
    /// Both steps share the configured connect timeout. There is no offline
    /// mode: if the server can't be reached the backend is not created.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        info!(
            namespace = %config.namespace,
            ttl_secs = config.ttl.as_secs(),
            "Connecting to Redis"
        );

        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            StorageError::Initialization(format!("failed to create Redis client: {e}"))
        })?;

        let conn = match tokio::time::timeout(
            config.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to connect to Redis");
                return Err(map_redis_error("failed to connect to Redis", e));
            }
            Err(_) => {
                warn!("Timed out connecting to Redis");
                return Err(StorageError::Timeout(format!(
                    "no connection to Redis within {:?}",
                    config.connect_timeout
                )));
            }
        };

        Self::from_connection(conn, config).await
    }

    /// Wraps an existing connection, verifying it with a `PING`.
    pub async fn from_connection(conn: MultiplexedConnection, config: RedisConfig) -> Result<Self> {
        let backend = Self {
            conn,
            claim_script: Script::new(CLAIM_SCRIPT),
            put_script: Script::new(PUT_SCRIPT),
            ttl: config.ttl,
            operation_timeout: config.connect_timeout,
            namespace: config.namespace,
        };

        backend.ping().await?;
        info!("Connected to Redis");

        Ok(Self {
            operation_timeout: config.operation_timeout,
            ..backend
        })
    }

    /// Sends a `PING` under the operation deadline.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = self
            .bounded("Redis PING failed", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    fn forward_key(&self, code: &ShortCode) -> String {
        format!("{}{}{}", self.namespace, FORWARD_PREFIX, code.as_str())
    }

    fn reverse_key(&self, long_url: &str) -> String {
        format!("{}{}{}", self.namespace, REVERSE_PREFIX, long_url)
    }

    fn forward_prefix(&self) -> String {
        format!("{}{}", self.namespace, FORWARD_PREFIX)
    }

    fn reverse_prefix(&self) -> String {
        format!("{}{}", self.namespace, REVERSE_PREFIX)
    }

    /// Runs a Redis future under the operation deadline.
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_redis_error(operation, e)),
            Err(_) => Err(StorageError::Timeout(format!(
                "{operation}: no reply within {:?}",
                self.operation_timeout
            ))),
        }
    }
}

#[async_trait]
impl MappingBackend for RedisBackend {
    async fn get_by_code(&self, code: &ShortCode) -> Result<Option<String>> {
        let key = self.forward_key(code);
        trace!(code = %code, "Fetching long URL from Redis");

        let mut conn = self.conn.clone();
        let result = self
            .bounded(
                "failed to fetch long URL from Redis",
                conn.get::<_, Option<String>>(&key),
            )
            .await;

        match &result {
            Ok(Some(_)) => debug!(code = %code, "Forward index hit"),
            Ok(None) => trace!(code = %code, "Forward index miss"),
            Err(e) => warn!(code = %code, error = %e, "Redis error on forward lookup"),
        }
        result
    }

    async fn get_by_url(&self, long_url: &str) -> Result<Option<ShortCode>> {
        let key = self.reverse_key(long_url);
        trace!("Fetching short code from Redis");

        let mut conn = self.conn.clone();
        let value = self
            .bounded(
                "failed to fetch short code from Redis",
                conn.get::<_, Option<String>>(&key),
            )
            .await
            .inspect_err(|e| warn!(error = %e, "Redis error on reverse lookup"))?;

        let Some(code) = value.as_deref().map(stored_code).transpose()? else {
            return Ok(None);
        };

        let forward = self
            .bounded(
                "failed to confirm short code in Redis",
                conn.get::<_, Option<String>>(self.forward_key(&code)),
            )
            .await
            .inspect_err(|e| warn!(code = %code, error = %e, "Redis error on reverse lookup"))?;

        if forward.as_deref() == Some(long_url) {
            Ok(Some(code))
        } else {
            debug!(code = %code, "Ignoring reverse entry of an overwritten code");
            Ok(None)
        }
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let key = self.forward_key(code);
        trace!(code = %code, "Checking code existence in Redis");

        let mut conn = self.conn.clone();
        self.bounded(
            "failed to check key existence in Redis",
            conn.exists::<_, bool>(&key),
        )
        .await
        .inspect_err(|e| warn!(code = %code, error = %e, "Redis error on exists check"))
    }

    async fn put(&self, code: &ShortCode, long_url: &str, ttl: Option<Duration>) -> Result<()> {
        let forward = self.forward_key(code);
        let reverse = self.reverse_key(long_url);
        trace!(code = %code, "Storing mapping in Redis");

        let mut invocation = self.put_script.key(&forward);
        invocation
            .key(&reverse)
            .arg(long_url)
            .arg(code.as_str())
            .arg(ttl_millis(ttl))
            .arg(self.forward_prefix())
            .arg(self.reverse_prefix());

        let mut conn = self.conn.clone();
        self.bounded(
            "failed to write mapping to Redis",
            invocation.invoke_async::<()>(&mut conn),
        )
        .await
        .inspect_err(|e| warn!(code = %code, error = %e, "Failed to store mapping in Redis"))?;

        debug!(code = %code, "Stored mapping in Redis");
        Ok(())
    }

    fn mapping_ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }

    async fn claim(
        &self,
        long_url: &str,
        chain: SuffixChain,
        ttl: Option<Duration>,
    ) -> Result<Claim> {
        let reverse = self.reverse_key(long_url);
        let ttl_arg = ttl_millis(ttl);
        let forward_prefix = self.forward_prefix();
        let candidate = chain.peek().map(ToString::to_string).unwrap_or_default();
        let max_suffix = chain.max_suffix();

        let mut conn = self.conn.clone();
        for code in chain {
            let forward = self.forward_key(&code);

            let mut invocation = self.claim_script.key(&reverse);
            invocation
                .key(&forward)
                .arg(long_url)
                .arg(code.as_str())
                .arg(ttl_arg)
                .arg(&forward_prefix);

            let reply: Vec<String> = self
                .bounded(
                    "failed to run claim script",
                    invocation.invoke_async(&mut conn),
                )
                .await
                .inspect_err(|e| warn!(code = %code, error = %e, "Redis error on claim"))?;

            match parse_claim_reply(&reply)? {
                ScriptReply::Existing(existing) => {
                    debug!(code = %existing, "Reusing live mapping");
                    return Ok(Claim::Reused(existing));
                }
                ScriptReply::Created(created) => {
                    if created.as_str() != candidate {
                        debug!(code = %created, candidate = %candidate, "Resolved code collision");
                    }
                    return Ok(Claim::Created(created));
                }
                ScriptReply::Taken => trace!(code = %code, "Code taken, trying next suffix"),
            }
        }

        warn!(candidate = %candidate, max_suffix, "Suffix chain exhausted");
        Ok(Claim::Exhausted {
            candidate,
            max_suffix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = RedisConfig::builder().url("redis://localhost:6379").build();
        assert_eq!(config.url(), "redis://localhost:6379");
        assert_eq!(config.ttl(), Duration::from_secs(2_592_000));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.operation_timeout, Duration::from_secs(2));
        assert_eq!(config.namespace(), "");
    }

    #[test]
    fn ttl_millis_rounds_up_and_clamps() {
        assert_eq!(ttl_millis(None), 0);
        assert_eq!(ttl_millis(Some(Duration::ZERO)), 1);
        assert_eq!(ttl_millis(Some(Duration::from_micros(10))), 1);
        assert_eq!(ttl_millis(Some(Duration::from_secs(2))), 2000);
        assert_eq!(ttl_millis(Some(Duration::from_secs(u64::MAX))), MAX_TTL_MILLIS);
        assert_eq!(ttl_millis(Some(Duration::MAX)), MAX_TTL_MILLIS);
    }

    #[test]
    fn claim_reply_parsing() {
        let existing = vec!["existing".to_string(), "abc".to_string()];
        assert_eq!(
            parse_claim_reply(&existing).unwrap(),
            ScriptReply::Existing(ShortCode::new_unchecked("abc"))
        );

        let created = vec!["created".to_string(), "abcx".to_string()];
        assert_eq!(
            parse_claim_reply(&created).unwrap(),
            ScriptReply::Created(ShortCode::new_unchecked("abcx"))
        );

        assert_eq!(
            parse_claim_reply(&["taken".to_string()]).unwrap(),
            ScriptReply::Taken
        );
        assert!(parse_claim_reply(&[]).is_err());
        assert!(parse_claim_reply(&["existing".to_string(), "bad code".to_string()]).is_err());
    }

    #[test]
    fn stored_code_rejects_garbage() {
        assert!(stored_code("abc").is_ok());
        assert!(matches!(
            stored_code(""),
            Err(StorageError::InvalidData(_))
        ));
    }
}
