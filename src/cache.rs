use redis::Client;
use std::sync::Arc;

/// CacheClient
///
/// Thin wrapper around the Redis connection factory. Constructed once at
/// startup from the loaded configuration and carried in the application state
/// — never a process-wide global. Connections are established lazily, so
/// opening the client does not require a reachable server.
///
/// No business logic currently reads or writes through the cache; the client
/// exists as injected infrastructure for response caching to hang off.
#[derive(Clone)]
pub struct CacheClient {
    client: Client,
}

impl CacheClient {
    pub fn open(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: Client::open(url)?,
        })
    }

    /// Best-effort connectivity probe, used once at startup to log whether the
    /// cache is reachable. Failure is not fatal.
    pub async fn ping(&self) -> bool {
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// CacheState
///
/// The concrete type used to share the cache client across the application
/// state.
pub type CacheState = Arc<CacheClient>;
