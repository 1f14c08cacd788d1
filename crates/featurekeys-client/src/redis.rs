//! Live Redis keyspace source
//!
//! Walks the keyspace with cursor-based `SCAN MATCH .. COUNT ..` over a
//! multiplexed async connection. `KEYS` is never used.

use crate::source::KeySource;
use ::redis::aio::MultiplexedConnection;
use ::redis::Client;
use async_trait::async_trait;
use featurekeys_common::config::RedisConfig;
use featurekeys_common::{Error, Result};
use tracing::{debug, info};

/// Key source scanning a Redis online store
#[derive(Clone, Debug)]
pub struct RedisKeySource {
    url: String,
    pattern: String,
    scan_count: usize,
    max_keys: Option<usize>,
}

impl RedisKeySource {
    /// Create a source for `url` scanning every key
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(&RedisConfig {
            url: url.into(),
            ..RedisConfig::default()
        })
    }

    /// Create a source from configuration
    #[must_use]
    pub fn from_config(config: &RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            pattern: config.pattern.clone(),
            scan_count: config.scan_count.max(1),
            max_keys: config.max_keys,
        }
    }

    /// Restrict the scan to keys matching `pattern`
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Stop after `max_keys` keys
    #[must_use]
    pub const fn with_max_keys(mut self, max_keys: Option<usize>) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Connection URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<MultiplexedConnection> {
        let client = Client::open(self.url.as_str())
            .map_err(|e| Error::ConnectionFailed(format!("{}: {e}", self.url)))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::ConnectionFailed(format!("{}: {e}", self.url)))
    }
}

#[async_trait]
impl KeySource for RedisKeySource {
    fn name(&self) -> &str {
        "redis"
    }

    async fn fetch_keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut conn = self.connect().await?;
        info!(url = %self.url, pattern = %self.pattern, "scanning keyspace");

        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        let mut rounds = 0usize;
        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&self.pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| Error::scan(format!("SCAN cursor {cursor}: {e}")))?;
            rounds += 1;

            if append_batch(&mut keys, batch, self.max_keys) {
                debug!(limit = ?self.max_keys, "key limit reached");
                break;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!(keys = keys.len(), rounds, "keyspace scan complete");
        Ok(keys)
    }
}

/// Append `batch` to `keys`, honoring `max_keys`. Returns true once the
/// limit is reached.
fn append_batch(keys: &mut Vec<Vec<u8>>, batch: Vec<Vec<u8>>, max_keys: Option<usize>) -> bool {
    match max_keys {
        Some(max) => {
            let room = max.saturating_sub(keys.len());
            keys.extend(batch.into_iter().take(room));
            keys.len() >= max
        }
        None => {
            keys.extend(batch);
            false
        }
    }
}
