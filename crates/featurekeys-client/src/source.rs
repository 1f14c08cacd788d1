//! Key source trait

use async_trait::async_trait;
use featurekeys_common::Result;

/// A provider of raw cache keys
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &str;

    /// Fetch every key this source exposes.
    ///
    /// Failures are fatal for the run and are not retried.
    async fn fetch_keys(&self) -> Result<Vec<Vec<u8>>>;
}
