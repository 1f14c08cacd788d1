//! In-memory key source

use crate::source::KeySource;
use async_trait::async_trait;
use featurekeys_common::Result;

/// Key source over a fixed list of keys
#[derive(Clone, Debug, Default)]
pub struct MemoryKeySource {
    keys: Vec<Vec<u8>>,
}

impl MemoryKeySource {
    /// Create a source returning `keys`
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a key
    pub fn push(&mut self, key: impl Into<Vec<u8>>) {
        self.keys.push(key.into());
    }

    /// Number of keys held
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no keys are held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeySource for MemoryKeySource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_keys(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.keys.clone())
    }
}
