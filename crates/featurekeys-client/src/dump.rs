//! Hex dump file source
//!
//! One hex-encoded key per line. Blank lines and lines starting with `#`
//! are ignored.

use crate::source::KeySource;
use async_trait::async_trait;
use featurekeys_common::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key source reading a hex dump file
#[derive(Clone, Debug)]
pub struct DumpFileSource {
    path: PathBuf,
}

impl DumpFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeySource for DumpFileSource {
    fn name(&self) -> &str {
        "dump"
    }

    async fn fetch_keys(&self) -> Result<Vec<Vec<u8>>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let keys = parse_dump(&contents)?;
        debug!(path = %self.path.display(), keys = keys.len(), "read key dump");
        Ok(keys)
    }
}

/// Parse dump file contents into raw keys
pub fn parse_dump(contents: &str) -> Result<Vec<Vec<u8>>> {
    contents
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                None
            } else {
                Some((idx + 1, line))
            }
        })
        .map(|(line_no, line)| {
            hex::decode(line).map_err(|e| Error::InvalidDump {
                line: line_no,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Render keys in dump file format
#[must_use]
pub fn format_dump<K: AsRef<[u8]>>(keys: &[K]) -> String {
    let mut out = String::new();
    for key in keys {
        out.push_str(&hex::encode(key));
        out.push('\n');
    }
    out
}
