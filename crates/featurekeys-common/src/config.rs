//! Configuration types for featurekeys
//!
//! Loaded from an optional TOML file. Every field has a default, so an
//! empty or missing file yields a working configuration for the standard
//! worker/business/shift key format.

use crate::error::{Error, Result};
use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Bytes between the end of a marker and the start of its identifier
/// (value type tag plus value length prefix).
pub const DEFAULT_SKIP_BYTES: usize = 8;

/// Width of the little-endian identifier following the skip bytes
pub const DEFAULT_ID_WIDTH: usize = 8;

/// Identifiers above this are treated as false-positive marker matches
pub const DEFAULT_MAX_PLAUSIBLE_ID: u64 = 10_000_000;

/// Root configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Key codec configuration
    #[serde(default)]
    pub codec: CodecConfig,
    /// Online store connection
    #[serde(default)]
    pub redis: RedisConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| Error::configuration(format!("{}: {e}", path.display())))
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| Error::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the codec cannot work with
    pub fn validate(&self) -> Result<()> {
        self.codec.validate()?;
        if self.redis.scan_count == 0 {
            return Err(Error::configuration("redis.scan_count must be positive"));
        }
        if self.redis.pattern.is_empty() {
            return Err(Error::configuration("redis.pattern must not be empty"));
        }
        Ok(())
    }
}

/// Key codec configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Offset between the end of a marker and the identifier bytes
    #[serde(default = "default_skip_bytes")]
    pub skip_bytes: usize,
    /// Identifier width in bytes (1..=8)
    #[serde(default = "default_id_width")]
    pub id_width: usize,
    /// Largest identifier accepted as genuine
    #[serde(default = "default_max_plausible_id")]
    pub max_plausible_id: u64,
    /// Entity markers in priority order
    #[serde(default = "default_markers")]
    pub markers: Vec<MarkerConfig>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            skip_bytes: default_skip_bytes(),
            id_width: default_id_width(),
            max_plausible_id: default_max_plausible_id(),
            markers: default_markers(),
        }
    }
}

impl CodecConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.id_width) {
            return Err(Error::configuration(format!(
                "codec.id_width must be between 1 and 8, got {}",
                self.id_width
            )));
        }
        validate_markers(self.markers.iter().map(|m| (m.marker.as_str(), m.kind)))
    }
}

/// Check a marker table given as `(marker, kind)` pairs in priority order.
///
/// The table must be non-empty, and every marker must be non-empty,
/// unique and map to a known entity kind.
pub fn validate_markers<'a, I>(markers: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, EntityKind)>,
{
    let mut seen = HashSet::new();
    for (marker, kind) in markers {
        if marker.is_empty() {
            return Err(Error::configuration("marker table has an empty marker"));
        }
        if !kind.is_known() {
            return Err(Error::configuration(format!(
                "marker {marker:?} cannot map to kind unknown"
            )));
        }
        if !seen.insert(marker) {
            return Err(Error::configuration(format!("duplicate marker {marker:?}")));
        }
    }
    if seen.is_empty() {
        return Err(Error::configuration("marker table is empty"));
    }
    Ok(())
}

/// One entry of the marker table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Join-key column name embedded in the key (e.g. `id_worker_id`)
    pub marker: String,
    /// Entity kind the marker identifies
    pub kind: EntityKind,
}

impl MarkerConfig {
    /// Create a marker entry
    pub fn new(marker: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            marker: marker.into(),
            kind,
        }
    }
}

/// Online store (Redis) configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key pattern passed to SCAN MATCH
    #[serde(default = "default_pattern")]
    pub pattern: String,
    /// COUNT hint per SCAN call
    #[serde(default = "default_scan_count")]
    pub scan_count: usize,
    /// Stop after this many keys (unbounded when unset)
    #[serde(default)]
    pub max_keys: Option<usize>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pattern: default_pattern(),
            scan_count: default_scan_count(),
            max_keys: None,
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

const fn default_skip_bytes() -> usize {
    DEFAULT_SKIP_BYTES
}

const fn default_id_width() -> usize {
    DEFAULT_ID_WIDTH
}

const fn default_max_plausible_id() -> u64 {
    DEFAULT_MAX_PLAUSIBLE_ID
}

fn default_markers() -> Vec<MarkerConfig> {
    EntityKind::KNOWN
        .iter()
        .filter_map(|kind| kind.default_column().map(|col| MarkerConfig::new(col, *kind)))
        .collect()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pattern() -> String {
    "*".to_string()
}

const fn default_scan_count() -> usize {
    1000
}

fn default_log_level() -> String {
    "warn".to_string()
}
