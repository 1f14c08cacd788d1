//! Core type definitions for featurekeys
//!
//! Entity kinds and the decoded form of an online-store cache key.

use crate::error::Error;
use bytes::Bytes;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kind of entity a cache key refers to
///
/// The set is closed. Keys whose marker is not recognised decode to
/// [`EntityKind::Unknown`] instead of failing.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[display("worker")]
    Worker,
    #[display("business")]
    Business,
    #[display("shift")]
    Shift,
    #[display("unknown")]
    Unknown,
}

impl EntityKind {
    /// All kinds a key can successfully decode to, in report order
    pub const KNOWN: [Self; 3] = [Self::Worker, Self::Business, Self::Shift];

    /// Whether this kind is a real entity rather than a failed decode
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Default join-key column for this kind
    #[must_use]
    pub const fn default_column(self) -> Option<&'static str> {
        match self {
            Self::Worker => Some("id_worker_id"),
            Self::Business => Some("id_business_id"),
            Self::Shift => Some("id_shift_id"),
            Self::Unknown => None,
        }
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worker" | "pro" => Ok(Self::Worker),
            "business" => Ok(Self::Business),
            "shift" => Ok(Self::Shift),
            "unknown" => Ok(Self::Unknown),
            other => Err(Error::UnknownEntityKind(other.to_string())),
        }
    }
}

/// Result of decoding one cache key
///
/// Never persisted. A failed decode is represented as
/// `entity_kind == Unknown` with `identifier == 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedIdentifier {
    /// Entity kind the key refers to
    pub entity_kind: EntityKind,
    /// Entity identifier (0 when unknown)
    pub identifier: u64,
    /// The key bytes as read from the cache
    pub raw_key: Bytes,
    /// Project namespace, when the key layout could be parsed
    pub project: Option<String>,
}

impl DecodedIdentifier {
    /// Create a successful decode
    #[must_use]
    pub const fn new(entity_kind: EntityKind, identifier: u64, raw_key: Bytes) -> Self {
        Self {
            entity_kind,
            identifier,
            raw_key,
            project: None,
        }
    }

    /// Create an unknown decode for the given key
    #[must_use]
    pub const fn unknown(raw_key: Bytes) -> Self {
        Self::new(EntityKind::Unknown, 0, raw_key)
    }

    /// Attach the project namespace
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Whether the key resolved to a known entity
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.entity_kind.is_known()
    }
}
