//! Entity markers
//!
//! A marker is the join-key column name as it appears inside a cache key.
//! The table is ordered: when several markers occur in one key, the first
//! entry of the table wins. It also acts as the catalog of valid entity
//! columns for the strict layout parser.

use featurekeys_common::config::{MarkerConfig, validate_markers};
use featurekeys_common::{EntityKind, Result};

/// One marker and the entity kind it identifies
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityMarker {
    column: String,
    kind: EntityKind,
}

impl EntityMarker {
    /// Create a marker for a join-key column
    pub fn new(column: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            column: column.into(),
            kind,
        }
    }

    /// Join-key column name
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Entity kind this marker identifies
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Marker length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.column.len()
    }

    /// Whether the marker is empty (never true for a validated table)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.column.is_empty()
    }

    /// Byte offset of the first occurrence of this marker in `raw`
    #[must_use]
    pub fn find_in(&self, raw: &[u8]) -> Option<usize> {
        let needle = self.column.as_bytes();
        if needle.is_empty() || needle.len() > raw.len() {
            return None;
        }
        raw.windows(needle.len()).position(|window| window == needle)
    }
}

/// Ordered set of entity markers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerTable {
    markers: Vec<EntityMarker>,
}

impl MarkerTable {
    /// Create a table, rejecting empty, duplicate or `Unknown` markers
    pub fn new(markers: Vec<EntityMarker>) -> Result<Self> {
        validate_markers(markers.iter().map(|m| (m.column(), m.kind)))?;
        Ok(Self { markers })
    }

    /// Build the table from configuration entries
    pub fn from_config(entries: &[MarkerConfig]) -> Result<Self> {
        Self::new(
            entries
                .iter()
                .map(|entry| EntityMarker::new(entry.marker.clone(), entry.kind))
                .collect(),
        )
    }

    /// Iterate markers in priority order
    pub fn iter(&self) -> impl Iterator<Item = &EntityMarker> {
        self.markers.iter()
    }

    /// Number of markers
    #[must_use]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Whether the table has no markers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// First marker (in priority order) present in `raw`, with its offset
    #[must_use]
    pub fn find(&self, raw: &[u8]) -> Option<(&EntityMarker, usize)> {
        self.markers
            .iter()
            .find_map(|marker| marker.find_in(raw).map(|pos| (marker, pos)))
    }

    /// Entity kind registered for a join-key column
    #[must_use]
    pub fn kind_for_column(&self, column: &str) -> Option<EntityKind> {
        self.markers
            .iter()
            .find(|marker| marker.column == column)
            .map(EntityMarker::kind)
    }
}

impl Default for MarkerTable {
    fn default() -> Self {
        Self {
            markers: EntityKind::KNOWN
                .iter()
                .filter_map(|kind| {
                    kind.default_column()
                        .map(|column| EntityMarker::new(column, *kind))
                })
                .collect(),
        }
    }
}
