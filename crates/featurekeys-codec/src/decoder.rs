//! Key decoding strategies
//!
//! [`LayoutDecoder`] parses the full key layout and validates the column
//! names against the marker table. The key must still extend past the
//! identifier window after the marker. [`ScanDecoder`] searches for marker
//! substrings and reads the identifier at a fixed offset, which also works
//! on key variants the strict parser does not understand.

use crate::layout::{EntityKey, KeyLayout};
use crate::marker::MarkerTable;
use featurekeys_common::EntityKind;

/// What a decoder extracted from one key, before plausibility checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub kind: EntityKind,
    pub identifier: u64,
    pub project: Option<String>,
}

/// A strategy for resolving a raw cache key to an entity
pub trait KeyDecoder: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Resolve `raw`, or `None` if this strategy cannot make sense of it.
    ///
    /// Must not panic on any input.
    fn decode(&self, raw: &[u8]) -> Option<Candidate>;
}

/// Strict, layout-aware decoder
#[derive(Clone, Debug, Default)]
pub struct LayoutDecoder {
    markers: MarkerTable,
    layout: KeyLayout,
}

impl LayoutDecoder {
    /// Create a decoder resolving columns through `markers`
    #[must_use]
    pub const fn new(markers: MarkerTable, layout: KeyLayout) -> Self {
        Self { markers, layout }
    }
}

impl KeyDecoder for LayoutDecoder {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn decode(&self, raw: &[u8]) -> Option<Candidate> {
        let key = EntityKey::from_bytes(raw).ok()?;
        self.markers.iter().find_map(|marker| {
            let field = key.field(marker.column())?;
            let pos = marker.find_in(raw)?;
            if !self.layout.covers(raw, pos, marker.len()) {
                return None;
            }
            Some(Candidate {
                kind: marker.kind(),
                identifier: field.value.as_u64()?,
                project: Some(key.project.clone()),
            })
        })
    }
}

/// Marker-substring decoder
#[derive(Clone, Debug, Default)]
pub struct ScanDecoder {
    markers: MarkerTable,
    layout: KeyLayout,
}

impl ScanDecoder {
    /// Create a decoder reading identifiers at `layout` offsets
    #[must_use]
    pub const fn new(markers: MarkerTable, layout: KeyLayout) -> Self {
        Self { markers, layout }
    }
}

impl KeyDecoder for ScanDecoder {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn decode(&self, raw: &[u8]) -> Option<Candidate> {
        let (marker, pos) = self.markers.find(raw)?;
        let identifier = self.layout.read_id(raw, pos, marker.len())?;
        Some(Candidate {
            kind: marker.kind(),
            identifier,
            project: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{EntityField, FieldValue};
    use crate::testutil::marker;

    #[test]
    fn test_layout_decoder_resolves_catalog_column() {
        let raw = EntityKey::single("id_worker_id", 11, "fs").to_bytes();
        let candidate = LayoutDecoder::default().decode(&raw).unwrap();
        assert_eq!(candidate.kind, EntityKind::Worker);
        assert_eq!(candidate.identifier, 11);
        assert_eq!(candidate.project.as_deref(), Some("fs"));
    }

    #[test]
    fn test_layout_decoder_ignores_uncatalogued_column() {
        let raw = EntityKey::single("id_customer_id", 11, "fs").to_bytes();
        assert!(LayoutDecoder::default().decode(&raw).is_none());
    }

    #[test]
    fn test_layout_decoder_uses_marker_priority() {
        let key = EntityKey {
            fields: vec![
                EntityField {
                    name: "id_shift_id".into(),
                    value: FieldValue::Int32(3),
                },
                EntityField {
                    name: "id_business_id".into(),
                    value: FieldValue::Int64(9),
                },
            ],
            project: "fs".into(),
        };
        let candidate = LayoutDecoder::default().decode(&key.to_bytes()).unwrap();
        assert_eq!(candidate.kind, EntityKind::Business);
        assert_eq!(candidate.identifier, 9);
    }

    #[test]
    fn test_layout_decoder_needs_identifier_window() {
        let key = |project: &str| EntityKey {
            fields: vec![EntityField {
                name: "id_worker_id".into(),
                value: FieldValue::Int32(77),
            }],
            project: project.into(),
        };
        let decoder = LayoutDecoder::default();

        // marker at 12, window ends at 12 + 12 + 8 + 8 = 40
        for project in ["", "fs", "abc"] {
            let raw = key(project).to_bytes();
            assert!(raw.len() < 40);
            assert!(EntityKey::from_bytes(&raw).is_ok());
            assert!(decoder.decode(&raw).is_none(), "project {project:?}");
        }

        let raw = key("abcd").to_bytes();
        assert_eq!(raw.len(), 40);
        assert_eq!(decoder.decode(&raw).unwrap().identifier, 77);
    }

    #[test]
    fn test_layout_decoder_rejects_non_layout_bytes() {
        let mut raw = marker("id_worker_id");
        raw.extend_from_slice(&[0u8; 8]);
        raw.extend_from_slice(&42u64.to_le_bytes());
        assert!(LayoutDecoder::default().decode(&raw).is_none());
    }

    #[test]
    fn test_scan_decoder_reads_after_skip() {
        let mut raw = marker("id_worker_id");
        raw.extend_from_slice(&[0u8; 8]);
        raw.extend_from_slice(&42u64.to_le_bytes());

        let candidate = ScanDecoder::default().decode(&raw).unwrap();
        assert_eq!(candidate.kind, EntityKind::Worker);
        assert_eq!(candidate.identifier, 42);
        assert_eq!(candidate.project, None);
    }

    #[test]
    fn test_scan_decoder_truncated() {
        let mut raw = marker("id_shift_id");
        raw.extend_from_slice(&[0u8; 4]);
        raw.extend_from_slice(&7u64.to_le_bytes());
        assert!(ScanDecoder::default().decode(&raw).is_none());
    }

    #[test]
    fn test_scan_decoder_custom_layout() {
        let layout = KeyLayout::new(2, 4).unwrap();
        let decoder = ScanDecoder::new(MarkerTable::default(), layout);
        let mut raw = b"id_business_id".to_vec();
        raw.extend_from_slice(&[0xaa, 0xbb]);
        raw.extend_from_slice(&500u32.to_le_bytes());

        let candidate = decoder.decode(&raw).unwrap();
        assert_eq!(candidate.kind, EntityKind::Business);
        assert_eq!(candidate.identifier, 500);
    }
}
