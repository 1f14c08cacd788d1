//! Key codec
//!
//! Runs the configured decoders in order and applies the plausibility
//! bound. Every failure mode resolves to `EntityKind::Unknown`.

use crate::decoder::{Candidate, KeyDecoder, LayoutDecoder, ScanDecoder};
use crate::layout::KeyLayout;
use crate::marker::MarkerTable;
use bytes::Bytes;
use featurekeys_common::config::{CodecConfig, DEFAULT_MAX_PLAUSIBLE_ID};
use featurekeys_common::{DecodedIdentifier, EntityKind, Result};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};

/// Decodes online-store cache keys into entity identifiers
pub struct KeyCodec {
    decoders: Vec<Box<dyn KeyDecoder>>,
    max_plausible_id: u64,
}

impl KeyCodec {
    /// Create a codec that tries strict layout parsing first and falls back
    /// to marker scanning
    #[must_use]
    pub fn new(markers: MarkerTable, layout: KeyLayout, max_plausible_id: u64) -> Self {
        let decoders: Vec<Box<dyn KeyDecoder>> = vec![
            Box::new(LayoutDecoder::new(markers.clone(), layout)),
            Box::new(ScanDecoder::new(markers, layout)),
        ];
        Self::with_decoders(decoders, max_plausible_id)
    }

    /// Create a codec from an explicit decoder chain
    #[must_use]
    pub fn with_decoders(decoders: Vec<Box<dyn KeyDecoder>>, max_plausible_id: u64) -> Self {
        Self {
            decoders,
            max_plausible_id,
        }
    }

    /// Build the codec from configuration
    pub fn from_config(config: &CodecConfig) -> Result<Self> {
        Ok(Self::new(
            MarkerTable::from_config(&config.markers)?,
            KeyLayout::from_config(config)?,
            config.max_plausible_id,
        ))
    }

    /// Largest identifier this codec accepts
    #[must_use]
    pub const fn max_plausible_id(&self) -> u64 {
        self.max_plausible_id
    }

    /// Decode one raw key. Never fails: malformed, truncated, unrecognised
    /// or implausible keys decode to `Unknown` with identifier 0.
    #[must_use]
    pub fn decode(&self, raw: &[u8]) -> DecodedIdentifier {
        let raw_key = Bytes::copy_from_slice(raw);
        match self.resolve(raw) {
            Some(candidate) => DecodedIdentifier {
                entity_kind: candidate.kind,
                identifier: candidate.identifier,
                raw_key,
                project: candidate.project,
            },
            None => DecodedIdentifier::unknown(raw_key),
        }
    }

    /// Decode every key and collect distinct identifiers per entity kind.
    ///
    /// Unknown keys are dropped. Every known kind is present in the result,
    /// with an empty set when nothing decoded to it.
    pub fn decode_batch<I, K>(&self, raw_keys: I) -> HashMap<EntityKind, HashSet<u64>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut sets: HashMap<EntityKind, HashSet<u64>> = EntityKind::KNOWN
            .iter()
            .map(|kind| (*kind, HashSet::new()))
            .collect();

        let mut unknown = 0usize;
        for raw in raw_keys {
            match self.resolve(raw.as_ref()) {
                Some(candidate) => {
                    sets.entry(candidate.kind)
                        .or_default()
                        .insert(candidate.identifier);
                }
                None => unknown += 1,
            }
        }

        if unknown > 0 {
            debug!(unknown, "skipped keys without a recognisable entity");
        }
        sets
    }

    pub(crate) fn resolve(&self, raw: &[u8]) -> Option<Candidate> {
        for decoder in &self.decoders {
            let Some(candidate) = decoder.decode(raw) else {
                continue;
            };
            if candidate.identifier <= self.max_plausible_id {
                return Some(candidate);
            }
            trace!(
                decoder = decoder.name(),
                identifier = candidate.identifier,
                "identifier above plausibility bound"
            );
        }
        None
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(
            MarkerTable::default(),
            KeyLayout::DEFAULT,
            DEFAULT_MAX_PLAUSIBLE_ID,
        )
    }
}

impl fmt::Debug for KeyCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.decoders.iter().map(|d| d.name()).collect();
        f.debug_struct("KeyCodec")
            .field("decoders", &names)
            .field("max_plausible_id", &self.max_plausible_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::EntityKey;
    use crate::testutil::{SAMPLE_KEY, marker};
    use featurekeys_common::config::MarkerConfig;
    use rand::rngs::StdRng;
    use rand::{Rng, RngCore, SeedableRng};

    fn scan_key(column: &str, padding: usize, identifier: u64) -> Vec<u8> {
        let mut raw = marker(column);
        raw.extend(std::iter::repeat_n(0u8, padding));
        raw.extend_from_slice(&identifier.to_le_bytes());
        raw
    }

    fn layout_key(column: &str, identifier: u64) -> Vec<u8> {
        EntityKey::single(column, identifier, "instawork_feature_store")
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_decode_worker() {
        let codec = KeyCodec::default();
        let raw = scan_key("id_worker_id", 8, 42);
        let decoded = codec.decode(&raw);
        assert_eq!(decoded.entity_kind, EntityKind::Worker);
        assert_eq!(decoded.identifier, 42);
        assert_eq!(decoded.raw_key.as_ref(), raw.as_slice());
    }

    #[test]
    fn test_decode_implausible_business() {
        let codec = KeyCodec::default();
        let decoded = codec.decode(&scan_key("id_business_id", 8, 99_999_999));
        assert_eq!(decoded.entity_kind, EntityKind::Unknown);
        assert_eq!(decoded.identifier, 0);

        let decoded = codec.decode(&layout_key("id_business_id", 99_999_999));
        assert_eq!(decoded.entity_kind, EntityKind::Unknown);
    }

    #[test]
    fn test_decode_truncated_shift() {
        let codec = KeyCodec::default();
        let decoded = codec.decode(&scan_key("id_shift_id", 4, 7));
        assert_eq!(decoded.entity_kind, EntityKind::Unknown);
        assert_eq!(decoded.identifier, 0);
    }

    #[test]
    fn test_plausibility_bound_is_inclusive() {
        let codec = KeyCodec::default();
        let at_bound = codec.decode(&scan_key("id_worker_id", 8, 10_000_000));
        assert_eq!(at_bound.entity_kind, EntityKind::Worker);
        assert_eq!(at_bound.identifier, 10_000_000);

        let above = codec.decode(&scan_key("id_worker_id", 8, 10_000_001));
        assert_eq!(above.entity_kind, EntityKind::Unknown);
    }

    #[test]
    fn test_decode_sample_key() {
        let decoded = KeyCodec::default().decode(SAMPLE_KEY);
        assert_eq!(decoded.entity_kind, EntityKind::Business);
        assert_eq!(decoded.identifier, 26546);
        assert_eq!(decoded.project.as_deref(), Some("instawork_feature_store"));
    }

    #[test]
    fn test_layout_and_scan_agree() {
        let codec = KeyCodec::default();
        let scan_only = KeyCodec::with_decoders(
            vec![Box::new(ScanDecoder::default()) as Box<dyn KeyDecoder>],
            DEFAULT_MAX_PLAUSIBLE_ID,
        );
        for (column, kind) in [
            ("id_worker_id", EntityKind::Worker),
            ("id_business_id", EntityKind::Business),
            ("id_shift_id", EntityKind::Shift),
        ] {
            for identifier in [0, 1, 11, 26546, 9_999_999] {
                let raw = layout_key(column, identifier);
                let full = codec.decode(&raw);
                let scanned = scan_only.decode(&raw);
                assert_eq!(full.entity_kind, kind);
                assert_eq!(full.identifier, identifier);
                assert_eq!(scanned.entity_kind, full.entity_kind);
                assert_eq!(scanned.identifier, full.identifier);
            }
        }
    }

    #[test]
    fn test_int32_identifier_needs_layout() {
        let key = EntityKey {
            fields: vec![crate::layout::EntityField {
                name: "id_worker_id".into(),
                value: crate::layout::FieldValue::Int32(77),
            }],
            project: "instawork_feature_store".into(),
        };
        let decoded = KeyCodec::default().decode(&key.to_bytes());
        assert_eq!(decoded.entity_kind, EntityKind::Worker);
        assert_eq!(decoded.identifier, 77);
    }

    #[test]
    fn test_short_int32_key_is_unknown() {
        let key = EntityKey {
            fields: vec![crate::layout::EntityField {
                name: "id_worker_id".into(),
                value: crate::layout::FieldValue::Int32(77),
            }],
            project: String::new(),
        };
        let raw = key.to_bytes();
        let bound = KeyLayout::DEFAULT
            .id_range(12, "id_worker_id".len())
            .unwrap()
            .end;
        assert!(raw.len() < bound);

        let decoded = KeyCodec::default().decode(&raw);
        assert_eq!(decoded.entity_kind, EntityKind::Unknown);
        assert_eq!(decoded.identifier, 0);
    }

    #[test]
    fn test_decode_no_marker() {
        let codec = KeyCodec::default();
        for raw in [
            &b""[..],
            b"instawork_feature_store",
            b"id_customer_id\x00\x00\x00\x00\x00\x00\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00",
        ] {
            assert_eq!(codec.decode(raw).entity_kind, EntityKind::Unknown);
        }
        assert_eq!(
            codec.decode(&layout_key("id_customer_id", 5)).entity_kind,
            EntityKind::Unknown
        );
    }

    #[test]
    fn test_decode_is_idempotent() {
        let codec = KeyCodec::default();
        for raw in [SAMPLE_KEY.to_vec(), scan_key("id_worker_id", 8, 3), vec![0xff; 5]] {
            assert_eq!(codec.decode(&raw), codec.decode(&raw));
        }
    }

    #[test]
    fn test_every_truncation_is_unknown() {
        let codec = KeyCodec::default();
        let raw = scan_key("id_worker_id", 8, 42);
        // marker prefix (4) + marker (12) + skip (8) + identifier (8)
        assert_eq!(raw.len(), 32);
        for len in 0..raw.len() {
            let decoded = codec.decode(&raw[..len]);
            assert_eq!(decoded.entity_kind, EntityKind::Unknown, "len {len}");
            assert_eq!(decoded.identifier, 0);
        }
    }

    #[test]
    fn test_random_bytes_never_panic() {
        let codec = KeyCodec::default();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..2000 {
            let len = rng.gen_range(0..96);
            let mut raw = vec![0u8; len];
            rng.fill_bytes(&mut raw);

            // splice a marker in at a random place half of the time
            if rng.gen_bool(0.5) {
                let column = ["id_worker_id", "id_business_id", "id_shift_id"][rng.gen_range(0..3)];
                let at = rng.gen_range(0..=raw.len());
                let tail = raw.split_off(at);
                raw.extend_from_slice(column.as_bytes());
                raw.extend(tail);
            }

            let decoded = codec.decode(&raw);
            if decoded.is_known() {
                assert!(decoded.identifier <= codec.max_plausible_id());
            } else {
                assert_eq!(decoded.identifier, 0);
            }
        }
    }

    #[test]
    fn test_decode_batch_collapses_duplicates() {
        let codec = KeyCodec::default();
        let worker_11 = layout_key("id_worker_id", 11);
        let business_99 = layout_key("id_business_id", 99);

        let sets = codec.decode_batch([&worker_11, &worker_11, &business_99]);
        assert_eq!(sets[&EntityKind::Worker], HashSet::from([11]));
        assert_eq!(sets[&EntityKind::Business], HashSet::from([99]));
        assert!(sets[&EntityKind::Shift].is_empty());
        assert!(!sets.contains_key(&EntityKind::Unknown));

        assert_eq!(
            codec.decode_batch([&worker_11, &worker_11]),
            codec.decode_batch([&worker_11])
        );
    }

    #[test]
    fn test_decode_batch_empty_and_garbage() {
        let codec = KeyCodec::default();
        let sets = codec.decode_batch(Vec::<Vec<u8>>::new());
        assert_eq!(sets.len(), 3);
        assert!(sets.values().all(HashSet::is_empty));

        let sets = codec.decode_batch([b"junk".to_vec(), scan_key("id_shift_id", 8, 5)]);
        assert_eq!(sets[&EntityKind::Shift], HashSet::from([5]));
    }

    #[test]
    fn test_from_config() {
        let config = CodecConfig {
            max_plausible_id: 100,
            markers: vec![MarkerConfig::new("shift_ref", EntityKind::Shift)],
            ..CodecConfig::default()
        };
        let codec = KeyCodec::from_config(&config).unwrap();
        assert_eq!(codec.max_plausible_id(), 100);

        let decoded = codec.decode(&scan_key("shift_ref", 8, 100));
        assert_eq!(decoded.entity_kind, EntityKind::Shift);
        assert_eq!(codec.decode(&scan_key("id_worker_id", 8, 1)).entity_kind, EntityKind::Unknown);

        let bad = CodecConfig {
            id_width: 12,
            ..CodecConfig::default()
        };
        assert!(KeyCodec::from_config(&bad).is_err());
    }
}
