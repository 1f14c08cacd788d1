//! Keyspace audit and reconciliation
//!
//! [`KeyAudit`] folds a key dump into a [`ScanReport`]; [`Reconciliation`]
//! compares a report against the identifiers an operator expects to be
//! materialized.

use crate::codec::KeyCodec;
use featurekeys_common::EntityKind;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write;
use tracing::debug;

/// Accumulates decode results over a keyspace scan
#[derive(Debug)]
pub struct KeyAudit<'a> {
    codec: &'a KeyCodec,
    total_keys: usize,
    unknown_keys: usize,
    entities: HashMap<EntityKind, HashSet<u64>>,
    projects: BTreeSet<String>,
}

impl<'a> KeyAudit<'a> {
    /// Start an audit using `codec`
    #[must_use]
    pub fn new(codec: &'a KeyCodec) -> Self {
        Self {
            codec,
            total_keys: 0,
            unknown_keys: 0,
            entities: EntityKind::KNOWN
                .iter()
                .map(|kind| (*kind, HashSet::new()))
                .collect(),
            projects: BTreeSet::new(),
        }
    }

    /// Decode one key and record the result
    pub fn observe(&mut self, raw: &[u8]) -> EntityKind {
        self.total_keys += 1;
        let Some(candidate) = self.codec.resolve(raw) else {
            self.unknown_keys += 1;
            return EntityKind::Unknown;
        };
        self.entities
            .entry(candidate.kind)
            .or_default()
            .insert(candidate.identifier);
        if let Some(project) = candidate.project {
            self.projects.insert(project);
        }
        candidate.kind
    }

    /// Decode and record every key
    pub fn observe_all<I, K>(&mut self, raw_keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        for raw in raw_keys {
            self.observe(raw.as_ref());
        }
    }

    /// Finish the audit and produce the report
    #[must_use]
    pub fn finish(self) -> ScanReport {
        if self.unknown_keys > 0 {
            debug!(
                unknown = self.unknown_keys,
                total = self.total_keys,
                "keys without a recognisable entity"
            );
        }

        let entities = self
            .entities
            .into_iter()
            .map(|(kind, ids)| {
                let mut ids: Vec<u64> = ids.into_iter().collect();
                ids.sort_unstable();
                (kind, ids)
            })
            .collect();

        ScanReport {
            total_keys: self.total_keys,
            decoded_keys: self.total_keys - self.unknown_keys,
            unknown_keys: self.unknown_keys,
            projects: self.projects.into_iter().collect(),
            entities,
        }
    }
}

/// Summary of one keyspace scan
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Keys examined
    pub total_keys: usize,
    /// Keys that resolved to a known entity
    pub decoded_keys: usize,
    /// Keys that did not
    pub unknown_keys: usize,
    /// Distinct project namespaces seen in parseable keys
    pub projects: Vec<String>,
    /// Sorted distinct identifiers per entity kind
    pub entities: BTreeMap<EntityKind, Vec<u64>>,
}

impl ScanReport {
    /// Sorted identifiers found for `kind`
    #[must_use]
    pub fn ids(&self, kind: EntityKind) -> &[u64] {
        self.entities.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct identifiers found for `kind`
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.ids(kind).len()
    }

    /// Render as human-readable text, optionally listing every identifier
    #[must_use]
    pub fn render(&self, show_ids: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Cache Key Summary");
        let _ = writeln!(out, "=================");
        let _ = writeln!(out, "Total keys:    {}", self.total_keys);
        let _ = writeln!(out, "Decoded keys:  {}", self.decoded_keys);
        let _ = writeln!(out, "Unknown keys:  {}", self.unknown_keys);
        let projects = if self.projects.is_empty() {
            "-".to_string()
        } else {
            self.projects.join(", ")
        };
        let _ = writeln!(out, "Projects:      {projects}");
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<12} {:>10}", "ENTITY", "UNIQUE IDS");
        let _ = writeln!(out, "{}", "-".repeat(23));
        for (kind, ids) in &self.entities {
            let _ = writeln!(out, "{:<12} {:>10}", kind.to_string(), ids.len());
        }

        if show_ids {
            for (kind, ids) in &self.entities {
                let _ = writeln!(out);
                let _ = writeln!(out, "{kind} IDs:");
                let _ = writeln!(out, "  {}", join_ids(ids));
            }
        }
        out
    }
}

/// Reconciliation result for one entity kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindReconciliation {
    /// Number of identifiers expected
    pub expected: usize,
    /// Expected and present in the cache
    pub materialized: Vec<u64>,
    /// Expected but absent from the cache
    pub missing: Vec<u64>,
    /// Present in the cache but not expected
    pub unexpected: Vec<u64>,
}

/// Comparison of expected identifiers against a scan
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub kinds: BTreeMap<EntityKind, KindReconciliation>,
}

impl Reconciliation {
    /// Compare expected identifiers per kind with what a scan found.
    ///
    /// Kinds without expectations are left out of the result.
    #[must_use]
    pub fn compare(expected: &BTreeMap<EntityKind, BTreeSet<u64>>, report: &ScanReport) -> Self {
        let kinds = expected
            .iter()
            .filter(|(kind, _)| kind.is_known())
            .map(|(kind, wanted)| {
                let found: BTreeSet<u64> = report.ids(*kind).iter().copied().collect();
                let entry = KindReconciliation {
                    expected: wanted.len(),
                    materialized: wanted.intersection(&found).copied().collect(),
                    missing: wanted.difference(&found).copied().collect(),
                    unexpected: found.difference(wanted).copied().collect(),
                };
                (*kind, entry)
            })
            .collect();
        Self { kinds }
    }

    /// Whether every expected identifier was found
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.kinds.values().all(|k| k.missing.is_empty())
    }

    /// Total expected identifiers missing from the cache
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.kinds.values().map(|k| k.missing.len()).sum()
    }

    /// Render as human-readable text
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Reconciliation");
        let _ = writeln!(out, "==============");
        if self.kinds.is_empty() {
            let _ = writeln!(out, "No expected identifiers given");
            return out;
        }
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>14} {:>10} {:>12}",
            "ENTITY", "EXPECTED", "MATERIALIZED", "MISSING", "UNEXPECTED"
        );
        let _ = writeln!(out, "{}", "-".repeat(62));
        for (kind, entry) in &self.kinds {
            let _ = writeln!(
                out,
                "{:<12} {:>10} {:>14} {:>10} {:>12}",
                kind.to_string(),
                entry.expected,
                entry.materialized.len(),
                entry.missing.len(),
                entry.unexpected.len()
            );
        }
        for (kind, entry) in &self.kinds {
            if !entry.missing.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "Missing {kind} IDs:");
                let _ = writeln!(out, "  {}", join_ids(&entry.missing));
            }
        }
        out
    }
}

fn join_ids(ids: &[u64]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
