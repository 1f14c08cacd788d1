//! featurekeys Codec - Online-store cache key decoding
//!
//! Decodes the binary entity keys the feature store writes into its
//! online cache, and folds whole key dumps into per-entity reports.
//!
//! Decoding is total: malformed, truncated or unfamiliar keys resolve to
//! [`EntityKind::Unknown`](featurekeys_common::EntityKind::Unknown) so a
//! scan over an uncontrolled keyspace never aborts on a single record.

pub mod audit;
pub mod codec;
pub mod decoder;
pub mod layout;
pub mod marker;

#[cfg(test)]
mod testutil;

pub use audit::{KeyAudit, KindReconciliation, Reconciliation, ScanReport};
pub use codec::KeyCodec;
pub use decoder::{Candidate, KeyDecoder, LayoutDecoder, ScanDecoder};
pub use layout::{EntityField, EntityKey, FieldValue, KeyLayout};
pub use marker::{EntityMarker, MarkerTable};
