//! featurekeys client - sources of raw online-store cache keys
//!
//! Keys can come from a live Redis keyspace, a hex dump file, or memory.
//! All sources implement [`KeySource`].

pub mod dump;
pub mod memory;
pub mod redis;
pub mod source;

// Re-exports
pub use dump::DumpFileSource;
pub use memory::MemoryKeySource;
pub use crate::redis::RedisKeySource;
pub use source::KeySource;
