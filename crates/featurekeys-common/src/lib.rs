//! featurekeys Common - Shared types and utilities
//!
//! This crate provides the entity types, error definitions and
//! configuration shared by the codec, the key sources and the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
