//! Configuration model for folio.
//!
//! This module defines the Config struct that represents
//! `<data root>/.folio/config.yaml`. The file lives in the shared data root,
//! so every session coordinating through that root uses the same timings.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! defaults for every field, and validation of the heartbeat/staleness ratio.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use types::MIN_STALE_TO_HEARTBEAT_RATIO;
