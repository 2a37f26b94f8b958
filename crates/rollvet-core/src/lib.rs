//! rollvet shared types, configuration, and duration parsing.
//!
//! Everything the probe, driver, and verify crates agree on lives
//! here: the sample/rollout vocabulary, the `rollvet.toml` config
//! schema, and the human-duration parser used by both.

pub mod config;
pub mod duration;
pub mod types;

pub use config::{ConfigError, VerifyConfig};
pub use duration::parse_duration;
pub use types::*;
