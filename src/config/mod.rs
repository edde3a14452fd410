//! Gateway configuration
//!
//! Layered from defaults, a TOML file and `GATEKEEPER__*` environment
//! variables. See [`loader`] for the precedence rules.

pub mod loader;
pub mod types;

pub use loader::{load_config, load_config_from_str};
pub use types::*;
