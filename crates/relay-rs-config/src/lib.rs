//! Configuration models and layered config loading.
//!
//! This crate owns the gateway config schema, validation, and the JSON5
//! layer-merging logic used by the `relay` binary and tests.

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{
    ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions, QUALIFIED_NAME_SEPARATOR,
};
/// Configuration schema models.
pub use model::*;
