//! Configuration model and layered config loading for chatline.
//!
//! Layers are discovered from the user's home directory, the working
//! directory, and explicit runtime paths, merged in that order, and
//! validated into a single [`ChatlineConfig`].

mod error;
mod loader;
mod model;

/// Public error type returned by config loading and validation APIs.
pub use error::ConfigError;
/// Layered config types and loader options.
pub use loader::{ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions};
/// Configuration schema models.
pub use model::*;
