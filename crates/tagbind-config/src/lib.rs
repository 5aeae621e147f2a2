//! Tagbind configuration
//!
//! Serialized shapes of the binding configuration asset and the tag
//! registry asset, plus the runtime settings read at startup. Assets are
//! read with the `config` crate; the format follows the file extension
//! (TOML, YAML or JSON).

pub mod asset;
pub mod error;
pub mod loader;
pub mod settings;

pub use asset::{BinderAsset, BindingRecord};
pub use error::{ConfigError, Result};
pub use loader::{AssetFormat, ConfigLoader};
pub use settings::RuntimeSettings;
