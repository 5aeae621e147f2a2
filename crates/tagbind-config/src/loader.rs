//! Loading and saving of assets and settings

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use tagbind_common::TagDatabase;

use crate::asset::BinderAsset;
use crate::error::{ConfigError, Result};
use crate::settings::RuntimeSettings;

/// On-disk formats understood by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Toml,
    Yaml,
    Json,
}

impl AssetFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "toml" => Ok(AssetFormat::Toml),
            "yaml" | "yml" => Ok(AssetFormat::Yaml),
            "json" => Ok(AssetFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            AssetFormat::Toml => {
                toml::to_string_pretty(value).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            AssetFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            AssetFormat::Json => {
                serde_json::to_string_pretty(value).map_err(|e| ConfigError::Parse(e.to_string()))
            }
        }
    }
}

/// Loads assets from disk and settings from file plus environment
pub struct ConfigLoader {
    settings_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            settings_path: Self::default_settings_path(),
            env_prefix: "TAGBIND".to_string(),
        }
    }

    /// Use a custom settings file
    pub fn with_settings_path(path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: path.into(),
            env_prefix: "TAGBIND".to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    fn default_settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tagbind")
            .join("settings.toml")
    }

    /// Settings file (optional) layered under `<PREFIX>_*` variables
    pub fn load_settings(&self) -> Result<RuntimeSettings> {
        let config = Config::builder()
            .set_default("early_binding", false)?
            .set_default("log_level", "info")?
            .add_source(File::from(self.settings_path.clone()).required(false))
            .add_source(Environment::with_prefix(&self.env_prefix).try_parsing(true))
            .build()?;

        let settings: RuntimeSettings = config.try_deserialize()?;
        debug!(
            path = %self.settings_path.display(),
            platform = %settings.effective_platform(),
            early_binding = settings.early_binding,
            "Loaded runtime settings"
        );
        Ok(settings)
    }

    /// Read a binding configuration asset
    pub fn load_binder_asset(&self, path: &Path) -> Result<BinderAsset> {
        let asset: BinderAsset = read_asset(path)?;
        asset.validate()?;
        for record in asset.shadowed() {
            warn!(
                capability = %record.capability,
                implementation = %record.implementation,
                tag = %record.tag,
                "Binding is shadowed by an earlier one and will never be used"
            );
        }
        info!(path = %path.display(), bindings = asset.bindings.len(), "Loaded binder asset");
        Ok(asset)
    }

    /// Read a tag registry asset
    pub fn load_tag_database(&self, path: &Path) -> Result<TagDatabase> {
        let database: TagDatabase = read_asset(path)?;
        info!(path = %path.display(), tags = database.len(), "Loaded tag database");
        Ok(database)
    }

    pub fn save_binder_asset(&self, asset: &BinderAsset, path: &Path) -> Result<()> {
        asset.validate()?;
        write_asset(asset, path)
    }

    pub fn save_tag_database(&self, database: &TagDatabase, path: &Path) -> Result<()> {
        write_asset(database, path)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_asset<T: DeserializeOwned>(path: &Path) -> Result<T> {
    AssetFormat::from_path(path)?;
    if !path.exists() {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("asset not found: {}", path.display()),
        )));
    }

    let config = Config::builder()
        .add_source(File::from(path.to_path_buf()))
        .build()?;
    Ok(config.try_deserialize()?)
}

fn write_asset<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let format = AssetFormat::from_path(path)?;
    let content = format.serialize(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    debug!(path = %path.display(), "Wrote asset");
    Ok(())
}
