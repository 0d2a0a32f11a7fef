//! Configuration system

use std::time::Duration;

pub use serde::{Deserialize, Serialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        // Try different formats
        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Material manager settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Material loaded as the shared layers default
    pub default_layers_material: String,

    /// Diffuse texture used by the default materials and empty layer slots
    pub replace_me_texture: String,

    /// Diffuse texture of the placeholder used while an asset compiles
    pub placeholder_texture: String,

    /// Normal map used by layers whose base material has none
    pub flat_normal_texture: String,

    /// Folder scanned by decal preloading
    pub decals_folder: String,

    /// Load surface types when defaults are initialized
    pub load_surface_types_in_init: bool,

    /// Return the default material for every load (geometry preload mode)
    pub always_use_default: bool,

    /// Seconds between stall warnings while waiting on another thread's load (0 disables)
    pub stall_warning_secs: u64,
}

impl MaterialConfig {
    /// Stall warning interval, if enabled
    pub fn stall_warning_interval(&self) -> Option<Duration> {
        (self.stall_warning_secs > 0).then(|| Duration::from_secs(self.stall_warning_secs))
    }
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            default_layers_material: "Materials/material_layers_default".to_string(),
            replace_me_texture: "EngineAssets/TextureMsg/ReplaceMe.tif".to_string(),
            placeholder_texture: "EngineAssets/TextureMsg/color_White.tif".to_string(),
            flat_normal_texture: "EngineAssets/Textures/white_ddn.dds".to_string(),
            decals_folder: "Materials/Decals".to_string(),
            load_surface_types_in_init: true,
            always_use_default: false,
            stall_warning_secs: 10,
        }
    }
}

impl Config for MaterialConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materials.toml");
        let path = path.to_str().unwrap();

        let config = MaterialConfig {
            always_use_default: true,
            stall_warning_secs: 3,
            ..Default::default()
        };
        config.save_to_file(path).unwrap();

        let loaded = MaterialConfig::load_from_file(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materials.ron");
        std::fs::write(&path, "(decals_folder: \"Decals\")").unwrap();

        let loaded = MaterialConfig::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.decals_folder, "Decals");
        assert_eq!(loaded.placeholder_texture, MaterialConfig::default().placeholder_texture);
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materials.ini");
        std::fs::write(&path, "").unwrap();

        let result = MaterialConfig::load_from_file(path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_stall_interval() {
        let mut config = MaterialConfig::default();
        assert_eq!(config.stall_warning_interval(), Some(Duration::from_secs(10)));
        config.stall_warning_secs = 0;
        assert_eq!(config.stall_warning_interval(), None);
    }
}
