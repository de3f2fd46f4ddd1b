use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

/// Default location of the server configuration.
pub const DEFAULT_CONFIG_PATH: &str = "config/advancements.toml";

/// Server-side advancement settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding data packs.
    pub data_packs_dir: PathBuf,
    /// Directory holding per-player progress files.
    pub player_data_dir: PathBuf,
    /// `announceAdvancements` game rule.
    pub announce_advancements: bool,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_packs_dir: PathBuf::from("datapacks"),
            player_data_dir: PathBuf::from("world/advancements"),
            announce_advancements: true,
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ServerConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ServerConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else if path != Path::new(DEFAULT_CONFIG_PATH) {
                    warn!("Config not found at {}. Using defaults", path.display());
                }
                ServerConfig::default()
            }
        }
    }

    /// Save to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("advancements.toml");
        fs::write(&path, "announce_advancements = false\n").unwrap();

        let config = ServerConfig::load_from_path(&path);
        assert!(!config.announce_advancements);
        assert_eq!(config.data_packs_dir, PathBuf::from("datapacks"));
    }

    #[test]
    fn invalid_or_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "announce_advancements = \"maybe\"").unwrap();
        assert_eq!(ServerConfig::load_from_path(&path), ServerConfig::default());
        assert_eq!(
            ServerConfig::load_from_path(&dir.path().join("missing.toml")),
            ServerConfig::default()
        );
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/advancements.toml");
        let config = ServerConfig {
            log_filter: "debug".to_string(),
            ..ServerConfig::default()
        };
        config.save_to_path(&path).unwrap();
        assert_eq!(ServerConfig::load_from_path(&path), config);
    }
}
