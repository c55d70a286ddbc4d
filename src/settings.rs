use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::render::geometry::SizeI;
use crate::render::{MAX_BITMAPS_CACHED, MAX_PAGE_REQUESTS};

const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "pagerender";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Tile size in device pixels as stored in the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: i32,
    pub height: i32,
}

impl From<TileSize> for SizeI {
    fn from(size: TileSize) -> Self {
        SizeI::new(size.width, size.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "default_max_bitmaps_cached")]
    pub max_bitmaps_cached: usize,

    #[serde(default = "default_max_page_requests")]
    pub max_page_requests: usize,

    /// Starting tile size limit; shrinks when the display runs out of resources
    #[serde(default = "default_max_tile_size")]
    pub max_tile_size: TileSize,

    #[serde(default = "default_min_tile_dimension")]
    pub min_tile_dimension: i32,

    #[serde(default = "default_cancel_poll_interval_ms")]
    pub cancel_poll_interval_ms: u64,

    /// Paint out-of-date or other-zoom bitmaps while fresh ones render
    #[serde(default = "default_true")]
    pub use_stale_tiles: bool,

    #[serde(default = "default_visible_tile_fuzz")]
    pub visible_tile_fuzz: f32,
}

fn default_true() -> bool {
    true
}

fn default_max_bitmaps_cached() -> usize {
    MAX_BITMAPS_CACHED
}

fn default_max_page_requests() -> usize {
    MAX_PAGE_REQUESTS
}

fn default_max_tile_size() -> TileSize {
    TileSize {
        width: 1920,
        height: 1080,
    }
}

fn default_min_tile_dimension() -> i32 {
    200
}

fn default_cancel_poll_interval_ms() -> u64 {
    50
}

fn default_visible_tile_fuzz() -> f32 {
    2.0
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_bitmaps_cached: default_max_bitmaps_cached(),
            max_page_requests: default_max_page_requests(),
            max_tile_size: default_max_tile_size(),
            min_tile_dimension: default_min_tile_dimension(),
            cancel_poll_interval_ms: default_cancel_poll_interval_ms(),
            use_stale_tiles: true,
            visible_tile_fuzz: default_visible_tile_fuzz(),
        }
    }
}

/// `<config dir>/pagerender/config.yaml`, if the platform has a config dir
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `path`; a missing file yields the defaults
pub fn load_settings_from(path: &Path) -> Result<RenderSettings, SettingsError> {
    if !path.exists() {
        info!("Settings file {path:?} not found, using defaults");
        return Ok(RenderSettings::default());
    }
    let content = fs::read_to_string(path).map_err(|source| {
        error!("Failed to read settings file {path:?}: {source}");
        SettingsError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let settings = serde_yaml::from_str::<RenderSettings>(&content).map_err(|source| {
        error!("Failed to parse settings file {path:?}: {source}");
        SettingsError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!("Loaded settings from {path:?}");
    Ok(settings)
}

pub fn save_settings_to(path: &Path, settings: &RenderSettings) -> Result<(), SettingsError> {
    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.exists()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = serde_yaml::to_string(settings).map_err(|source| SettingsError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(io_err)?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(settings, RenderSettings::default());
        assert_eq!(settings.max_bitmaps_cached, 64);
        assert_eq!(settings.max_page_requests, 8);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "max_page_requests: 3\nuse_stale_tiles: false\n").unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.max_page_requests, 3);
        assert!(!settings.use_stale_tiles);
        assert_eq!(settings.max_tile_size, default_max_tile_size());
    }

    #[test]
    fn save_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let settings = RenderSettings {
            max_bitmaps_cached: 12,
            min_tile_dimension: 64,
            ..RenderSettings::default()
        };
        save_settings_to(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "max_page_requests: [oops").unwrap();
        assert!(matches!(
            load_settings_from(&path),
            Err(SettingsError::Yaml { .. })
        ));
    }
}
