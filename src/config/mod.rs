use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::capture::CameraFacing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "fishtrack";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_FALLBACK_TEMP_DIR: &str = "/tmp/fishtrack";
const DEFAULT_PRUNE_AFTER_HOURS: u64 = 24;

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera_device: PathBuf,
    pub camera_facing: CameraFacing,
    pub data_dir: Option<PathBuf>,
    pub offline_mode: bool,
    pub prune_temp_after_hours: u64,
    pub desktop_notifications: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera_device: PathBuf::from(DEFAULT_CAMERA_DEVICE),
            camera_facing: CameraFacing::Environment,
            data_dir: None,
            offline_mode: true,
            prune_temp_after_hours: DEFAULT_PRUNE_AFTER_HOURS,
            desktop_notifications: true,
        }
    }
}

impl AppConfig {
    /// Configured data directory, else `$XDG_DATA_HOME/fishtrack` or `~/.local/share/fishtrack`.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigPathError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let (xdg_data_home, home) = data_env_dirs();
        data_dir_path(APP_DIR, xdg_data_home.as_deref(), home.as_deref())
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

fn data_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_config_home, home, ".config")?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn data_dir_path(
    app_dir: &str,
    xdg_data_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_data_home, home, ".local/share")?;
    path.push(app_dir);
    Ok(path)
}

fn xdg_root(
    xdg_dir: Option<&Path>,
    home: Option<&Path>,
    home_relative: &str,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_dir.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(home_relative))
}

/// `$XDG_RUNTIME_DIR/fishtrack`, else `/tmp/fishtrack`.
pub fn runtime_temp_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(dir).join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_FALLBACK_TEMP_DIR))
}
