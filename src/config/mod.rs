use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("zoom bounds must be finite and positive: min={min}, max={max}")]
    InvalidZoomBounds { min: f64, max: f64 },
    #[error("min_zoom {min} exceeds max_zoom {max}")]
    InvertedZoomBounds { min: f64, max: f64 },
    #[error("zoom_step must be finite and positive, got {0}")]
    InvalidZoomStep(f64),
    #[error("base_page_width must be finite and positive, got {0}")]
    InvalidBasePageWidth(f64),
    #[error("initial_zoom must be finite, got {0}")]
    InvalidInitialZoom(f64),
    #[error("probe_timeout_ms must be at least 1; omit it to wait without limit")]
    ZeroProbeTimeout,
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

const APP_DIR: &str = "webtoon-overlay";
const APP_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_FALLBACK_EXTENSIONS: [&str; 5] = [".jpeg", ".png", ".webp", ".gif", ".avif"];
pub const DEFAULT_MIN_ZOOM: f64 = 0.3;
pub const DEFAULT_MAX_ZOOM: f64 = 3.0;
pub const DEFAULT_ZOOM_STEP: f64 = 0.1;
pub const DEFAULT_INITIAL_ZOOM: f64 = 1.0;
pub const DEFAULT_BASE_PAGE_WIDTH: f64 = 900.0;

/// Engine settings from `config.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tried in this order after the authored extension.
    pub fallback_extensions: Vec<String>,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub zoom_step: f64,
    pub initial_zoom: f64,
    /// Page max width at zoom 1.0, in px.
    pub base_page_width: f64,
    /// Unset means a load attempt may wait forever. Zero is rejected.
    pub probe_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_extensions: DEFAULT_FALLBACK_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            zoom_step: DEFAULT_ZOOM_STEP,
            initial_zoom: DEFAULT_INITIAL_ZOOM,
            base_page_width: DEFAULT_BASE_PAGE_WIDTH,
            probe_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }

    /// Checks numeric settings and normalizes extensions to carry a leading dot.
    pub fn validate(mut self) -> ConfigResult<Self> {
        let positive = |value: f64| value.is_finite() && value > 0.0;

        if !positive(self.min_zoom) || !positive(self.max_zoom) {
            return Err(ConfigError::InvalidZoomBounds {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::InvertedZoomBounds {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if !positive(self.zoom_step) {
            return Err(ConfigError::InvalidZoomStep(self.zoom_step));
        }
        if !positive(self.base_page_width) {
            return Err(ConfigError::InvalidBasePageWidth(self.base_page_width));
        }
        if !self.initial_zoom.is_finite() {
            return Err(ConfigError::InvalidInitialZoom(self.initial_zoom));
        }
        if self.probe_timeout_ms == Some(0) {
            return Err(ConfigError::ZeroProbeTimeout);
        }

        self.fallback_extensions = self
            .fallback_extensions
            .iter()
            .map(|ext| ext.trim())
            .filter(|ext| !ext.is_empty() && *ext != ".")
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.to_string()
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        Ok(self)
    }
}

pub fn load_engine_config() -> EngineConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_engine_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_engine_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> EngineConfig {
    let Ok(path) = engine_config_path(xdg_config_home, home) else {
        tracing::debug!("no config directory available; using defaults");
        return EngineConfig::default();
    };
    if !path.exists() {
        return EngineConfig::default();
    }
    let parsed = match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str::<EngineConfig>(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            EngineConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            return EngineConfig::default();
        }
    };
    parsed.validate().unwrap_or_else(|err| {
        tracing::warn!(%err, ?path, "rejected config.json values; using defaults");
        EngineConfig::default()
    })
}

fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

/// `$XDG_CONFIG_HOME/webtoon-overlay/config.json`, else under `$HOME/.config`.
pub(crate) fn engine_config_path(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let root = match xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        Some(xdg) => xdg.to_path_buf(),
        None => home
            .ok_or(ConfigPathError::MissingHomeDirectory)?
            .join(".config"),
    };
    Ok(root.join(APP_DIR).join(APP_CONFIG_FILE))
}
