use crate::config::ConfigError;
use thiserror::Error;

pub type OverlayResult<T> = std::result::Result<T, OverlayError>;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid page markup: {0}")]
    Markup(#[from] serde_json::Error),
}
