//! Error types for Collage

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Collage operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("projection error: {0}")]
    Projection(String),

    #[error("relocation error: {0}")]
    Relocation(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for Collage operations
pub type Result<T> = std::result::Result<T, Error>;
