//! Water-Level Store/Source error taxonomy.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum WaterLevelError {
    #[error("sensor API unavailable: {0}")]
    SensorUnavailable(String),

    #[error("reading rejected as invalid: field {field_id}, value {value_mm}")]
    InvalidReading { field_id: String, value_mm: f64 },

    #[error("failed to persist water-level store to {0}: {1}")]
    PersistIo(PathBuf, std::io::Error),

    #[error("failed to load water-level store from {0}: {1}")]
    LoadIo(PathBuf, std::io::Error),

    #[error("failed to (de)serialize water-level store: {0}")]
    Serde(#[from] serde_json::Error),
}
