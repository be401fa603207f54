use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Report not found: {channel_id} @ {timestamp}")]
    NotFound { channel_id: String, timestamp: i64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Corrupt cache entry {key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gemini API error: {0}")]
    GeminiApi(String),

    #[error("YouTube API error: {0}")]
    YouTubeApi(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failures of the key-value substrate behind the report cache.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("quota exceeded: write needs {needed} bytes, quota is {quota} bytes")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("backend failure: {0}")]
    Backend(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl From<tokio_rusqlite::Error> for StorageError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
