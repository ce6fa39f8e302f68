//! Error types for model loading, capture and preview.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GazeError {
    #[error("Model file not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("Failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Preview error: {message}")]
    Preview { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type GazeResult<T> = Result<T, GazeError>;

impl GazeError {
    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn preview(msg: impl Into<String>) -> Self {
        Self::Preview {
            message: msg.into(),
        }
    }
}
