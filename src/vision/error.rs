use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Source not found or could not be opened: {path}")]
    SourceNotFound { path: String },
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Failed to write output {path}: {reason}")]
    Output { path: PathBuf, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    pub fn source_not_found(path: impl std::fmt::Display) -> Self {
        VisionError::SourceNotFound {
            path: path.to_string(),
        }
    }
}
