use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to load model from {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("Failed to load class labels: {0}")]
    Labels(String),
    #[error("Error decoding image: {0}")]
    Decode(String),
    #[error("Prediction Error: {0}")]
    Inference(String),
    #[error("Error encoding image: {0}")]
    Encode(String),
}

impl SegmentationError {
    /// Startup-time failures; the process cannot serve predictions after one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SegmentationError::Configuration(_)
                | SegmentationError::ModelLoad { .. }
                | SegmentationError::Labels(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SegmentationError::Configuration(_) => "configuration",
            SegmentationError::ModelLoad { .. } => "model_load",
            SegmentationError::Labels(_) => "labels",
            SegmentationError::Decode(_) => "decode",
            SegmentationError::Inference(_) => "inference",
            SegmentationError::Encode(_) => "encode",
        }
    }
}

impl From<ndarray::ShapeError> for SegmentationError {
    fn from(err: ndarray::ShapeError) -> Self {
        SegmentationError::Inference(format!("invalid tensor shape: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, SegmentationError>;
