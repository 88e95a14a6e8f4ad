use crate::category::Category;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("missing weight for category '{0}'")]
    MissingWeight(Category),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid url '{0}': expected an http:// or https:// address")]
    InvalidUrl(String),
    #[error("page capture timed out after {0:?}")]
    CaptureTimeout(std::time::Duration),
    #[error("page capture failed: {0}")]
    CaptureFailed(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalyzerError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AnalyzerError::MissingWeight(_) | AnalyzerError::InvalidConfiguration(_)
        )
    }
}
