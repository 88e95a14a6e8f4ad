//! Seams to the outside world: page capture, file uploads and run logging.
//! Real browser automation and cloud clients live outside this crate.

use image::RgbImage;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPage {
    pub title: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads `url`, writes a full-page screenshot to `screenshot_path` and
/// returns the page title and rendered HTML.
pub trait PageCapture: Send + Sync {
    fn capture(&self, url: &str, screenshot_path: &Path) -> Result<CapturedPage, CaptureError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    pub id: String,
    pub web_view_link: String,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream not configured")]
    NotConfigured,
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

pub trait Uploader: Send + Sync {
    fn upload(&self, path: &Path) -> Result<UploadedFile, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLogRow {
    pub url: String,
    pub timestamp: String,
    pub overall: u8,
    pub label: String,
    pub pdf_link: Option<String>,
}

pub trait RunLogger: Send + Sync {
    fn append(&self, row: &RunLogRow) -> Result<(), UpstreamError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUploader;

impl Uploader for NoopUploader {
    fn upload(&self, _path: &Path) -> Result<UploadedFile, UpstreamError> {
        Err(UpstreamError::NotConfigured)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunLogger;

impl RunLogger for NoopRunLogger {
    fn append(&self, _row: &RunLogRow) -> Result<(), UpstreamError> {
        Ok(())
    }
}

/// Serves a fixed screenshot and markup for every URL. Useful offline.
#[derive(Debug, Clone)]
pub struct StaticPageCapture {
    image: RgbImage,
    page: CapturedPage,
}

impl StaticPageCapture {
    pub fn new(image: RgbImage, title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            image,
            page: CapturedPage {
                title: title.into(),
                html: html.into(),
            },
        }
    }
}

impl PageCapture for StaticPageCapture {
    fn capture(&self, _url: &str, screenshot_path: &Path) -> Result<CapturedPage, CaptureError> {
        if let Some(parent) = screenshot_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.image
            .save_with_format(screenshot_path, image::ImageFormat::Png)
            .map_err(|err| CaptureError::Screenshot(err.to_string()))?;
        Ok(self.page.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn static_capture_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shots/page.png");
        let capture = StaticPageCapture::new(
            RgbImage::from_pixel(8, 6, Rgb([1, 2, 3])),
            "Home",
            "<h1>Home</h1>",
        );
        let page = capture.capture("https://example.com", &path).expect("capture");
        assert_eq!(page.title, "Home");
        let decoded = image::open(&path).expect("decode").to_rgb8();
        assert_eq!(decoded.dimensions(), (8, 6));
    }

    #[test]
    fn noop_collaborators() {
        assert!(matches!(
            NoopUploader.upload(Path::new("x.pdf")),
            Err(UpstreamError::NotConfigured)
        ));
        let row = RunLogRow {
            url: "https://example.com".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            overall: 70,
            label: "Good".to_string(),
            pdf_link: None,
        };
        assert!(NoopRunLogger.append(&row).is_ok());
    }
}
