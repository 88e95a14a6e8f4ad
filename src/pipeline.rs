//! One analysis run: capture, scoring, palette, report, uploads, history.

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crate::category::{Category, CategoryMeta};
use crate::collaborators::{
    CapturedPage, NoopRunLogger, NoopUploader, PageCapture, RunLogRow, RunLogger, Uploader,
    UpstreamError,
};
use crate::config::AnalyzerConfig;
use crate::error::{AnalyzerError, Result};
use crate::history::RunHistory;
use crate::palette::{PaletteEntry, PaletteOptions, extract_palette};
use crate::pdfinspect::inspect_pdf_path;
use crate::raster::{ScreenshotSource, load_rgb};
use crate::report::{ReportJob, render_report};
use crate::scoring::{
    LabelTable, ScoreBreakdown, TipRules, WeightTable, make_scores_with_labels, recommendations,
};

const SCREENSHOT_FILE: &str = "screenshot.png";
const REPORT_FILE: &str = "report.pdf";

// Process-wide so analyzers sharing an output root never reuse a run dir.
static RUN_SEQ: AtomicU64 = AtomicU64::new(0);

/// What the capture step produced. Read-only once built.
#[derive(Debug, Clone)]
pub struct PageArtifact {
    pub raster: RgbImage,
    pub html: String,
    pub title: String,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFiles {
    pub screenshot: PathBuf,
    pub pdf: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadLinks {
    pub screenshot: Option<String>,
    pub pdf: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub overall: u8,
    pub label: String,
    pub breakdown: BTreeMap<Category, u8>,
    pub tips: Vec<String>,
    pub palette: Vec<PaletteEntry>,
    pub meta: BTreeMap<Category, CategoryMeta>,
    pub files: RunFiles,
    /// Lowercase hex sha-256 of the screenshot file, empty if it was unreadable.
    pub screenshot_digest: String,
    pub report_pages: usize,
    pub uploads: UploadLinks,
    /// Degradations that did not fail the run.
    pub annotations: Vec<String>,
}

pub struct DesignAnalyzer {
    output_root: PathBuf,
    capture: Arc<dyn PageCapture>,
    uploader: Arc<dyn Uploader>,
    logger: Arc<dyn RunLogger>,
    history: Arc<RunHistory>,
    weights: WeightTable,
    labels: LabelTable,
    tips: TipRules,
    palette: PaletteOptions,
    capture_timeout: Duration,
}

pub struct DesignAnalyzerBuilder {
    config: AnalyzerConfig,
    output_root: PathBuf,
    capture: Option<Arc<dyn PageCapture>>,
    uploader: Option<Arc<dyn Uploader>>,
    logger: Option<Arc<dyn RunLogger>>,
    history: Option<Arc<RunHistory>>,
}

impl DesignAnalyzerBuilder {
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
            output_root: PathBuf::from("runs"),
            capture: None,
            uploader: None,
            logger: None,
            history: None,
        }
    }

    pub fn config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn capture(mut self, capture: Arc<dyn PageCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn run_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Without a shared history the analyzer keeps its own, sized from the
    /// configuration.
    pub fn history(mut self, history: Arc<RunHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> Result<DesignAnalyzer> {
        self.config.validate()?;
        let capture = self.capture.ok_or_else(|| {
            AnalyzerError::InvalidConfiguration(
                "a page capture implementation is required".to_string(),
            )
        })?;
        let history = self
            .history
            .unwrap_or_else(|| Arc::new(RunHistory::new(self.config.history_capacity)));
        Ok(DesignAnalyzer {
            output_root: self.output_root,
            capture,
            uploader: self.uploader.unwrap_or_else(|| Arc::new(NoopUploader)),
            logger: self.logger.unwrap_or_else(|| Arc::new(NoopRunLogger)),
            history,
            weights: self.config.weight_table()?,
            labels: self.config.label_table()?,
            tips: self.config.tip_rules()?,
            palette: self.config.palette,
            capture_timeout: self.config.capture_timeout(),
        })
    }
}

impl Default for DesignAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DesignAnalyzer {
    pub fn builder() -> DesignAnalyzerBuilder {
        DesignAnalyzerBuilder::new()
    }

    pub fn history(&self) -> &Arc<RunHistory> {
        &self.history
    }

    pub fn analyze(&self, url: &str) -> Result<Arc<RunRecord>> {
        let url = url.trim();
        if !has_web_scheme(url) {
            return Err(AnalyzerError::InvalidUrl(url.to_string()));
        }
        self.weights.validate()?;

        let started_at = Utc::now();
        let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed) + 1;
        let run_id = format!("{}-{seq:04}", started_at.format("%Y%m%d-%H%M%S"));
        let run_dir = self.output_root.join(&run_id);
        std::fs::create_dir_all(&run_dir)?;
        tracing::info!(run_id = %run_id, url, "run started");

        let screenshot_path = run_dir.join(SCREENSHOT_FILE);
        let pdf_path = run_dir.join(REPORT_FILE);
        let mut annotations = Vec::new();

        let page = match self.capture_with_timeout(url, &run_dir, &screenshot_path) {
            Ok(page) => page,
            Err(err) => {
                remove_run_dir(&run_dir);
                return Err(err);
            }
        };
        let raster = match load_rgb(&ScreenshotSource::Path(screenshot_path.clone())) {
            Ok(raster) => raster,
            Err(err) => {
                tracing::warn!(error = %err, "screenshot unreadable; scoring markup only");
                annotations.push(format!("screenshot unreadable: {err}"));
                RgbImage::new(0, 0)
            }
        };
        let artifact = PageArtifact {
            raster,
            html: page.html,
            title: page.title,
            source_url: url.to_string(),
        };

        let breakdown = make_scores_with_labels(
            &artifact.raster,
            &artifact.html,
            &self.weights,
            &self.labels,
        )?;
        let tips = recommendations(&breakdown, &self.tips);
        let palette = extract_palette(&artifact.raster, &self.palette);
        tracing::info!(
            overall = breakdown.overall,
            label = %breakdown.label,
            colors = palette.len(),
            "page scored"
        );

        let summary = render_report(ReportJob {
            output_path: pdf_path.clone(),
            screenshot: Some(ScreenshotSource::Path(screenshot_path.clone())),
            url: artifact.source_url.clone(),
            title: artifact.title.clone(),
            overall_score: breakdown.overall as f64,
            label: breakdown.label.clone(),
            breakdown: breakdown.named_scores(),
            tips: tips.clone(),
            generated_at: started_at,
        })?;
        let report_pages = match inspect_pdf_path(&pdf_path) {
            Ok(inspection) => inspection.page_count,
            Err(err) => {
                tracing::warn!(error = %err, "report inspection failed");
                annotations.push(format!("report inspection failed: {err}"));
                summary.page_count
            }
        };

        let uploads = self.upload_files(&screenshot_path, &pdf_path, &mut annotations);
        self.log_run(&artifact, started_at, &breakdown, &uploads, &mut annotations);

        let screenshot_digest = match std::fs::read(&screenshot_path) {
            Ok(bytes) => sha256_hex(&bytes),
            Err(_) => String::new(),
        };

        let record = Arc::new(RunRecord {
            run_id,
            url: artifact.source_url,
            started_at,
            overall: breakdown.overall,
            label: breakdown.label,
            breakdown: breakdown.scores,
            tips,
            palette,
            meta: breakdown.meta,
            files: RunFiles {
                screenshot: screenshot_path,
                pdf: pdf_path,
            },
            screenshot_digest,
            report_pages,
            uploads,
            annotations,
        });
        self.history.push(Arc::clone(&record));
        tracing::info!(run_id = %record.run_id, pages = report_pages, "run finished");
        Ok(record)
    }

    fn capture_with_timeout(
        &self,
        url: &str,
        run_dir: &Path,
        screenshot_path: &Path,
    ) -> Result<CapturedPage> {
        let (tx, rx) = mpsc::channel();
        let capture = Arc::clone(&self.capture);
        let url_owned = url.to_string();
        let dir_owned = run_dir.to_path_buf();
        let path_owned = screenshot_path.to_path_buf();
        // A capture that overruns keeps its thread. Once it finishes with
        // nobody listening, it removes whatever it wrote.
        std::thread::spawn(move || {
            let result = capture.capture(&url_owned, &path_owned);
            if tx.send(result).is_err() {
                remove_run_dir(&dir_owned);
            }
        });
        match rx.recv_timeout(self.capture_timeout) {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(err)) => Err(AnalyzerError::CaptureFailed(err.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(url, timeout = ?self.capture_timeout, "capture timed out");
                Err(AnalyzerError::CaptureTimeout(self.capture_timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(AnalyzerError::CaptureFailed(
                "capture worker exited without a result".to_string(),
            )),
        }
    }

    fn upload_files(
        &self,
        screenshot_path: &Path,
        pdf_path: &Path,
        annotations: &mut Vec<String>,
    ) -> UploadLinks {
        let mut links = UploadLinks::default();
        let mut disabled = false;
        for (kind, path) in [("screenshot", screenshot_path), ("pdf", pdf_path)] {
            if disabled {
                break;
            }
            match self.uploader.upload(path) {
                Ok(file) => {
                    tracing::debug!(kind, id = %file.id, "uploaded");
                    let link = Some(file.web_view_link);
                    if kind == "pdf" {
                        links.pdf = link;
                    } else {
                        links.screenshot = link;
                    }
                }
                Err(UpstreamError::NotConfigured) => {
                    annotations.push("uploads disabled".to_string());
                    disabled = true;
                }
                Err(err) => {
                    tracing::warn!(kind, error = %err, "upload failed");
                    annotations.push(format!("{kind} upload failed: {err}"));
                }
            }
        }
        links
    }

    fn log_run(
        &self,
        artifact: &PageArtifact,
        started_at: DateTime<Utc>,
        breakdown: &ScoreBreakdown,
        uploads: &UploadLinks,
        annotations: &mut Vec<String>,
    ) {
        let row = RunLogRow {
            url: artifact.source_url.clone(),
            timestamp: started_at.to_rfc3339(),
            overall: breakdown.overall,
            label: breakdown.label.clone(),
            pdf_link: uploads.pdf.clone(),
        };
        match self.logger.append(&row) {
            Ok(()) => {}
            Err(UpstreamError::NotConfigured) => {
                annotations.push("run logging disabled".to_string());
            }
            Err(err) => {
                tracing::warn!(error = %err, "run log append failed");
                annotations.push(format!("run log append failed: {err}"));
            }
        }
    }
}

fn remove_run_dir(run_dir: &Path) {
    match std::fs::remove_dir_all(run_dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %run_dir.display(), error = %err, "failed to remove run dir");
        }
    }
}

fn has_web_scheme(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
