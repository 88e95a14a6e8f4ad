//! Scores a rendered web page on typography, color, layout, responsiveness
//! and accessibility, extracts its palette, and writes a paginated PDF report.

mod accessibility;
mod canvas;
mod category;
mod collaborators;
mod color;
mod config;
mod dom;
mod error;
mod font;
mod history;
mod layout;
mod palette;
mod pdf;
mod pdfinspect;
mod pipeline;
mod raster;
mod report;
mod responsive;
mod scoring;
mod types;
mod typography;

pub use accessibility::{AccessibilityMeta, analyze_accessibility};
pub use canvas::{Canvas, Command, Document, Page};
pub use category::{Category, CategoryMeta, SubScore};
pub use collaborators::{
    CaptureError, CapturedPage, NoopRunLogger, NoopUploader, PageCapture, RunLogRow, RunLogger,
    StaticPageCapture, UploadedFile, Uploader, UpstreamError,
};
pub use color::{ColorMeta, analyze_colors};
pub use config::AnalyzerConfig;
pub use error::{AnalyzerError, Result};
pub use font::{BaseFont, measure_text_width, wrap_text};
pub use history::RunHistory;
pub use layout::{LayoutMeta, analyze_layout, whitespace_pct};
pub use palette::{PaletteEntry, PaletteOptions, extract_palette, hex_of};
pub use pdf::{document_to_pdf, write_document};
pub use pdfinspect::{InspectError, ReportInspection, inspect_pdf_bytes, inspect_pdf_path};
pub use pipeline::{
    DesignAnalyzer, DesignAnalyzerBuilder, PageArtifact, RunFiles, RunRecord, UploadLinks,
};
pub use raster::{ScreenshotSource, load_rgb};
pub use report::{
    REPORT_TITLE, ReportJob, ReportSummary, ScreenshotSlice, plan_screenshot_slices,
    render_report,
};
pub use responsive::{BREAKPOINTS, ResponsiveMeta, analyze_responsive};
pub use scoring::{
    LabelTable, LabelThreshold, ScoreBreakdown, TipRule, TipRules, WeightTable, make_scores,
    make_scores_with_labels, recommendations,
};
pub use types::{Color, Pt, Size};
pub use typography::{TypographyMeta, analyze_typography};
