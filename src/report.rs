//! Three-section PDF report: the captured page (sliced across as many pages
//! as it needs), the score table with a line chart, and the recommendations.

use chrono::{DateTime, Utc};
use image::RgbImage;
use image::imageops::FilterType;
use std::path::PathBuf;

use crate::canvas::{Canvas, Document};
use crate::category::Category;
use crate::error::Result;
use crate::font::{BaseFont, measure_text_width, wrap_text};
use crate::pdf::document_to_pdf;
use crate::raster::{ScreenshotSource, load_rgb, resize_to_width};
use crate::types::{Color, Margins, Pt, Size};

pub const REPORT_TITLE: &str = "Website Design Analyzer Report";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

const MARGIN_MM: f32 = 14.0;
const HEADER_BAR_MM: f32 = 14.0;
const CONTENT_OFFSET_MM: f32 = 18.0;
const LINE_H_MM: f32 = 6.0;
const CHART_H_MM: f32 = 60.0;
const HEADER_RADIUS: f32 = 6.0;

const ROW_H: f32 = 18.0;
const CELL_PAD: f32 = 6.0;
const SECTION_GAP: f32 = 18.0;
const KEY_VALUE_OFFSET: f32 = 70.0;
const TIP_INDENT: f32 = 10.0;
const TIP_LINE_STEP: f32 = 12.0;
const TIP_GAP: f32 = 8.0;
const TIP_WRAP_INSET: f32 = 14.0;
// Slack so a screenshot that fits to rounding error is not split.
const FIT_EPSILON: f64 = 0.1;

const BRAND_BLUE: &str = "#2563EB";
const INK: &str = "#0B0F24";
const TIP_INK: &str = "#222833";
const MUTED: &str = "#6B7280";

#[derive(Debug, Clone)]
pub struct ReportJob {
    pub output_path: PathBuf,
    pub screenshot: Option<ScreenshotSource>,
    pub url: String,
    pub title: String,
    pub overall_score: f64,
    pub label: String,
    /// `(category display name, score)` in caller order. Unknown names are
    /// listed after the fixed categories.
    pub breakdown: Vec<(String, f64)>,
    pub tips: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub output_path: PathBuf,
    pub page_count: usize,
    pub screenshot_pages: usize,
    pub screenshot_rendered: bool,
    pub bytes_written: usize,
}

/// One horizontal band of the screenshot, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotSlice {
    /// Whether the band starts on a fresh page.
    pub new_page: bool,
    pub y_px: u32,
    pub h_px: u32,
}

/// Splits an image of `image_h_px` rows, drawn at `scale` points per pixel,
/// into bands: the first fills `first_room` points on the current page and
/// the rest fill `continuation_room` each on new pages. Every row lands in
/// exactly one band.
pub fn plan_screenshot_slices(
    image_h_px: u32,
    scale: f64,
    first_room: f64,
    continuation_room: f64,
) -> Vec<ScreenshotSlice> {
    if image_h_px == 0 || !scale.is_finite() || scale <= 0.0 {
        return Vec::new();
    }
    if image_h_px as f64 * scale <= first_room + FIT_EPSILON {
        return vec![ScreenshotSlice {
            new_page: false,
            y_px: 0,
            h_px: image_h_px,
        }];
    }

    let first_px = (first_room.max(0.0) / scale).floor().min(image_h_px as f64) as u32;
    let continuation_px = ((continuation_room.max(0.0) / scale).floor() as u32).max(1);

    let mut slices = Vec::new();
    let mut y_px = 0u32;
    if first_px > 0 {
        slices.push(ScreenshotSlice {
            new_page: false,
            y_px: 0,
            h_px: first_px,
        });
        y_px = first_px;
    }
    while y_px < image_h_px {
        let h_px = continuation_px.min(image_h_px - y_px);
        slices.push(ScreenshotSlice {
            new_page: true,
            y_px,
            h_px,
        });
        y_px += h_px;
    }
    slices
}

struct Geometry {
    page: Size,
    margins: Margins,
    bar_h: Pt,
    content_top: Pt,
    usable_w: Pt,
    bottom: Pt,
}

impl Geometry {
    fn a4() -> Self {
        let page = Size::a4();
        let margins = Margins::all_mm(MARGIN_MM);
        Self {
            page,
            margins,
            bar_h: Pt::from_mm(HEADER_BAR_MM),
            content_top: margins.top + Pt::from_mm(CONTENT_OFFSET_MM),
            usable_w: page.width - margins.left - margins.right,
            bottom: page.height - margins.bottom,
        }
    }

    /// Top of the screenshot on page 1, below the URL and title lines.
    fn first_page_cursor(&self) -> Pt {
        self.content_top + Pt::from_mm(LINE_H_MM) + Pt::from_f32(8.0)
    }

    fn continuation_room(&self) -> Pt {
        self.bottom - self.content_top
    }
}

struct RenderStats {
    screenshot_pages: usize,
    screenshot_rendered: bool,
}

struct ReportRenderer<'a> {
    job: &'a ReportJob,
    canvas: Canvas,
    geo: Geometry,
    timestamp: String,
}

/// Renders the report in memory, then writes it to `job.output_path`
/// (creating parent directories).
pub fn render_report(job: ReportJob) -> Result<ReportSummary> {
    let (bytes, page_count, stats) = render_report_bytes(&job)?;
    if let Some(parent) = job.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&job.output_path, &bytes)?;
    tracing::info!(
        path = %job.output_path.display(),
        pages = page_count,
        bytes = bytes.len(),
        "report written"
    );
    Ok(ReportSummary {
        output_path: job.output_path,
        page_count,
        screenshot_pages: stats.screenshot_pages,
        screenshot_rendered: stats.screenshot_rendered,
        bytes_written: bytes.len(),
    })
}

fn render_report_bytes(job: &ReportJob) -> Result<(Vec<u8>, usize, RenderStats)> {
    let (document, stats) = build_report_document(job);
    let page_count = document.pages.len();
    let bytes = document_to_pdf(&document)?;
    Ok((bytes, page_count, stats))
}

fn build_report_document(job: &ReportJob) -> (Document, RenderStats) {
    let geo = Geometry::a4();
    let mut canvas = Canvas::new(geo.page);
    canvas.set_title(REPORT_TITLE);
    let mut renderer = ReportRenderer {
        job,
        canvas,
        geo,
        timestamp: job.generated_at.format(TIMESTAMP_FORMAT).to_string(),
    };

    let stats = renderer.overview_page();
    renderer.scores_page();
    renderer.recommendations_page();
    (renderer.canvas.finish(), stats)
}

impl ReportRenderer<'_> {
    fn header(&mut self, with_timestamp: bool) {
        let Geometry {
            margins,
            bar_h,
            usable_w,
            ..
        } = self.geo;
        let (left, top) = (margins.left, margins.top);
        let right = self.geo.page.width - margins.right;
        self.canvas.save_state();
        self.canvas.set_fill_color(Color::hex(BRAND_BLUE));
        self.canvas
            .round_rect(left, top, usable_w, bar_h, Pt::from_f32(HEADER_RADIUS));
        self.canvas.fill();

        self.canvas.set_fill_color(Color::WHITE);
        self.text(
            BaseFont::HelveticaBold,
            16.0,
            left + Pt::from_f32(8.0),
            top + bar_h - Pt::from_f32(4.0),
            REPORT_TITLE,
        );
        if with_timestamp {
            let timestamp = self.timestamp.clone();
            self.text_right(
                BaseFont::Helvetica,
                10.0,
                right - Pt::from_f32(8.0),
                top + bar_h - Pt::from_f32(6.0),
                &timestamp,
            );
        }
        self.canvas.restore_state();
    }

    fn new_page(&mut self, with_timestamp: bool) {
        self.canvas.show_page();
        self.header(with_timestamp);
    }

    fn text(&mut self, font: BaseFont, size: f32, x: Pt, baseline: Pt, text: &str) {
        self.canvas.set_font(font.pdf_name(), Pt::from_f32(size));
        self.canvas.draw_string(x, baseline, text);
    }

    fn text_right(&mut self, font: BaseFont, size: f32, right: Pt, baseline: Pt, text: &str) {
        let width = measure_text_width(font, Pt::from_f32(size), text);
        self.text(font, size, right - width, baseline, text);
    }

    fn text_centered(&mut self, font: BaseFont, size: f32, center: Pt, baseline: Pt, text: &str) {
        let width = measure_text_width(font, Pt::from_f32(size), text);
        self.text(font, size, center - width / 2.0, baseline, text);
    }

    fn overview_page(&mut self) -> RenderStats {
        self.header(true);
        let job = self.job;
        let margin = self.geo.margins.left;
        let max_w = self.geo.usable_w;
        let screenshot_top = self.geo.first_page_cursor();
        let mut y = self.geo.content_top;

        let url = if job.url.trim().is_empty() { "-" } else { job.url.as_str() };
        let line = fit_text(
            BaseFont::Helvetica,
            10.0,
            &format!("Report generated for: {url}"),
            max_w,
        );
        self.canvas.set_fill_color(Color::hex(INK));
        self.text(BaseFont::Helvetica, 10.0, margin, y, &line);
        y += Pt::from_mm(LINE_H_MM);

        self.canvas.set_fill_color(Color::BLACK);
        self.text(BaseFont::HelveticaBold, 10.0, margin, y, "Title:");
        let title = if job.title.trim().is_empty() { "-" } else { job.title.as_str() };
        let title = fit_text(
            BaseFont::Helvetica,
            10.0,
            title,
            max_w - Pt::from_f32(KEY_VALUE_OFFSET),
        );
        self.canvas.set_fill_color(Color::hex(INK));
        self.text(
            BaseFont::Helvetica,
            10.0,
            margin + Pt::from_f32(KEY_VALUE_OFFSET),
            y,
            &title,
        );
        let y = screenshot_top;

        match self.load_screenshot() {
            Some(image) => self.screenshot(&image, y),
            None => {
                self.canvas.set_fill_color(Color::hex(INK));
                self.text(
                    BaseFont::HelveticaOblique,
                    10.0,
                    margin,
                    y + Pt::from_f32(10.0),
                    "Screenshot could not be rendered.",
                );
                RenderStats {
                    screenshot_pages: 0,
                    screenshot_rendered: false,
                }
            }
        }
    }

    fn load_screenshot(&self) -> Option<RgbImage> {
        let source = self.job.screenshot.as_ref()?;
        match load_rgb(source) {
            Ok(image) if image.width() > 0 && image.height() > 0 => Some(image),
            Ok(_) => {
                tracing::warn!("screenshot is empty; rendering placeholder");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "screenshot unavailable; rendering placeholder");
                None
            }
        }
    }

    fn screenshot(&mut self, image: &RgbImage, top: Pt) -> RenderStats {
        let usable_w = self.geo.usable_w;
        let max_px_w = (usable_w.to_f32() * 2.0).ceil() as u32;
        let resampled;
        let image = if image.width() > max_px_w {
            resampled = resize_to_width(image, max_px_w, FilterType::Lanczos3);
            &resampled
        } else {
            image
        };

        let scale = usable_w.to_f32() as f64 / image.width() as f64;
        let first_room = (self.geo.bottom - top).to_f32() as f64;
        let continuation = self.geo.continuation_room().to_f32() as f64;
        let slices = plan_screenshot_slices(image.height(), scale, first_room, continuation);

        let mut pages = 1usize;
        for (index, slice) in slices.iter().enumerate() {
            let y = if slice.new_page {
                self.new_page(false);
                pages += 1;
                self.geo.content_top
            } else {
                top
            };
            let band = image::imageops::crop_imm(image, 0, slice.y_px, image.width(), slice.h_px)
                .to_image();
            let resource_id = format!("screenshot-{index}");
            self.canvas.register_image(resource_id.clone(), band);
            let height = Pt::from_f32((slice.h_px as f64 * scale) as f32);
            self.canvas
                .draw_image(self.geo.margins.left, y, usable_w, height, resource_id);
        }
        // The first band may have been pushed off page 1 entirely.
        if slices.first().is_some_and(|s| s.new_page) {
            pages -= 1;
        }
        tracing::debug!(slices = slices.len(), pages, "screenshot placed");
        RenderStats {
            screenshot_pages: pages,
            screenshot_rendered: true,
        }
    }

    fn scores_page(&mut self) {
        self.new_page(true);
        let rows = score_rows(self.job);
        let mut y = self.geo.content_top;
        y = self.score_table(&rows, y);
        y += Pt::from_f32(SECTION_GAP);

        let series = chart_series(&self.job.breakdown);
        let chart_h = Pt::from_mm(CHART_H_MM);
        // The chart plus its x labels must fit below the table.
        if y + chart_h + Pt::from_f32(16.0) > self.geo.bottom {
            self.new_page(false);
            y = self.geo.content_top;
        }
        self.line_chart(y, chart_h, &series);
    }

    fn score_table(&mut self, rows: &[(String, String)], top: Pt) -> Pt {
        let margin = self.geo.margins.left;
        let width = self.geo.usable_w;
        let split = margin + width * 0.6;
        let right = margin + width;
        let row_h = Pt::from_f32(ROW_H);
        let grid = Color::hex("#BFD7FF");
        let stripes = [Color::hex("#F5F5F5"), Color::hex("#F6FAFF")];

        let header = (String::from("Metric"), String::from("Score"));
        let mut y = top;
        for (index, (metric, score)) in std::iter::once(&header).chain(rows.iter()).enumerate() {
            if y + row_h > self.geo.bottom {
                self.new_page(false);
                y = self.geo.content_top;
            }
            let is_header = index == 0;
            let background = if is_header {
                Color::hex("#E5F0FF")
            } else {
                stripes[(index - 1) % 2]
            };
            self.canvas.set_fill_color(background);
            self.canvas.fill_rect(margin, y, width, row_h);

            self.canvas.set_stroke_color(grid);
            self.canvas.set_line_width(Pt::from_f32(0.25));
            self.canvas.stroke_rect(margin, y, width, row_h);
            self.canvas.line(split, y, split, y + row_h);

            let (font, size, ink) = if is_header {
                (BaseFont::HelveticaBold, 11.0, Color::BLACK)
            } else {
                (BaseFont::Helvetica, 10.0, Color::hex(INK))
            };
            // Vertically centered on the cap height.
            let baseline = y + row_h / 2.0 + Pt::from_f32(size * 0.35);
            self.canvas.set_fill_color(ink);
            self.text(font, size, margin + Pt::from_f32(CELL_PAD), baseline, metric);
            if is_header {
                self.text(font, size, split + Pt::from_f32(CELL_PAD), baseline, score);
            } else {
                self.text_right(font, size, right - Pt::from_f32(CELL_PAD), baseline, score);
            }
            y += row_h;
        }
        y
    }

    fn line_chart(&mut self, top: Pt, height: Pt, series: &[(String, f64)]) {
        let x = self.geo.margins.left;
        let width = self.geo.usable_w;
        let frame = Color::hex("#CBD5E1");

        self.canvas.set_line_width(Pt::from_f32(0.7));
        self.canvas.set_stroke_color(frame);
        self.canvas.stroke_rect(x, top, width, height);

        self.canvas.set_line_width(Pt::from_f32(0.5));
        for value in [0u8, 25, 50, 75, 100] {
            let yy = chart_y(top, height, value as f64);
            let stroke = if value == 0 || value == 100 { frame } else { Color::hex("#E5E7EB") };
            self.canvas.set_stroke_color(stroke);
            self.canvas.line(x, yy, x + width, yy);
            self.canvas.set_fill_color(Color::hex(MUTED));
            self.text(
                BaseFont::Helvetica,
                7.0,
                x - Pt::from_f32(18.0),
                yy + Pt::from_f32(3.0),
                &value.to_string(),
            );
        }

        let points = chart_points(series, x, top, width, height);
        if points.is_empty() {
            return;
        }

        self.canvas.set_stroke_color(Color::hex(BRAND_BLUE));
        self.canvas.set_line_width(Pt::from_f32(1.4));
        for pair in points.windows(2) {
            self.canvas.line(pair[0].0, pair[0].1, pair[1].0, pair[1].1);
        }

        self.canvas.set_line_width(Pt::from_f32(1.0));
        for ((px, py), (_, value)) in points.iter().zip(series) {
            self.canvas.set_fill_color(Color::WHITE);
            self.canvas.circle(*px, *py, Pt::from_f32(2.8));
            self.canvas.fill_stroke();

            // Kept inside the frame for values near 100.
            let label_y = (*py - Pt::from_f32(6.0)).max(top + Pt::from_f32(7.0));
            self.canvas.set_fill_color(Color::hex("#1F2937"));
            self.text(
                BaseFont::HelveticaBold,
                8.0,
                *px - Pt::from_f32(6.0),
                label_y,
                &format!("{}", value.clamp(0.0, 100.0).round() as i64),
            );
        }

        for ((px, _), (name, _)) in points.iter().zip(series) {
            self.canvas.set_fill_color(metric_color(name));
            let first_word = name.split_whitespace().next().unwrap_or(name.as_str());
            self.text_centered(
                BaseFont::Helvetica,
                8.0,
                *px,
                top + height + Pt::from_f32(12.0),
                first_word,
            );
        }
    }

    fn recommendations_page(&mut self) {
        self.new_page(true);
        let x = self.geo.margins.left;
        let mut y = self.geo.content_top;

        self.canvas.set_fill_color(Color::BLACK);
        self.text(BaseFont::HelveticaBold, 12.0, x, y + Pt::from_f32(12.0), "Recommendations");
        y += Pt::from_f32(18.0);

        let job = self.job;
        let tip_ink = Color::hex(TIP_INK);
        if job.tips.is_empty() {
            self.canvas.set_fill_color(tip_ink);
            self.text(
                BaseFont::HelveticaOblique,
                10.0,
                x,
                y + Pt::from_f32(10.0),
                "No recommendations. Looks great!",
            );
            return;
        }

        let size = Pt::from_f32(10.0);
        let wrap_w = self.geo.usable_w - Pt::from_f32(TIP_WRAP_INSET);
        for tip in &job.tips {
            let lines = wrap_text(tip, BaseFont::Helvetica, size, wrap_w);
            if lines.is_empty() {
                continue;
            }
            let block = Pt::from_f32(10.0 + TIP_LINE_STEP * (lines.len() - 1) as f32 + 4.0);
            let fresh_page = y == self.geo.content_top;
            if y + block > self.geo.bottom && !fresh_page {
                self.new_page(false);
                y = self.geo.content_top;
            }

            self.canvas.set_fill_color(Color::hex(BRAND_BLUE));
            self.canvas
                .circle(x + Pt::from_f32(2.0), y + Pt::from_f32(6.0), Pt::from_f32(2.0));
            self.canvas.fill();

            self.canvas.set_fill_color(tip_ink);
            let mut baseline = y + Pt::from_f32(10.0);
            for (index, line) in lines.iter().enumerate() {
                if index > 0 {
                    baseline += Pt::from_f32(TIP_LINE_STEP);
                    // Only a tip taller than a whole page gets here.
                    if baseline + Pt::from_f32(4.0) > self.geo.bottom {
                        self.new_page(false);
                        baseline = self.geo.content_top + Pt::from_f32(10.0);
                        self.canvas.set_fill_color(tip_ink);
                    }
                }
                self.text(BaseFont::Helvetica, 10.0, x + Pt::from_f32(TIP_INDENT), baseline, line);
            }
            y = baseline + Pt::from_f32(TIP_GAP);
        }
    }
}

/// Table rows after the header: overall, the fixed categories in display
/// order, then any other entries in input order.
fn score_rows(job: &ReportJob) -> Vec<(String, String)> {
    let mut overall = format!("{}/100", job.overall_score.round() as i64);
    if !job.label.is_empty() {
        overall.push_str(" - ");
        overall.push_str(&job.label);
    }
    let mut rows = vec![("Overall".to_string(), overall)];
    for category in Category::ALL {
        let entry = job.breakdown.iter().find(|(name, _)| name == category.name());
        if let Some((name, value)) = entry {
            rows.push((name.clone(), format!("{}/100", value.round() as i64)));
        }
    }
    for (name, value) in &job.breakdown {
        if !Category::ALL.iter().any(|c| c.name() == name) {
            rows.push((name.clone(), format!("{}/100", value.round() as i64)));
        }
    }
    rows
}

/// Chart series: fixed categories only, in display order.
fn chart_series(breakdown: &[(String, f64)]) -> Vec<(String, f64)> {
    Category::ALL
        .iter()
        .filter_map(|category| {
            breakdown
                .iter()
                .find(|(name, _)| name == category.name())
                .cloned()
        })
        .collect()
}

fn chart_y(top: Pt, height: Pt, value: f64) -> Pt {
    let ratio = (value.clamp(0.0, 100.0) / 100.0) as f32;
    top + height - height * ratio
}

/// Evenly spaced points across `width`; a single point sits on the left edge.
fn chart_points(
    series: &[(String, f64)],
    x: Pt,
    top: Pt,
    width: Pt,
    height: Pt,
) -> Vec<(Pt, Pt)> {
    let steps = series.len().saturating_sub(1).max(1) as f32;
    series
        .iter()
        .enumerate()
        .map(|(index, (_, value))| {
            let px = x + width * (index as f32 / steps);
            (px, chart_y(top, height, *value))
        })
        .collect()
}

fn metric_color(name: &str) -> Color {
    let hex = match Category::ALL.iter().find(|c| c.name() == name) {
        Some(Category::Typography) => "#60A5FA",
        Some(Category::ColorContrast) => "#F87171",
        Some(Category::LayoutStructure) => "#FBBF24",
        Some(Category::Responsive) => "#34D399",
        Some(Category::Accessibility) => "#A78BFA",
        None => MUTED,
    };
    Color::hex(hex)
}

/// Truncates with "..." so the text fits in `max_width`.
fn fit_text(font: BaseFont, size: f32, text: &str, max_width: Pt) -> String {
    let size = Pt::from_f32(size);
    if measure_text_width(font, size, text) <= max_width {
        return text.to_string();
    }
    let mut out: String = text.to_string();
    while !out.is_empty() {
        out.pop();
        let candidate = format!("{out}...");
        if measure_text_width(font, size, &candidate) <= max_width {
            return candidate;
        }
    }
    "...".to_string()
}
