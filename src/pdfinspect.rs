use lopdf::Document as LoDocument;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("failed to parse pdf: {0}")]
    Parse(String),
    #[error("pdf has no pages")]
    NoPages,
    #[error("failed to read pdf: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportInspection {
    pub pdf_version: String,
    pub page_count: usize,
    pub file_size_bytes: usize,
    pub title: Option<String>,
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<ReportInspection, InspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| InspectError::Parse(err.to_string()))?;
    let page_count = pdf.get_pages().len();
    if page_count == 0 {
        return Err(InspectError::NoPages);
    }
    Ok(ReportInspection {
        pdf_version: pdf.version.clone(),
        page_count,
        file_size_bytes: bytes.len(),
        title: info_title(&pdf),
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<ReportInspection, InspectError> {
    let data = std::fs::read(path)?;
    inspect_pdf_bytes(&data)
}

fn info_title(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_dictionary(info_id).ok()?;
    let raw = info.get(b"Title").ok()?.as_str().ok()?;
    Some(String::from_utf8_lossy(raw).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::pdf::document_to_pdf;
    use crate::types::{Pt, Size};

    fn two_page_pdf() -> Vec<u8> {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_title("Inspection");
        canvas.draw_string(Pt::from_f32(20.0), Pt::from_f32(20.0), "one");
        canvas.show_page();
        canvas.draw_string(Pt::from_f32(20.0), Pt::from_f32(20.0), "two");
        document_to_pdf(&canvas.finish()).expect("pdf")
    }

    #[test]
    fn reads_version_pages_and_title() {
        let bytes = two_page_pdf();
        let report = inspect_pdf_bytes(&bytes).expect("inspect");
        assert_eq!(report.pdf_version, "1.7");
        assert_eq!(report.page_count, 2);
        assert_eq!(report.file_size_bytes, bytes.len());
        assert_eq!(report.title.as_deref(), Some("Inspection"));
    }

    #[test]
    fn rejects_malformed_data() {
        assert!(matches!(
            inspect_pdf_bytes(b"not a pdf"),
            Err(InspectError::Parse(_))
        ));
    }

    #[test]
    fn path_matches_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.pdf");
        let bytes = two_page_pdf();
        std::fs::write(&path, &bytes).expect("write");
        assert_eq!(
            inspect_pdf_path(&path).expect("path"),
            inspect_pdf_bytes(&bytes).expect("bytes")
        );
        assert!(matches!(
            inspect_pdf_path(&dir.path().join("missing.pdf")),
            Err(InspectError::Io(_))
        ));
    }
}
