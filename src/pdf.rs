use fixed::types::I32F32;
use image::RgbImage;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};

use crate::canvas::{Command, Document, Page};
use crate::font::BaseFont;
use crate::types::{Color, Pt};

const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const RESOURCES_ID: usize = 3;
const FIRST_DYNAMIC_ID: usize = 4;
const PRODUCER: &str = "designscore";

struct FontResource {
    resource: String,
    object_id: usize,
}

struct ImageResource {
    name: String,
    object_id: usize,
}

pub fn document_to_pdf(document: &Document) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    write_document(document, &mut out)?;
    Ok(out)
}

pub fn write_document<W: Write>(document: &Document, writer: &mut W) -> io::Result<()> {
    let page_height = document.page_size.height;
    let mut next_id = FIRST_DYNAMIC_ID;

    let mut fonts: BTreeMap<BaseFont, FontResource> = BTreeMap::new();
    for (index, font) in collect_fonts(document).into_iter().enumerate() {
        fonts.insert(
            font,
            FontResource {
                resource: format!("F{}", index + 1),
                object_id: next_id,
            },
        );
        next_id += 1;
    }

    // Identical rasters registered under different ids share one XObject.
    let mut images: HashMap<String, ImageResource> = HashMap::new();
    let mut image_objects: Vec<(usize, &RgbImage)> = Vec::new();
    let mut by_digest: HashMap<[u8; 32], (String, usize)> = HashMap::new();
    for resource_id in collect_image_ids(document) {
        let Some(image) = document.images.get(&resource_id) else {
            tracing::warn!(resource_id = %resource_id, "image referenced but not registered");
            continue;
        };
        let digest = image_digest(image);
        if let Some((name, object_id)) = by_digest.get(&digest) {
            images.insert(
                resource_id,
                ImageResource {
                    name: name.clone(),
                    object_id: *object_id,
                },
            );
            continue;
        }
        let name = format!("Im{}", image_objects.len() + 1);
        by_digest.insert(digest, (name.clone(), next_id));
        images.insert(
            resource_id,
            ImageResource {
                name,
                object_id: next_id,
            },
        );
        image_objects.push((next_id, image));
        next_id += 1;
    }

    let page_ids: Vec<(usize, usize)> = document
        .pages
        .iter()
        .map(|_| {
            let ids = (next_id, next_id + 1);
            next_id += 2;
            ids
        })
        .collect();
    let info_id = next_id;
    let total_objects = info_id;

    let mut offsets = vec![0usize; total_objects + 1];
    let mut offset = 0usize;
    write_bytes(writer, b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n", &mut offset)?;

    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        CATALOG_ID,
        &format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>"),
    )?;
    let kids: Vec<String> = page_ids
        .iter()
        .map(|(page_id, _)| format!("{page_id} 0 R"))
        .collect();
    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        PAGES_ID,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 {} {}] >>",
            kids.join(" "),
            page_ids.len(),
            fmt_pt(document.page_size.width),
            fmt_pt(document.page_size.height)
        ),
    )?;
    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        RESOURCES_ID,
        &resources_object(&fonts, &images),
    )?;

    for (font, res) in &fonts {
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            res.object_id,
            &font_object(*font),
        )?;
    }
    for (object_id, image) in &image_objects {
        let body = image_object(image)?;
        write_pdf_object(writer, &mut offset, &mut offsets, *object_id, &body)?;
    }

    for (page, (page_id, content_id)) in document.pages.iter().zip(&page_ids) {
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            *page_id,
            &format!(
                "<< /Type /Page /Parent {PAGES_ID} 0 R /Resources {RESOURCES_ID} 0 R /Contents {content_id} 0 R >>"
            ),
        )?;
        let content = render_page(page, page_height, &fonts, &images);
        write_pdf_object(
            writer,
            &mut offset,
            &mut offsets,
            *content_id,
            &stream_object(&content),
        )?;
    }

    write_pdf_object(
        writer,
        &mut offset,
        &mut offsets,
        info_id,
        &info_object(document.title.as_deref()),
    )?;

    let xref_start = offset;
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", total_objects + 1);
    for slot in offsets.iter().skip(1) {
        xref.push_str(&format!("{slot:010} 00000 n \n"));
    }
    xref.push_str(&format!(
        "trailer\n<< /Size {} /Root {CATALOG_ID} 0 R /Info {info_id} 0 R >>\nstartxref\n{xref_start}\n%%EOF",
        total_objects + 1
    ));
    write_str(writer, &xref, &mut offset)?;
    Ok(())
}

fn collect_fonts(document: &Document) -> BTreeSet<BaseFont> {
    let mut fonts = BTreeSet::new();
    for page in &document.pages {
        let mut current = BaseFont::Helvetica;
        let mut saved = Vec::new();
        for cmd in &page.commands {
            match cmd {
                Command::SaveState => saved.push(current),
                Command::RestoreState => {
                    if let Some(font) = saved.pop() {
                        current = font;
                    }
                }
                Command::SetFontName(name) => current = BaseFont::from_name(name),
                Command::DrawString { .. } => {
                    fonts.insert(current);
                }
                _ => {}
            }
        }
    }
    fonts
}

fn collect_image_ids(document: &Document) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ids = Vec::new();
    for page in &document.pages {
        for cmd in &page.commands {
            if let Command::DrawImage { resource_id, .. } = cmd {
                if seen.insert(resource_id.clone()) {
                    ids.push(resource_id.clone());
                }
            }
        }
    }
    ids
}

fn image_digest(image: &RgbImage) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(image.width().to_be_bytes());
    hasher.update(image.height().to_be_bytes());
    hasher.update(image.as_raw());
    hasher.finalize().into()
}

fn resources_object(
    fonts: &BTreeMap<BaseFont, FontResource>,
    images: &HashMap<String, ImageResource>,
) -> String {
    let font_entries: Vec<String> = fonts
        .values()
        .map(|res| format!("/{} {} 0 R", res.resource, res.object_id))
        .collect();
    let mut image_entries: Vec<(String, usize)> = images
        .values()
        .map(|res| (res.name.clone(), res.object_id))
        .collect();
    image_entries.sort();
    image_entries.dedup();
    let image_entries: Vec<String> = image_entries
        .into_iter()
        .map(|(name, id)| format!("/{name} {id} 0 R"))
        .collect();

    let mut out = String::from("<< /ProcSet [/PDF /Text /ImageC]");
    if !font_entries.is_empty() {
        out.push_str(&format!(" /Font << {} >>", font_entries.join(" ")));
    }
    if !image_entries.is_empty() {
        out.push_str(&format!(" /XObject << {} >>", image_entries.join(" ")));
    }
    out.push_str(" >>");
    out
}

fn font_object(font: BaseFont) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        font.pdf_name()
    )
}

fn image_object(image: &RgbImage) -> io::Result<String> {
    let compressed = flate_compress(image.as_raw())?;
    let stream_data = encode_stream_data(&compressed);
    Ok(format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        image.width(),
        image.height(),
        stream_data.len(),
        stream_data
    ))
}

fn flate_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32 + 1);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{byte:02X}");
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out.push('>');
    out
}

fn stream_object(content: &str) -> String {
    format!(
        "<< /Length {} >>\nstream\n{}\nendstream",
        content.len(),
        content
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = Vec::new();
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi_pdf_string(title).text));
    }
    entries.push(format!("/Producer ({PRODUCER})"));
    format!("<< {} >>", entries.join(" "))
}

fn render_page(
    page: &Page,
    page_height: Pt,
    fonts: &BTreeMap<BaseFont, FontResource>,
    images: &HashMap<String, ImageResource>,
) -> String {
    let mut out = String::new();
    let mut current_font = BaseFont::Helvetica;
    let mut current_size = Pt::from_f32(12.0);
    // Font selection is graphics state, so it follows q/Q like everything else.
    let mut saved = Vec::new();

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                saved.push((current_font, current_size));
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some((font, size)) = saved.pop() {
                    current_font = font;
                    current_size = size;
                }
                out.push_str("Q\n");
            }
            Command::SetFillColor(color) => {
                out.push_str(&format!("{} rg\n", color_components(*color)));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!("{} RG\n", color_components(*color)));
            }
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetFontName(name) => current_font = BaseFont::from_name(name),
            Command::SetFontSize(size) => current_size = *size,
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(page_height - *y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(page_height - *y1),
                    fmt_pt(*x2),
                    fmt_pt(page_height - *y2),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y)
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                let Some(font) = fonts.get(&current_font) else {
                    continue;
                };
                let encoded = encode_winansi_pdf_string(text);
                if encoded.replaced > 0 {
                    tracing::debug!(
                        replaced = encoded.replaced,
                        "characters outside WinAnsi replaced"
                    );
                }
                out.push_str(&format!(
                    "BT\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
                    font.resource,
                    fmt_pt(current_size),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y),
                    encoded.text
                ));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let Some(image) = images.get(resource_id) else {
                    continue;
                };
                out.push_str(&format!(
                    "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    image.name
                ));
            }
        }
    }
    out
}

fn color_components(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn write_pdf_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &str,
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_str(writer, &format!("{obj_id} 0 obj\n"), offset)?;
    write_bytes(writer, body.as_bytes(), offset)?;
    write_bytes(writer, b"\nendobj\n", offset)
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

fn write_str<W: Write>(writer: &mut W, data: &str, offset: &mut usize) -> io::Result<()> {
    write_bytes(writer, data.as_bytes(), offset)
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
}

/// Encodes to WinAnsi (cp1252) and escapes for a PDF literal string.
/// Unmappable characters become `?`.
fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
            b => out.push(b as char),
        }
    }
    WinAnsiEncoded {
        text: out,
        replaced,
    }
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{sign}{int_part}");
    }
    let mut s = format!("{sign}{int_part}.{frac_part:03}");
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;
    use image::Rgb;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn number_formatting_trims_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(12_500), "12.5");
        assert_eq!(format_milli(-3_000), "-3");
        assert_eq!(format_milli(841_890), "841.89");
        assert_eq!(fmt(0.5), "0.5");
    }

    #[test]
    fn winansi_escapes_and_replaces() {
        let encoded = encode_winansi_pdf_string("a(b)\\ \u{2014} \u{4E2D}");
        assert_eq!(encoded.text, "a\\(b\\)\\\\ \\227 ?");
        assert_eq!(encoded.replaced, 1);
    }

    #[test]
    fn text_is_flipped_to_pdf_space() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font("Helvetica-Bold", Pt::from_f32(12.0));
        canvas.draw_string(Pt::from_f32(40.0), Pt::from_f32(100.0), "Hi");
        let bytes = document_to_pdf(&canvas.finish()).expect("pdf");
        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(contains(&bytes, "/BaseFont /Helvetica-Bold"));
        assert!(contains(&bytes, "BT\n/F1 12 Tf\n40 741.89 Td\n(Hi) Tj\nET"));
        assert!(bytes.ends_with(b"%%EOF"));
    }

    #[test]
    fn restore_state_brings_back_the_saved_font() {
        let mut canvas = Canvas::new(Size::a4());
        let at = Pt::from_f32(20.0);
        canvas.set_font("Helvetica-Bold", Pt::from_f32(14.0));
        canvas.draw_string(at, at, "A");
        canvas.save_state();
        canvas.set_font("Helvetica", Pt::from_f32(9.0));
        canvas.draw_string(at, at, "B");
        canvas.restore_state();
        canvas.draw_string(at, at, "C");
        let bytes = document_to_pdf(&canvas.finish()).expect("pdf");
        let text = String::from_utf8_lossy(&bytes);
        let block = |needle: &str| {
            text.split("BT\n")
                .find(|block| block.contains(needle))
                .map(str::to_string)
                .expect("text block")
        };
        assert!(block("(B) Tj").starts_with("/F1 9 Tf"));
        assert!(block("(C) Tj").starts_with("/F2 14 Tf"));
    }

    #[test]
    fn identical_images_share_one_xobject() {
        let mut canvas = Canvas::new(Size::a4());
        let img = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        canvas.register_image("a", img.clone());
        canvas.register_image("b", img);
        let unit = Pt::from_f32(10.0);
        canvas.draw_image(unit, unit, unit, unit, "a");
        canvas.show_page();
        canvas.draw_image(unit, unit, unit, unit, "b");
        let bytes = document_to_pdf(&canvas.finish()).expect("pdf");
        let count = bytes
            .windows(b"/Subtype /Image".len())
            .filter(|w| *w == b"/Subtype /Image")
            .count();
        assert_eq!(count, 1);
        assert!(contains(&bytes, "/Im1 Do"));
    }

    #[test]
    fn output_parses_with_lopdf() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_title("Report");
        canvas.fill_rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(20.0), Pt::from_f32(20.0));
        canvas.show_page();
        canvas.draw_string(Pt::from_f32(10.0), Pt::from_f32(10.0), "second");
        let bytes = document_to_pdf(&canvas.finish()).expect("pdf");
        let doc = lopdf::Document::load_mem(&bytes).expect("parse");
        assert_eq!(doc.get_pages().len(), 2);
    }
}
