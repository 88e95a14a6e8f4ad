//! Advance widths for the standard Helvetica faces. Reports only use the
//! Base-14 fonts, so nothing is embedded and widths come from the published
//! AFM metrics (1000 units per em).

use crate::types::Pt;

const FIRST_CHAR: u32 = 32;
const MISSING_WIDTH: u16 = 556;

// AFM widths for code points 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
}

impl BaseFont {
    pub const ALL: [BaseFont; 3] = [
        BaseFont::Helvetica,
        BaseFont::HelveticaBold,
        BaseFont::HelveticaOblique,
    ];

    pub fn pdf_name(self) -> &'static str {
        match self {
            BaseFont::Helvetica => "Helvetica",
            BaseFont::HelveticaBold => "Helvetica-Bold",
            BaseFont::HelveticaOblique => "Helvetica-Oblique",
        }
    }

    /// Unknown names fall back to regular Helvetica.
    pub fn from_name(name: &str) -> BaseFont {
        BaseFont::ALL
            .into_iter()
            .find(|font| font.pdf_name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(BaseFont::Helvetica)
    }

    fn advance(self, ch: char) -> u16 {
        let widths = match self {
            // The oblique face shares the upright metrics.
            BaseFont::Helvetica | BaseFont::HelveticaOblique => &HELVETICA_WIDTHS,
            BaseFont::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };
        let code = ch as u32;
        if let Some(width) = code
            .checked_sub(FIRST_CHAR)
            .and_then(|idx| widths.get(idx as usize))
        {
            return *width;
        }
        match ch {
            '\u{2014}' => 1000,
            '\u{2013}' => 556,
            '\u{2022}' => 350,
            '\u{2018}' | '\u{2019}' => {
                if self == BaseFont::HelveticaBold { 278 } else { 222 }
            }
            '\u{201C}' | '\u{201D}' => {
                if self == BaseFont::HelveticaBold { 500 } else { 333 }
            }
            '\u{00A0}' => 278,
            _ => MISSING_WIDTH,
        }
    }
}

pub fn measure_text_width(font: BaseFont, font_size: Pt, text: &str) -> Pt {
    let units: i32 = text
        .chars()
        .map(|ch| font.advance(ch) as i32)
        .fold(0i32, |acc, w| acc.saturating_add(w));
    if units <= 0 {
        return Pt::ZERO;
    }
    font_size.mul_ratio(units, 1000)
}

/// Greedy line packing on whitespace. A word wider than `max_width` is kept
/// whole on a line of its own.
pub fn wrap_text(text: &str, font: BaseFont, font_size: Pt, max_width: Pt) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure_text_width(font, font_size, &candidate) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths_match_afm() {
        let size = Pt::from_f32(10.0);
        // H=722 e=556 l=222 l=222 o=556
        assert_eq!(
            measure_text_width(BaseFont::Helvetica, size, "Hello").to_milli_i64(),
            22_780
        );
        assert!(
            measure_text_width(BaseFont::HelveticaBold, size, "Hello")
                > measure_text_width(BaseFont::Helvetica, size, "Hello")
        );
        assert_eq!(
            measure_text_width(BaseFont::HelveticaOblique, size, "Hello"),
            measure_text_width(BaseFont::Helvetica, size, "Hello")
        );
        assert_eq!(measure_text_width(BaseFont::Helvetica, size, ""), Pt::ZERO);
    }

    #[test]
    fn names_resolve() {
        assert_eq!(BaseFont::from_name("Helvetica-Bold"), BaseFont::HelveticaBold);
        assert_eq!(BaseFont::from_name("Times-Roman"), BaseFont::Helvetica);
    }

    #[test]
    fn wrap_packs_greedily() {
        let size = Pt::from_f32(10.0);
        let text = "aaa bbb ccc ddd";
        // "aaa bbb" = 7 glyphs: 6*556 + 278 = 3614 units -> 36.14pt
        let lines = wrap_text(text, BaseFont::Helvetica, size, Pt::from_f32(37.0));
        assert_eq!(lines, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn long_word_gets_its_own_line() {
        let size = Pt::from_f32(10.0);
        let lines = wrap_text(
            "a supercalifragilistic b",
            BaseFont::Helvetica,
            size,
            Pt::from_f32(30.0),
        );
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn wrapped_lines_fit_unless_single_word() {
        let size = Pt::from_f32(10.0);
        let max = Pt::from_f32(120.0);
        let text = "Improve typographic hierarchy and legibility (ensure clear H1/H2, adequate font sizes, and line-height).";
        let lines = wrap_text(text, BaseFont::Helvetica, size, max);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(
                measure_text_width(BaseFont::Helvetica, size, line) <= max
                    || !line.contains(' ')
            );
        }
        assert_eq!(lines.join(" "), text);
    }
}
