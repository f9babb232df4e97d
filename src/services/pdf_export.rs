// Report Exporter
//
// Lays a text transcript out onto fixed-size pages (title and timestamp on page
// one, word-wrapped body, page break at the bottom margin) and renders the
// layout to PDF. Layout is a pure function of (text, page size, timestamp).

use chrono::{Local, NaiveDateTime};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use thiserror::Error;

pub const REPORT_TITLE: &str = "AI Data Analysis Report";
pub const REPORT_FILE_NAME: &str = "ai_analysis_report.pdf";

const MARGIN: f32 = 50.0;
const TITLE_SIZE: f32 = 16.0;
const STAMP_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 12.0;
const LINE_HEIGHT: f32 = 15.0;
const BODY_TOP_OFFSET: f32 = 100.0;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("character {0:?} cannot be encoded in the report font")]
    Encoding(char),

    #[error("failed to render PDF: {0}")]
    Render(String),
}

/// Page size in PostScript points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const A4: PageSize = PageSize {
        width: 595.2756,
        height: 841.8898,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFont {
    Regular,
    Bold,
}

/// One string drawn at a fixed position (points, origin bottom-left)
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub text: String,
    pub font: ReportFont,
    pub size: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    pub items: Vec<PlacedText>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub page: PageSize,
    pub pages: Vec<PageLayout>,
}

impl ReportLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Paginate `text` under the report header
pub fn layout_report(text: &str, page: PageSize, generated_at: NaiveDateTime) -> ReportLayout {
    let mut first = PageLayout::default();
    first.items.push(PlacedText {
        text: REPORT_TITLE.to_string(),
        font: ReportFont::Bold,
        size: TITLE_SIZE,
        x: MARGIN,
        y: page.height - 50.0,
    });
    first.items.push(PlacedText {
        text: format!("Generated on: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        font: ReportFont::Regular,
        size: STAMP_SIZE,
        x: MARGIN,
        y: page.height - 70.0,
    });

    let mut pages = vec![first];
    let mut y = page.height - BODY_TOP_OFFSET;

    for line in wrap_text(text, BODY_SIZE, page.width - 2.0 * MARGIN) {
        if y < MARGIN {
            pages.push(PageLayout::default());
            y = page.height - MARGIN;
        }
        if let Some(current) = pages.last_mut() {
            current.items.push(PlacedText {
                text: line,
                font: ReportFont::Regular,
                size: BODY_SIZE,
                x: MARGIN,
                y,
            });
        }
        y -= LINE_HEIGHT;
    }

    ReportLayout { page, pages }
}

/// Render `text` to an A4 PDF stamped with the current local time
pub fn export_report(text: &str) -> Result<Vec<u8>, ExportError> {
    export_report_at(text, PageSize::A4, Local::now().naive_local())
}

pub fn export_report_at(text: &str, page: PageSize, generated_at: NaiveDateTime) -> Result<Vec<u8>, ExportError> {
    if let Some(ch) = text.chars().find(|&c| c as u32 > 0xFF) {
        return Err(ExportError::Encoding(ch));
    }

    let layout = layout_report(text, page, generated_at);
    let bytes = render(&layout)?;
    tracing::info!("Exported report: {} page(s), {} bytes", layout.page_count(), bytes.len());
    Ok(bytes)
}

fn render(layout: &ReportLayout) -> Result<Vec<u8>, ExportError> {
    let width = to_mm(layout.page.width);
    let height = to_mm(layout.page.height);
    let (doc, first_page, first_layer) = PdfDocument::new(REPORT_TITLE, width, height, "Layer 1");

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Render(e.to_string()))?;

    for (i, page) in layout.pages.iter().enumerate() {
        let (page_idx, layer_idx) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, "Layer 1")
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);
        for item in &page.items {
            let font: &IndirectFontRef = match item.font {
                ReportFont::Regular => &regular,
                ReportFont::Bold => &bold,
            };
            layer.use_text(item.text.clone(), item.size, to_mm(item.x), to_mm(item.y), font);
        }
    }

    doc.save_to_bytes().map_err(|e| ExportError::Render(e.to_string()))
}

fn to_mm(points: f32) -> Mm {
    Mm(points * 25.4 / 72.0)
}

/// Split text into lines no wider than `max_width` points.
///
/// Hard line breaks are kept, leading indentation is preserved on the first
/// wrapped segment, and a single word wider than the line is left unbroken.
pub fn wrap_text(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut lines = Vec::new();
    for raw_line in text.replace('\r', "").replace('\t', "    ").split('\n') {
        let indent: String = raw_line.chars().take_while(|c| *c == ' ').collect();
        let mut current = indent.clone();
        let mut has_word = false;

        for word in raw_line.split_whitespace() {
            let candidate = if has_word {
                format!("{} {}", current, word)
            } else {
                format!("{}{}", current, word)
            };
            if has_word && text_width(&candidate, font_size) > max_width {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            } else {
                current = candidate;
            }
            has_word = true;
        }
        lines.push(if has_word { current } else { String::new() });
    }
    lines
}

/// Width of `text` in points when set in Helvetica at `font_size`
pub fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(helvetica_width).sum::<u32>() as f32 * font_size / 1000.0
}

/// Helvetica advance widths (1/1000 em) for printable ASCII; 556 otherwise
fn helvetica_width(c: char) -> u32 {
    const ASCII: [u32; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
    ];
    let code = c as u32;
    if (32..127).contains(&code) {
        ASCII[(code - 32) as usize]
    } else {
        556
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_text_is_one_header_only_page() {
        let layout = layout_report("", PageSize::A4, stamp());
        assert_eq!(layout.page_count(), 1);
        assert_eq!(layout.pages[0].items.len(), 2);
        assert_eq!(layout.pages[0].items[0].text, REPORT_TITLE);
        assert_eq!(layout.pages[0].items[1].text, "Generated on: 2024-05-01 12:30:00");
    }

    #[test]
    fn test_long_text_spans_pages() {
        let text = (0..120).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let layout = layout_report(&text, PageSize::A4, stamp());
        assert!(layout.page_count() > 1);
        // 47 body lines fit under the header, 50 on later pages
        assert_eq!(layout.pages[0].items.len(), 2 + 47);
        assert_eq!(layout.pages[1].items.len(), 50);
        assert_eq!(layout.pages[1].items[0].text, "line 47");
        for page in &layout.pages {
            assert!(page.items.iter().all(|item| item.y >= MARGIN));
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let text = "Query: total of sales\n\n Output:\n  42";
        assert_eq!(
            layout_report(text, PageSize::A4, stamp()),
            layout_report(text, PageSize::A4, stamp())
        );
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "word ".repeat(200);
        let max_width = PageSize::A4.width - 100.0;
        let lines = wrap_text(&text, BODY_SIZE, max_width);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| text_width(l, BODY_SIZE) <= max_width));
    }

    #[test]
    fn test_wrap_keeps_blank_lines_and_indent() {
        let lines = wrap_text("a\n\n  b", BODY_SIZE, 500.0);
        assert_eq!(lines, vec!["a".to_string(), String::new(), "  b".to_string()]);
    }

    #[test]
    fn test_export_produces_pdf_bytes() {
        let bytes = export_report_at("Query: q\n\n Output:\n  a", PageSize::A4, stamp()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_export_rejects_unencodable_text() {
        let result = export_report_at("answer: \u{1F600}", PageSize::A4, stamp());
        assert!(matches!(result, Err(ExportError::Encoding('\u{1F600}'))));
    }
}
