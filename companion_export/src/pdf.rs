//! Minimal PDF 1.4 writer for paginated exports.
//!
//! Output uses the standard Helvetica fonts with `WinAnsiEncoding`, so no
//! font data is embedded. Latin-1 and the Windows-1252 punctuation render as
//! themselves; other characters are written as `?`. No creation date is
//! written, so rendering the same document twice gives the same bytes.

use std::fmt::Write as _;

use crate::paginate::{LineStyle, PaginatedDocument};

const BODY_FONT_SIZE: u32 = 11;
const TITLE_FONT_SIZE: u32 = 16;

// Object numbers fixed ahead of the per-page objects.
const CATALOG_ID: usize = 1;
const PAGES_ID: usize = 2;
const BODY_FONT_ID: usize = 3;
const TITLE_FONT_ID: usize = 4;
const FIRST_PAGE_ID: usize = 5;

struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    /// Objects must be written in id order starting at 1.
    fn object(&mut self, body: &str) {
        self.offsets.push(self.out.len());
        let id = self.offsets.len();
        self.out
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream(&mut self, content: &str) {
        let body = format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        );
        self.object(&body);
    }

    fn finish(mut self) -> Vec<u8> {
        let xref_at = self.out.len();
        let count = self.offsets.len() + 1;
        let mut tail = format!("xref\n0 {count}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            let _ = writeln!(tail, "{offset:010} 00000 n ");
        }
        let _ = write!(
            tail,
            "trailer\n<< /Size {count} /Root {CATALOG_ID} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        self.out.extend_from_slice(tail.as_bytes());
        self.out
    }
}

/// Windows-1252 code of `c`, for characters the standard fonts can draw.
fn win_ansi(c: char) -> Option<u8> {
    let code = match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => return u8::try_from(u32::from(c)).ok(),
        '\u{20ac}' => 0x80,
        '\u{201a}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201e}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02c6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8a,
        '\u{2039}' => 0x8b,
        '\u{0152}' => 0x8c,
        '\u{017d}' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02dc}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9a,
        '\u{203a}' => 0x9b,
        '\u{0153}' => 0x9c,
        '\u{017e}' => 0x9e,
        '\u{0178}' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// PDF string body for `text`. Bytes above ASCII use octal escapes so the
/// content stream stays 7-bit.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\t' => escaped.push(' '),
            _ => match win_ansi(c) {
                Some(code) if code.is_ascii() => escaped.push(char::from(code)),
                Some(code) => {
                    let _ = write!(escaped, "\\{code:03o}");
                }
                None => escaped.push('?'),
            },
        }
    }
    escaped
}

fn page_content(document: &PaginatedDocument, page: usize) -> String {
    let layout = &document.layout;
    let mut content = String::new();
    for line in document.pages.get(page).into_iter().flatten() {
        let (font, size) = match line.style {
            LineStyle::Title => ("F2", TITLE_FONT_SIZE),
            LineStyle::Body => ("F1", BODY_FONT_SIZE),
        };
        // PDF origin is bottom-left; place the baseline one font size below the line top.
        let baseline = layout.page_height.saturating_sub(line.y + size);
        let _ = writeln!(
            content,
            "BT /{font} {size} Tf {} {baseline} Td ({}) Tj ET",
            layout.margin,
            escape(&line.text)
        );
    }
    content
}

pub(crate) fn render(document: &PaginatedDocument) -> Vec<u8> {
    let layout = &document.layout;
    let page_count = document.pages.len().max(1);
    let mut pdf = PdfWriter::new();

    pdf.object(&format!("<< /Type /Catalog /Pages {PAGES_ID} 0 R >>"));

    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", FIRST_PAGE_ID + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");
    pdf.object(&format!(
        "<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"
    ));
    pdf.object(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );
    pdf.object(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
    );

    for page in 0..page_count {
        let page_id = FIRST_PAGE_ID + 2 * page;
        pdf.object(&format!(
            "<< /Type /Page /Parent {PAGES_ID} 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 {BODY_FONT_ID} 0 R /F2 {TITLE_FONT_ID} 0 R >> >> \
             /Contents {} 0 R >>",
            layout.page_width,
            layout.page_height,
            page_id + 1
        ));
        pdf.stream(&page_content(document, page));
    }

    pdf.finish()
}
