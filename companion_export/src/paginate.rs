//! Wrapping and page breaking for the paginated export.
//!
//! Vertical positions are measured in points from the top edge of a page.
//! A block moves to a fresh page when it would cross the bottom margin; a
//! block taller than a whole page is continued line by line.

/// Fixed geometry of every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Maximum characters per line.
    pub line_width: usize,
    pub page_height: u32,
    pub page_width: u32,
    pub margin: u32,
    pub line_height: u32,
    /// Extra space after each block.
    pub block_gap: u32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            line_width: 90,
            page_height: 842,
            page_width: 595,
            margin: 40,
            line_height: 14,
            block_gap: 10,
        }
    }
}

impl PageLayout {
    const fn bottom(&self) -> u32 {
        self.page_height.saturating_sub(self.margin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    /// Offset of the line's top from the top of the page.
    pub y: u32,
    pub style: LineStyle,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedDocument {
    pub title: String,
    pub layout: PageLayout,
    pub pages: Vec<Vec<PlacedLine>>,
}

struct Cursor<'a> {
    layout: &'a PageLayout,
    pages: Vec<Vec<PlacedLine>>,
    y: u32,
}

impl<'a> Cursor<'a> {
    fn new(layout: &'a PageLayout) -> Self {
        Self {
            layout,
            pages: vec![Vec::new()],
            y: layout.margin,
        }
    }

    fn at_page_top(&self) -> bool {
        self.y == self.layout.margin
    }

    fn fits(&self, height: u32) -> bool {
        self.y + height <= self.layout.bottom()
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = self.layout.margin;
    }

    fn place(&mut self, text: String, style: LineStyle) {
        if !self.fits(self.layout.line_height) && !self.at_page_top() {
            self.new_page();
        }
        let line = PlacedLine {
            y: self.y,
            style,
            text,
        };
        if let Some(page) = self.pages.last_mut() {
            page.push(line);
        }
        self.y += self.layout.line_height;
    }
}

/// Lay out a title followed by text blocks.
pub(crate) fn layout(title: &str, blocks: &[String], layout: &PageLayout) -> PaginatedDocument {
    let mut cursor = Cursor::new(layout);

    for line in wrap(title, layout.line_width) {
        cursor.place(line, LineStyle::Title);
    }
    cursor.y += layout.line_height;

    for block in blocks {
        let lines = wrap(block, layout.line_width);
        let height = u32::try_from(lines.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(layout.line_height);
        if !cursor.fits(height) && !cursor.at_page_top() {
            cursor.new_page();
        }
        for line in lines {
            cursor.place(line, LineStyle::Body);
        }
        cursor.y += layout.block_gap;
    }

    PaginatedDocument {
        title: title.to_string(),
        layout: layout.clone(),
        pages: cursor.pages,
    }
}

/// Greedy word wrap to `width` characters. Explicit newlines are kept and
/// words longer than a line are split.
pub(crate) fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > width {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 {
                word.len()
            } else {
                current_len + 1 + word.len()
            };
            if needed > width {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_layout() -> PageLayout {
        // Room for 5 lines between the margins.
        PageLayout {
            line_width: 20,
            page_height: 90,
            page_width: 200,
            margin: 10,
            line_height: 14,
            block_gap: 0,
        }
    }

    #[test]
    fn wrap_breaks_on_word_boundaries() {
        assert_eq!(
            wrap("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
    }

    #[test]
    fn wrap_keeps_paragraphs_and_splits_long_words() {
        assert_eq!(wrap("ab\n\ncd", 10), vec!["ab", "", "cd"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("x abcdefgh", 4), vec!["x", "abcd", "efgh"]);
    }

    #[test]
    fn wrap_counts_characters_not_bytes() {
        assert_eq!(wrap("héllo wörld", 5), vec!["héllo", "wörld"]);
    }

    #[test]
    fn title_only_document_has_one_page() {
        let doc = layout("Music Chat History", &[], &small_layout());
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0][0].style, LineStyle::Title);
        assert_eq!(doc.pages[0][0].y, 10);
    }

    #[test]
    fn block_that_does_not_fit_starts_new_page() {
        // Title takes 2 line slots, the first block 2 more, leaving one.
        let blocks = vec![
            "one two\nthree".to_string(),
            "aaaaaaaaaaaaaaaaaaaa bbbbbbbbbbbbbbbbbbbb".to_string(),
            "x y z".to_string(),
        ];
        let doc = layout("T", &blocks, &small_layout());

        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].len(), 3);
        assert_eq!(doc.pages[1][0].text, "aaaaaaaaaaaaaaaaaaaa");
        assert_eq!(doc.pages[1][0].y, 10);
        assert_eq!(doc.pages[1][2].text, "x y z");
    }

    #[test]
    fn oversized_block_continues_on_next_page() {
        let long = (0..8).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let doc = layout("T", &[long], &small_layout());

        let body_lines: usize = doc
            .pages
            .iter()
            .flatten()
            .filter(|l| l.style == LineStyle::Body)
            .count();
        assert_eq!(body_lines, 8);
        assert!(doc.pages.len() >= 2);
        for page in &doc.pages {
            for line in page {
                assert!(line.y + 14 <= 80);
            }
        }
    }
}
