#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Transcript exports.
//!
//! Two formats are produced from a section's messages:
//! - a flat text document, one block per message
//! - a paginated document (rendered to PDF) with a title header, wrapped
//!   lines and fixed-height pages
//!
//! Both are pure functions of their input: the same messages always give
//! byte-identical output.

mod paginate;
mod pdf;
mod text;

use chrono::{FixedOffset, Local, Offset, Utc};
use companion_core::{Message, Section};
use tracing::debug;

pub use paginate::{LineStyle, PageLayout, PaginatedDocument, PlacedLine};
pub use text::TIMESTAMP_FORMAT;

/// Flat text export of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextExport {
    pub file_name: String,
    pub content: String,
}

/// Paginated export of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedExport {
    pub file_name: String,
    pub document: PaginatedDocument,
}

impl PaginatedExport {
    #[must_use]
    pub fn to_pdf(&self) -> Vec<u8> {
        pdf::render(&self.document)
    }
}

/// Renders transcripts with a fixed timestamp offset and page layout.
#[derive(Debug, Clone)]
pub struct ExportEngine {
    offset: FixedOffset,
    layout: PageLayout,
}

impl ExportEngine {
    #[must_use]
    pub const fn new(offset: FixedOffset, layout: PageLayout) -> Self {
        Self { offset, layout }
    }

    /// Engine using the machine's current UTC offset.
    #[must_use]
    pub fn with_local_time(layout: PageLayout) -> Self {
        let offset = Local::now().offset().fix();
        Self::new(offset, layout)
    }

    /// Engine rendering timestamps in UTC.
    #[must_use]
    pub fn utc(layout: PageLayout) -> Self {
        Self::new(Utc.fix(), layout)
    }

    #[must_use]
    pub const fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[must_use]
    pub fn export_text(&self, section: &Section, messages: &[Message]) -> TextExport {
        debug!(
            "Exporting {} message(s) of {} as text",
            messages.len(),
            section.id
        );
        TextExport {
            file_name: file_name(section, "txt"),
            content: text::render(messages, &self.offset),
        }
    }

    #[must_use]
    pub fn export_paginated(&self, section: &Section, messages: &[Message]) -> PaginatedExport {
        let blocks: Vec<String> = messages
            .iter()
            .map(|m| text::block(m, &self.offset))
            .collect();
        let document = paginate::layout(&title(section), &blocks, &self.layout);
        debug!(
            "Exporting {} message(s) of {} on {} page(s)",
            messages.len(),
            section.id,
            document.pages.len()
        );
        PaginatedExport {
            file_name: file_name(section, "pdf"),
            document,
        }
    }
}

fn title(section: &Section) -> String {
    format!("{} Chat History", section.name)
}

/// `<display name, lower-cased>_chat.<ext>`; whitespace becomes `_`.
#[must_use]
pub fn file_name(section: &Section, extension: &str) -> String {
    let stem: String = section
        .name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    format!("{stem}_chat.{extension}")
}
