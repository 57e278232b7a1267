//! Extracted content variants and the text flattener.
//!
//! Every extractor returns one [`ExtractedContent`] value. The storage
//! pipeline reduces it to plain text with [`ExtractedContent::flatten_text`],
//! whose merge order per variant is part of the persistence contract:
//! ingesting the same file twice must tokenize the same text.

use crate::error::SiloError;
use std::path::PathBuf;

/// One page of a paged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

/// One sheet of a spreadsheet, rows of stringified cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// A free-standing table (e.g. from a word-processing document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// One presentation slide, all text shapes in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub texts: Vec<String>,
}

/// A single parsed email message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub date: String,
    pub message_id: String,
    /// All text parts merged in document order.
    pub body: String,
}

/// Tagged result of a format extractor.
#[derive(Debug, Clone)]
pub enum ExtractedContent {
    /// Plain textual content.
    Text { body: String },
    /// Paged documents (PDF).
    Paged { pages: Vec<Page> },
    /// Spreadsheets, sheets in workbook order.
    Tabular { sheets: Vec<Sheet> },
    /// Free-standing tables.
    Tables { tables: Vec<Table> },
    /// Presentations.
    Slides { slides: Vec<Slide> },
    /// Email container: messages plus staged attachments.
    Email {
        messages: Vec<EmailMessage>,
        /// Directory holding attachments written to disk, if any.
        attachments_dir: Option<PathBuf>,
        attachment_count: usize,
    },
    /// Archive whose contents were staged for re-ingestion.
    Archive { extraction_dir: PathBuf },
    /// Image run through OCR (or skipped by the OCR heuristics).
    ImageOcr {
        text: String,
        width: u32,
        height: u32,
        skipped: bool,
        skip_reason: Option<String>,
    },
    /// Extraction failed; the file is still persisted with this error.
    Failed { error: SiloError },
}

/// Email header fields merged into flattened text, in order.
const EMAIL_TEXT_FIELDS: usize = 7;

impl ExtractedContent {
    /// Collapse the variant into plain text for tokenization.
    ///
    /// Merge order per variant:
    /// - `Paged`: page texts joined with `\n`
    /// - `Tabular`/`Tables`: cells joined with spaces, rows with `\n`
    /// - `Slides`: text shapes per slide, slides joined with `\n`
    /// - `Email`: present headers then body, messages in order
    /// - `ImageOcr`/`Text`: the text itself
    /// - `Archive`/`Failed`: empty (children are ingested separately)
    #[must_use]
    pub fn flatten_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match self {
            Self::Text { body } => push_trimmed(&mut parts, body),
            Self::Paged { pages } => {
                for page in pages {
                    push_trimmed(&mut parts, &page.text);
                }
            }
            Self::Tabular { sheets } => {
                for sheet in sheets {
                    push_rows(&mut parts, &sheet.rows);
                }
            }
            Self::Tables { tables } => {
                for table in tables {
                    push_rows(&mut parts, &table.rows);
                }
            }
            Self::Slides { slides } => {
                for slide in slides {
                    let joined = slide
                        .texts
                        .iter()
                        .map(|t| t.trim())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    push_trimmed(&mut parts, &joined);
                }
            }
            Self::Email { messages, .. } => {
                for message in messages {
                    let mut fields: Vec<&str> = Vec::with_capacity(EMAIL_TEXT_FIELDS + 1);
                    fields.extend([
                        message.from.as_str(),
                        message.to.as_str(),
                        message.cc.as_str(),
                        message.bcc.as_str(),
                        message.subject.as_str(),
                        message.date.as_str(),
                        message.message_id.as_str(),
                        message.body.as_str(),
                    ]);
                    for field in fields {
                        push_trimmed(&mut parts, field);
                    }
                }
            }
            Self::ImageOcr { text, .. } => push_trimmed(&mut parts, text),
            Self::Archive { .. } | Self::Failed { .. } => {}
        }
        parts.join("\n")
    }

    /// Title candidate for this content: an email subject when present.
    ///
    /// The storage pipeline falls back to the file name when this
    /// returns `None`.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Email { messages, .. } => messages
                .iter()
                .map(|m| m.subject.trim())
                .find(|s| !s.is_empty()),
            _ => None,
        }
    }

    /// The staged child directory for container variants.
    #[must_use]
    pub fn staged_children(&self) -> Option<&PathBuf> {
        match self {
            Self::Archive { extraction_dir } => Some(extraction_dir),
            Self::Email {
                attachments_dir: Some(dir),
                attachment_count,
                ..
            } if *attachment_count > 0 => Some(dir),
            _ => None,
        }
    }

    /// Whether extraction failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// The extraction error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&SiloError> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

fn push_trimmed(parts: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
}

fn push_rows(parts: &mut Vec<String>, rows: &[Vec<String>]) {
    for row in rows {
        let joined = row
            .iter()
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !joined.is_empty() {
            parts.push(joined);
        }
    }
}
