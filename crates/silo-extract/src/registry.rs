//! Extension-based dispatch to format extractors.

use crate::{
    ArchiveExtractor, EmailExtractor, Extractor, ImageExtractor, OfficeExtractor, PdfExtractor,
    TextExtractor,
};
use silo_core::{ExtractedContent, FileMeta, FormatGroup, SiloError};
use std::path::PathBuf;

/// Owns one extractor per format family and dispatches by extension.
pub struct ExtractorRegistry {
    text: TextExtractor,
    office: OfficeExtractor,
    pdf: PdfExtractor,
    image: ImageExtractor,
    archive: ArchiveExtractor,
    email: EmailExtractor,
}

impl ExtractorRegistry {
    /// Build a registry whose container extractors stage files under
    /// `extraction_root`.
    #[must_use]
    pub fn new(extraction_root: PathBuf) -> Self {
        Self {
            text: TextExtractor,
            office: OfficeExtractor,
            pdf: PdfExtractor,
            image: ImageExtractor,
            archive: ArchiveExtractor::new(extraction_root.clone()),
            email: EmailExtractor::new(extraction_root),
        }
    }

    /// Extract content for a file, routing on its extension.
    ///
    /// Unknown extensions and missing files come back as `Failed`
    /// content; dispatch itself never fails.
    #[must_use]
    pub fn dispatch(&self, meta: &FileMeta) -> ExtractedContent {
        if meta.extension.is_empty() {
            return ExtractedContent::Failed {
                error: SiloError::UnsupportedType("no file extension".to_string()),
            };
        }
        if !meta.path.exists() {
            return ExtractedContent::Failed {
                error: SiloError::Permanent(format!("file not found: {}", meta.path.display())),
            };
        }

        match FormatGroup::from_extension(&meta.extension) {
            Some(FormatGroup::Pdf) => self.pdf.extract(meta),
            Some(FormatGroup::Office) => self.office.extract(meta),
            Some(FormatGroup::Image) => self.image.extract(meta),
            Some(FormatGroup::Email) => self.email.extract(meta),
            Some(FormatGroup::Archive) => self.archive.extract(meta),
            Some(FormatGroup::Remaining) => self.text.extract(meta),
            None => ExtractedContent::Failed {
                error: SiloError::UnsupportedType(meta.dotted_extension()),
            },
        }
    }
}
