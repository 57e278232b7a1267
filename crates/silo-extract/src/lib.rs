//! # Silo Extract - Format Extractors
//!
//! One extractor per format family, all implementing [`Extractor`] and
//! dispatched by extension through the [`ExtractorRegistry`]. Extractors
//! never panic and never abort the pipeline: every failure comes back as
//! `ExtractedContent::Failed` and is persisted against the file.

mod archive;
mod email;
mod image_ocr;
mod office;
mod pdf;
mod registry;
mod staging;
mod text;

pub use archive::ArchiveExtractor;
pub use email::EmailExtractor;
pub use image_ocr::ImageExtractor;
pub use office::OfficeExtractor;
pub use pdf::{classify_pdf, PdfClass, PdfExtractor};
pub use registry::ExtractorRegistry;
pub use staging::unique_extraction_dir;
pub use text::TextExtractor;

use silo_core::{ExtractedContent, FileMeta};

/// A format-family extractor.
///
/// `extract` must be total: failures are reported through
/// `ExtractedContent::Failed`, not panics or `Result`.
pub trait Extractor: Send + Sync {
    /// Extract content from a file of this family.
    fn extract(&self, meta: &FileMeta) -> ExtractedContent;

    /// Extensions (without dots) handled by this extractor.
    fn extensions(&self) -> &'static [&'static str];
}
