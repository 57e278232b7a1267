//! PDF extractor.
//!
//! Text is pulled per page with lopdf. The first three pages are sampled
//! to classify the document: text PDFs (average direct-extractable text
//! above 50 chars/page) never go near OCR; image PDFs would OCR each
//! page whose direct text stays under 30 chars, when a page rasterizer
//! backend is available.

use crate::Extractor;
use anyhow::{Context, Result};
use lopdf::Document;
use silo_core::{ExtractedContent, FileMeta, Page, SiloError};

/// Pages sampled for the text/image classification.
const CLASSIFY_SAMPLE_PAGES: usize = 3;
/// Mean chars/page above which the whole PDF counts as text-based.
const TEXT_PDF_MEAN_CHARS: usize = 50;
/// Direct-extraction length that lets an image-PDF page skip OCR.
const PAGE_DIRECT_TEXT_MIN: usize = 30;

/// Classification of a PDF from its sampled pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfClass {
    /// Digitally-born PDF; direct extraction is authoritative.
    Text,
    /// Scanned PDF; pages want OCR unless they carry enough direct text.
    Image,
}

/// Classify a PDF from the direct-extracted text lengths of its sampled
/// pages.
#[must_use]
pub fn classify_pdf(sample_lengths: &[usize]) -> PdfClass {
    if sample_lengths.is_empty() {
        return PdfClass::Image;
    }
    let mean = sample_lengths.iter().sum::<usize>() / sample_lengths.len();
    if mean > TEXT_PDF_MEAN_CHARS {
        PdfClass::Text
    } else {
        PdfClass::Image
    }
}

/// Extractor for PDF documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn extract(&self, meta: &FileMeta) -> ExtractedContent {
        match read_pdf(meta) {
            Ok(content) => content,
            Err(e) => ExtractedContent::Failed { error: SiloError::classify(e.to_string()) },
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        silo_core::FormatGroup::Pdf.extensions()
    }
}

fn read_pdf(meta: &FileMeta) -> Result<ExtractedContent> {
    let document = Document::load(&meta.path)
        .with_context(|| format!("cannot parse pdf: {}", meta.path.display()))?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();

    let mut pages = Vec::with_capacity(page_numbers.len());
    for &number in &page_numbers {
        let text = document.extract_text(&[number]).unwrap_or_default();
        pages.push(Page { number, text });
    }

    let sample_lengths: Vec<usize> = pages
        .iter()
        .take(CLASSIFY_SAMPLE_PAGES)
        .map(|p| p.text.trim().len())
        .collect();

    if classify_pdf(&sample_lengths) == PdfClass::Image {
        let ocr_candidates = pages
            .iter()
            .filter(|p| p.text.trim().len() < PAGE_DIRECT_TEXT_MIN)
            .count();
        if ocr_candidates > 0 {
            // Page OCR needs a rasterizer backend; direct text is kept
            // as the best available extraction.
            tracing::warn!(
                file = %meta.name,
                pages = ocr_candidates,
                "image-based pdf without a page rasterizer, keeping direct text"
            );
        }
    }

    Ok(ExtractedContent::Paged { pages })
}
