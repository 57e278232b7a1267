//! Image extractor with OCR skip heuristics.
//!
//! Dimensions are probed first; images too small to carry legible text
//! and icon files skip OCR outright. Actual recognition runs through
//! tesseract behind the `ocr` feature; without it, non-skipped images
//! report a missing backend. SVG is text under the hood and is read
//! directly.

use crate::Extractor;
use silo_core::{ExtractedContent, FileMeta, SiloError};

/// Images narrower or shorter than this skip OCR.
const MIN_OCR_DIMENSION: u32 = 50;

/// Extractor for raster and vector images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl Extractor for ImageExtractor {
    fn extract(&self, meta: &FileMeta) -> ExtractedContent {
        if meta.extension == "svg" {
            return match std::fs::read_to_string(&meta.path) {
                Ok(body) => ExtractedContent::Text { body },
                Err(e) => ExtractedContent::Failed { error: e.into() },
            };
        }

        let (width, height) = match image::image_dimensions(&meta.path) {
            Ok(dims) => dims,
            Err(e) => {
                return ExtractedContent::Failed {
                    error: SiloError::InvalidData(format!("cannot probe image: {e}")),
                }
            }
        };

        if let Some(reason) = skip_reason(width, height, &meta.extension) {
            tracing::debug!(file = %meta.name, reason, "skipping ocr");
            return ExtractedContent::ImageOcr {
                text: String::new(),
                width,
                height,
                skipped: true,
                skip_reason: Some(reason.to_string()),
            };
        }

        match run_ocr(meta) {
            Ok(text) => ExtractedContent::ImageOcr {
                text,
                width,
                height,
                skipped: false,
                skip_reason: None,
            },
            Err(error) => ExtractedContent::Failed { error },
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        silo_core::FormatGroup::Image.extensions()
    }
}

/// Why OCR is skipped for an image, if it is.
fn skip_reason(width: u32, height: u32, extension: &str) -> Option<&'static str> {
    if width < MIN_OCR_DIMENSION || height < MIN_OCR_DIMENSION {
        return Some("too_small");
    }
    if extension == "ico" {
        return Some("icon_format");
    }
    None
}

#[cfg(feature = "ocr")]
fn run_ocr(meta: &FileMeta) -> Result<String, SiloError> {
    let mut engine = leptess::LepTess::new(None, "eng")
        .map_err(|e| SiloError::MissingDependency(format!("tesseract init failed: {e}")))?;
    engine
        .set_image(&meta.path)
        .map_err(|e| SiloError::InvalidData(format!("tesseract rejected image: {e}")))?;
    let text = engine
        .get_utf8_text()
        .map_err(|e| SiloError::Permanent(format!("ocr failed: {e}")))?;
    Ok(text.trim().to_string())
}

#[cfg(not(feature = "ocr"))]
fn run_ocr(_meta: &FileMeta) -> Result<String, SiloError> {
    Err(SiloError::MissingDependency(
        "ocr support not compiled in (enable the `ocr` feature)".to_string(),
    ))
}
