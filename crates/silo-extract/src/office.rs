//! Extractor for office documents.
//!
//! - XLSX/XLS through calamine
//! - CSV through the csv crate
//! - DOCX and PPTX by walking the Open XML parts inside the zip
//! - legacy DOC/XLS/PPT (OLE compound files) report a missing backend

use crate::Extractor;
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader as _};
use quick_xml::events::Event;
use quick_xml::Reader;
use silo_core::{ExtractedContent, FileMeta, Sheet, SiloError, Slide};
use std::io::Read as _;

/// Extractor for spreadsheet, word-processing and presentation formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfficeExtractor;

impl Extractor for OfficeExtractor {
    fn extract(&self, meta: &FileMeta) -> ExtractedContent {
        let result = match meta.extension.as_str() {
            "xlsx" | "xls" => read_workbook(meta),
            "csv" => read_csv(meta),
            "docx" => read_docx(meta),
            "pptx" => read_pptx(meta),
            "doc" | "ppt" => Err(anyhow::Error::new(SiloError::MissingDependency(format!(
                "no OLE compound-file backend for .{}",
                meta.extension
            )))),
            other => Err(anyhow::Error::new(SiloError::UnsupportedType(other.to_string()))),
        };
        match result {
            Ok(content) => content,
            Err(e) => ExtractedContent::Failed { error: to_silo_error(e) },
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        silo_core::FormatGroup::Office.extensions()
    }
}

/// Preserve a typed `SiloError` cause; classify anything else.
fn to_silo_error(e: anyhow::Error) -> SiloError {
    match e.downcast::<SiloError>() {
        Ok(err) => err,
        Err(other) => SiloError::classify(other.to_string()),
    }
}

fn read_workbook(meta: &FileMeta) -> Result<ExtractedContent> {
    let mut workbook = open_workbook_auto(&meta.path)
        .with_context(|| format!("cannot open workbook: {}", meta.path.display()))?;
    let mut sheets = Vec::new();
    for (name, range) in workbook.worksheets() {
        let mut rows = Vec::new();
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect();
            if cells.iter().any(|c| !c.trim().is_empty()) {
                rows.push(cells);
            }
        }
        sheets.push(Sheet { name, rows });
    }
    Ok(ExtractedContent::Tabular { sheets })
}

fn read_csv(meta: &FileMeta) -> Result<ExtractedContent> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&meta.path)
        .with_context(|| format!("cannot open csv: {}", meta.path.display()))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed csv record")?;
        rows.push(record.iter().map(ToString::to_string).collect());
    }
    Ok(ExtractedContent::Tabular {
        sheets: vec![Sheet { name: meta.name.clone(), rows }],
    })
}

fn read_docx(meta: &FileMeta) -> Result<ExtractedContent> {
    let xml = read_zip_part(meta, "word/document.xml")?;
    let paragraphs = collect_paragraphs(&xml, b"w:t", b"w:p")?;
    Ok(ExtractedContent::Text { body: paragraphs.join("\n") })
}

fn read_pptx(meta: &FileMeta) -> Result<ExtractedContent> {
    let file = std::fs::File::open(&meta.path)
        .with_context(|| format!("cannot open pptx: {}", meta.path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("pptx is not a zip archive")?;

    // Slide parts are ppt/slides/slideN.xml; keep deck order.
    let mut slide_names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .filter(|name| {
            name.starts_with("ppt/slides/slide") && name.ends_with(".xml")
        })
        .collect();
    slide_names.sort_by_key(|name| slide_number(name));

    let mut slides = Vec::new();
    for name in slide_names {
        let mut xml = String::new();
        archive
            .by_name(&name)
            .with_context(|| format!("missing slide part: {name}"))?
            .read_to_string(&mut xml)?;
        let texts = collect_paragraphs(&xml, b"a:t", b"a:p")?;
        slides.push(Slide { texts });
    }
    Ok(ExtractedContent::Slides { slides })
}

fn slide_number(name: &str) -> u32 {
    name.trim_start_matches("ppt/slides/slide")
        .trim_end_matches(".xml")
        .parse()
        .unwrap_or(u32::MAX)
}

fn read_zip_part(meta: &FileMeta, part: &str) -> Result<String> {
    let file = std::fs::File::open(&meta.path)
        .with_context(|| format!("cannot open: {}", meta.path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("not a zip archive: {}", meta.name))?;
    let mut xml = String::new();
    archive
        .by_name(part)
        .with_context(|| format!("missing part {part} in {}", meta.name))?
        .read_to_string(&mut xml)?;
    Ok(xml)
}

/// Collect the text runs of an Open XML part, grouped into paragraphs.
///
/// `text_tag` is the run element (`w:t`, `a:t`); `para_tag` closes a
/// paragraph (`w:p`, `a:p`).
fn collect_paragraphs(xml: &str, text_tag: &[u8], para_tag: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event().context("malformed document xml")? {
            Event::Start(e) if e.name().as_ref() == text_tag => in_text_run = true,
            Event::End(e) if e.name().as_ref() == text_tag => in_text_run = false,
            Event::End(e) if e.name().as_ref() == para_tag => {
                let paragraph = current.trim().to_string();
                if !paragraph.is_empty() {
                    paragraphs.push(paragraph);
                }
                current.clear();
            }
            Event::Text(t) if in_text_run => {
                current.push_str(&t.unescape().context("bad xml escape")?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    let tail = current.trim().to_string();
    if !tail.is_empty() {
        paragraphs.push(tail);
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn csv_becomes_one_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "name,qty\nscrew,40\nbolt,12\n").unwrap();
        let meta = FileMeta::scan(&path).unwrap();

        match OfficeExtractor.extract(&meta) {
            ExtractedContent::Tabular { sheets } => {
                assert_eq!(sheets.len(), 1);
                assert_eq!(sheets[0].rows.len(), 3);
                assert_eq!(sheets[0].rows[1], vec!["screw", "40"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn docx_paragraphs_are_joined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.docx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(
            br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph.</w:t></w:r></w:p>
  </w:body>
</w:document>"#,
        )
        .unwrap();
        zip.finish().unwrap();

        let meta = FileMeta::scan(&path).unwrap();
        match OfficeExtractor.extract(&meta) {
            ExtractedContent::Text { body } => {
                assert_eq!(body, "First paragraph.\nSecond paragraph.");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn pptx_slides_keep_deck_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, text) in [
            ("ppt/slides/slide2.xml", "Second slide"),
            ("ppt/slides/slide1.xml", "First slide"),
        ] {
            zip.start_file(name, options).unwrap();
            let xml = format!(
                r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:p><a:r><a:t>{text}</a:t></a:r></a:p></p:sld>"#
            );
            zip.write_all(xml.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        let meta = FileMeta::scan(&path).unwrap();
        match OfficeExtractor.extract(&meta) {
            ExtractedContent::Slides { slides } => {
                assert_eq!(slides.len(), 2);
                assert_eq!(slides[0].texts, vec!["First slide"]);
                assert_eq!(slides[1].texts, vec!["Second slide"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn legacy_formats_report_missing_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.doc");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0old word file").unwrap();
        let meta = FileMeta::scan(&path).unwrap();
        match OfficeExtractor.extract(&meta) {
            ExtractedContent::Failed { error } => {
                assert_eq!(error.kind(), silo_core::ErrorKind::MissingDependency);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
