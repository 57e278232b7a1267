//! Archive extractor.
//!
//! Archives are not flattened into text: their contents are extracted
//! into a staging directory and the pipeline re-ingests each staged file
//! as a child of the archive's path row.

use crate::staging::unique_extraction_dir;
use crate::Extractor;
use anyhow::{Context, Result};
use silo_core::{ExtractedContent, FileMeta, SiloError};
use std::io::Read as _;
use std::path::{Path, PathBuf};

/// Extractor for archive formats.
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    extraction_root: PathBuf,
}

impl ArchiveExtractor {
    /// Create an archive extractor staging under `extraction_root`.
    #[must_use]
    pub fn new(extraction_root: PathBuf) -> Self {
        Self { extraction_root }
    }
}

impl Extractor for ArchiveExtractor {
    fn extract(&self, meta: &FileMeta) -> ExtractedContent {
        let result = match meta.extension.as_str() {
            "zip" => self.stage(meta, extract_zip),
            "tar" => self.stage(meta, extract_tar),
            "gz" => {
                if meta.name.to_lowercase().ends_with(".tar.gz") {
                    self.stage(meta, extract_tar_gz)
                } else {
                    self.stage(meta, extract_gz)
                }
            }
            "bz2" => {
                if meta.name.to_lowercase().ends_with(".tar.bz2") {
                    self.stage(meta, extract_tar_bz2)
                } else {
                    self.stage(meta, extract_bz2)
                }
            }
            "7z" => self.stage(meta, extract_7z),
            "rar" => Err(anyhow::Error::new(SiloError::MissingDependency(
                "no rar backend available".to_string(),
            ))),
            other => Err(anyhow::Error::new(SiloError::UnsupportedType(other.to_string()))),
        };
        match result {
            Ok(extraction_dir) => ExtractedContent::Archive { extraction_dir },
            Err(e) => ExtractedContent::Failed {
                error: match e.downcast::<SiloError>() {
                    Ok(err) => err,
                    Err(other) => SiloError::classify(other.to_string()),
                },
            },
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        silo_core::FormatGroup::Archive.extensions()
    }
}

impl ArchiveExtractor {
    fn stage(
        &self,
        meta: &FileMeta,
        extract: fn(&Path, &Path) -> Result<()>,
    ) -> Result<PathBuf> {
        let dir = unique_extraction_dir(&self.extraction_root, &meta.path)
            .context("cannot create staging directory")?;
        extract(&meta.path, &dir)?;
        Ok(dir)
    }
}

fn extract_zip(source: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(source)?;
    let mut archive = zip::ZipArchive::new(file).context("not a zip archive")?;
    archive.extract(destination).context("zip extraction failed")?;
    Ok(())
}

fn extract_tar(source: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(source)?;
    tar::Archive::new(file).unpack(destination).context("tar extraction failed")?;
    Ok(())
}

fn extract_tar_gz(source: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(source)?;
    let decoder = flate2::read::GzDecoder::new(file);
    tar::Archive::new(decoder).unpack(destination).context("tar.gz extraction failed")?;
    Ok(())
}

fn extract_tar_bz2(source: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(source)?;
    let decoder = bzip2::read::BzDecoder::new(file);
    tar::Archive::new(decoder).unpack(destination).context("tar.bz2 extraction failed")?;
    Ok(())
}

/// Single-member gzip: decompress to the stem name.
fn extract_gz(source: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(source)?;
    let mut decoder = flate2::read::GzDecoder::new(file);
    let mut contents = Vec::new();
    decoder.read_to_end(&mut contents).context("gz decompression failed")?;
    std::fs::write(destination.join(inner_name(source, "gz")), contents)?;
    Ok(())
}

/// Single-member bzip2: decompress to the stem name.
fn extract_bz2(source: &Path, destination: &Path) -> Result<()> {
    let file = std::fs::File::open(source)?;
    let mut decoder = bzip2::read::BzDecoder::new(file);
    let mut contents = Vec::new();
    decoder.read_to_end(&mut contents).context("bz2 decompression failed")?;
    std::fs::write(destination.join(inner_name(source, "bz2")), contents)?;
    Ok(())
}

fn extract_7z(source: &Path, destination: &Path) -> Result<()> {
    sevenz_rust::decompress_file(source, destination).context("7z extraction failed")?;
    Ok(())
}

fn inner_name(source: &Path, stripped_extension: &str) -> String {
    let name = source.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    name.strip_suffix(&format!(".{stripped_extension}"))
        .map_or_else(|| "extracted.bin".to_string(), ToString::to_string)
}
