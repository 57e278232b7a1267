//! Extension groups that route files to extractors.
//!
//! The registry of supported extensions lives in one place so the
//! dispatcher, the priority function and the extractors never drift apart.

/// Extractor family a file extension belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatGroup {
    /// PDF documents.
    Pdf,
    /// Word, Excel and PowerPoint documents (modern and legacy).
    Office,
    /// Raster and vector images, routed through OCR.
    Image,
    /// Email containers (single messages and mailboxes).
    Email,
    /// Archives whose contents are extracted and re-ingested.
    Archive,
    /// Everything text-ish that needs no dedicated parser.
    Remaining,
}

const PDF_EXTENSIONS: &[&str] = &["pdf"];

const OFFICE_EXTENSIONS: &[&str] = &["docx", "doc", "xlsx", "xls", "csv", "pptx", "ppt"];

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "tiff", "tif", "webp", "ico", "svg",
];

const EMAIL_EXTENSIONS: &[&str] = &["eml", "msg", "mbox", "pst"];

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar", "gz", "bz2", "rar", "7z"];

const REMAINING_EXTENSIONS: &[&str] = &[
    "json", "xml", "txt", "yaml", "yml", "html", "htm", "bin", "rtf", "md", "log", "ini", "cfg",
];

impl FormatGroup {
    /// Resolve the group for a file extension (leading dot optional,
    /// case-insensitive). Returns `None` for unknown extensions.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let ext = ext.as_str();
        // Office wins the `.csv` overlap with Remaining, matching the
        // dispatch order of the extractor registry.
        if PDF_EXTENSIONS.contains(&ext) {
            Some(Self::Pdf)
        } else if OFFICE_EXTENSIONS.contains(&ext) {
            Some(Self::Office)
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Some(Self::Image)
        } else if EMAIL_EXTENSIONS.contains(&ext) {
            Some(Self::Email)
        } else if ARCHIVE_EXTENSIONS.contains(&ext) {
            Some(Self::Archive)
        } else if REMAINING_EXTENSIONS.contains(&ext) {
            Some(Self::Remaining)
        } else {
            None
        }
    }

    /// All extensions (without dots) handled by this group.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Pdf => PDF_EXTENSIONS,
            Self::Office => OFFICE_EXTENSIONS,
            Self::Image => IMAGE_EXTENSIONS,
            Self::Email => EMAIL_EXTENSIONS,
            Self::Archive => ARCHIVE_EXTENSIONS,
            Self::Remaining => REMAINING_EXTENSIONS,
        }
    }

    /// Whether files in this group stage child files for re-ingestion.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Archive | Self::Email)
    }
}
