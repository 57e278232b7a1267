//! File-type detection from leading bytes.
//!
//! Attachments and archive members frequently carry wrong or missing
//! extensions. Before a staged child re-enters the pipeline its true
//! format is sniffed from the first bytes and the file name corrected so
//! dispatch picks the right extractor.

use std::path::Path;

/// How many leading bytes are enough for every signature in the table.
pub const SNIFF_WINDOW: usize = 4096;

/// Extensions considered trustworthy even when detection disagrees.
const KNOWN_GOOD: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".jpg", ".jpeg", ".png", ".gif",
    ".zip", ".rar", ".7z",
];

/// Extensions that carry no format information at all.
const GENERIC: &[&str] = &[".bin", ".dat", ".tmp", ".file", ".attachment"];

/// Detect a file's extension from its leading bytes.
///
/// Returns a lowercase extension with a leading dot, or `".bin"` when
/// nothing matches.
#[must_use]
pub fn sniff_extension(data: &[u8]) -> &'static str {
    if data.len() < 2 {
        return ".bin";
    }

    // Signatures at fixed offsets.
    if data.len() > 132 && &data[128..132] == b"DICM" {
        return ".dcm";
    }
    if data.len() > 262 && &data[257..262] == b"ustar" {
        return ".tar";
    }

    // Container formats that need a second look inside.
    if data.starts_with(b"PK\x03\x04") {
        return sniff_zip_container(data);
    }
    if data.starts_with(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1") {
        return sniff_ole_container(data);
    }
    if data.starts_with(b"RIFF") && data.len() > 12 {
        return match &data[8..12] {
            b"WEBP" => ".webp",
            b"WAVE" => ".wav",
            b"AVI " => ".avi",
            _ => ".bin",
        };
    }

    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"%PDF", ".pdf"),
        (b"{\\rtf", ".rtf"),
        (b"SQLite format 3\x00", ".sqlite"),
        (b"!BDN", ".pst"),
        (b"\x21\x42\x4E\x41", ".ost"),
        (b"7z\xBC\xAF\x27\x1C", ".7z"),
        (b"Rar!\x1A\x07\x01\x00", ".rar"),
        (b"Rar!\x1A\x07\x00", ".rar"),
        (b"Rar!\x1A\x07", ".rar"),
        (b"\xFD7zXZ\x00", ".xz"),
        (b"\x1F\x8B", ".gz"),
        (b"BZh", ".bz2"),
        (b"PK\x07\x08", ".zip"),
        (b"PK\x05\x06", ".zip"),
        (b"\x89PNG\r\n\x1a\n", ".png"),
        (b"\xFF\xD8\xFF", ".jpg"),
        (b"GIF89a", ".gif"),
        (b"GIF87a", ".gif"),
        (b"BM", ".bmp"),
        (b"MM\x00*", ".tiff"),
        (b"II*\x00", ".tiff"),
        (b"\x00\x00\x01\x00", ".ico"),
        (b"\x7FELF", ".elf"),
        (b"MZ", ".exe"),
    ];

    for (sig, ext) in SIGNATURES {
        if data.starts_with(sig) {
            return ext;
        }
    }

    sniff_text(data)
}

/// Distinguish Office Open XML and EPUB from a plain ZIP by the member
/// names visible near the start of the archive.
fn sniff_zip_container(data: &[u8]) -> &'static str {
    let window = &data[..data.len().min(SNIFF_WINDOW)];
    let text = String::from_utf8_lossy(window).to_lowercase();
    if text.contains("word/") {
        ".docx"
    } else if text.contains("xl/") || text.contains("worksheets/") {
        ".xlsx"
    } else if text.contains("ppt/") || text.contains("slides/") {
        ".pptx"
    } else if text.contains("epub") {
        ".epub"
    } else {
        ".zip"
    }
}

/// Distinguish legacy Office formats and Outlook messages inside an OLE
/// compound file by their stream names.
fn sniff_ole_container(data: &[u8]) -> &'static str {
    let window = &data[..data.len().min(8192)];
    let lower: Vec<u8> = window.iter().map(u8::to_ascii_lowercase).collect();
    if contains(&lower, b"worddocument") {
        ".doc"
    } else if contains(&lower, b"workbook") {
        ".xls"
    } else if contains(&lower, b"powerpoint") {
        ".ppt"
    } else if contains(&lower, b"__substg1.0_") {
        ".msg"
    } else {
        ".ole"
    }
}

/// Last resort: recognize text formats by their leading characters.
fn sniff_text(data: &[u8]) -> &'static str {
    if data.len() <= 10 {
        return ".bin";
    }
    let head = String::from_utf8_lossy(&data[..data.len().min(500)]);
    let head = head.trim_start().to_lowercase();
    if head.starts_with("<?xml") {
        if head.contains("<svg") {
            ".svg"
        } else {
            ".xml"
        }
    } else if head.starts_with("<!doctype html") || head.starts_with("<html") {
        ".html"
    } else if head.starts_with('{') && head.contains('"') {
        ".json"
    } else {
        ".bin"
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Repair a file name so its extension matches the detected content type.
///
/// - no extension, or a generic one (`.bin`, `.dat`, ...): replaced
/// - extension agrees with detection: kept
/// - unknown extension with a confident detection: replaced
/// - well-known document extensions: kept even when detection disagrees
#[must_use]
pub fn corrected_file_name(name: &str, data: &[u8]) -> String {
    let detected = sniff_extension(data);
    if name.is_empty() {
        return format!("attachment{detected}");
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let current = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    if current.is_empty() || GENERIC.contains(&current.as_str()) {
        return format!("{stem}{detected}");
    }
    if current == detected {
        return name.to_string();
    }
    if detected != ".bin" && !KNOWN_GOOD.contains(&current.as_str()) {
        return format!("{stem}{detected}");
    }
    name.to_string()
}
