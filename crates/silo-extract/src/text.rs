//! Extractor for plain-text-ish formats.
//!
//! Covers everything that needs no dedicated parser: text, JSON, XML,
//! YAML, logs and config files are read as-is (lossy UTF-8), HTML is
//! tag-stripped, `.bin` yields no text.

use crate::Extractor;
use once_cell::sync::Lazy;
use regex::Regex;
use silo_core::{ExtractedContent, FileMeta};

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static SCRIPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").expect("script pattern")
});

/// Extractor for the "remaining" extension group.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn extract(&self, meta: &FileMeta) -> ExtractedContent {
        let bytes = match std::fs::read(&meta.path) {
            Ok(bytes) => bytes,
            Err(e) => return ExtractedContent::Failed { error: e.into() },
        };
        match meta.extension.as_str() {
            "bin" => ExtractedContent::Text { body: String::new() },
            "html" | "htm" => {
                let raw = String::from_utf8_lossy(&bytes);
                ExtractedContent::Text { body: strip_html(&raw) }
            }
            _ => ExtractedContent::Text { body: String::from_utf8_lossy(&bytes).into_owned() },
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        silo_core::FormatGroup::Remaining.extensions()
    }
}

/// Remove script/style blocks and tags, decode the common entities.
fn strip_html(html: &str) -> String {
    let without_scripts = SCRIPT_PATTERN.replace_all(html, " ");
    let without_tags = TAG_PATTERN.replace_all(&without_scripts, " ");
    without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &[u8]) -> FileMeta {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        FileMeta::scan(&path).unwrap()
    }

    #[test]
    fn plain_text_reads_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write(&dir, "a.txt", b"line one\nline two");
        match TextExtractor.extract(&meta) {
            ExtractedContent::Text { body } => assert_eq!(body, "line one\nline two"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn html_is_tag_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write(
            &dir,
            "p.html",
            b"<html><script>var x=1;</script><body><h1>Title</h1><p>Body &amp; text</p></body></html>",
        );
        match TextExtractor.extract(&meta) {
            ExtractedContent::Text { body } => {
                assert!(body.contains("Title"));
                assert!(body.contains("Body & text"));
                assert!(!body.contains("var x"));
                assert!(!body.contains('<'));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn binary_files_yield_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let meta = write(&dir, "blob.bin", &[0u8, 1, 2, 255]);
        match TextExtractor.extract(&meta) {
            ExtractedContent::Text { body } => assert!(body.is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_file_fails_cleanly() {
        let meta = FileMeta {
            name: "gone.txt".into(),
            path: "/nope/gone.txt".into(),
            kind: silo_core::EntryKind::File,
            extension: "txt".into(),
            size_bytes: 0,
            digest: "N/A".into(),
            modified: chrono::Utc::now(),
        };
        assert!(TextExtractor.extract(&meta).is_failed());
    }
}
