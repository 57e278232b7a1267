//! Per-file priority, executor routing and small-file batching rules.
//!
//! Format membership defers to [`FormatGroup`] so the scheduler can
//! never drift from what the extractors actually dispatch on; only the
//! scheduling tiers themselves (fast text, batchable text) are defined
//! here.

use silo_core::{FileMeta, FormatGroup};

/// Files per small-text batch unit.
pub const SMALL_FILE_BATCH_LIMIT: usize = 10;

/// Size threshold routing a file to the CPU pool.
const CPU_SIZE_THRESHOLD: u64 = 10 * 1024 * 1024;
/// Size threshold for the second priority penalty.
const LARGE_SIZE_THRESHOLD: u64 = 50 * 1024 * 1024;
/// Maximum size of a batchable small text file.
const BATCHABLE_SIZE_LIMIT: u64 = 100 * 1024;

/// Formats cheap enough to lead the queue regardless of group.
const FAST_TEXT: &[&str] = &["txt", "json", "xml", "csv", "yaml", "yml"];
/// Formats eligible for small-text batch units.
const BATCHABLE: &[&str] = &["txt", "json", "xml", "csv"];

/// Scheduling priority for a file; lower runs earlier.
///
/// Fast text leads, then office documents, PDFs, images (OCR is slow)
/// and finally containers, which fan out into more work. Files over
/// 10 MiB are pushed back two levels and another level past 50 MiB,
/// capped at 10.
#[must_use]
pub fn file_priority(meta: &FileMeta) -> u8 {
    let ext = meta.extension.as_str();
    let base = if FAST_TEXT.contains(&ext) {
        1
    } else {
        match FormatGroup::from_extension(ext) {
            Some(FormatGroup::Office) => 3,
            Some(FormatGroup::Pdf) => 5,
            Some(FormatGroup::Image) => 7,
            Some(group) if group.is_container() => 9,
            _ => 5,
        }
    };

    let mut priority = base;
    if meta.size_bytes > CPU_SIZE_THRESHOLD {
        priority += 2;
    }
    if meta.size_bytes > LARGE_SIZE_THRESHOLD {
        priority += 1;
    }
    priority.min(10)
}

/// Whether a file runs on the CPU pool: large files and the groups
/// whose extraction is compute-heavy (PDF rendering, OCR, archive
/// expansion).
#[must_use]
pub fn routes_to_cpu(meta: &FileMeta) -> bool {
    if meta.size_bytes > CPU_SIZE_THRESHOLD {
        return true;
    }
    matches!(
        FormatGroup::from_extension(&meta.extension),
        Some(FormatGroup::Pdf | FormatGroup::Image | FormatGroup::Archive)
    )
}

/// Whether a file joins a small-text batch unit.
#[must_use]
pub fn is_batchable(meta: &FileMeta) -> bool {
    BATCHABLE.contains(&meta.extension.as_str()) && meta.size_bytes < BATCHABLE_SIZE_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_core::EntryKind;

    fn meta(extension: &str, size_bytes: u64) -> FileMeta {
        FileMeta {
            name: format!("f.{extension}"),
            path: format!("/f.{extension}").into(),
            kind: EntryKind::File,
            extension: extension.to_string(),
            size_bytes,
            digest: "N/A".into(),
            modified: chrono::Utc::now(),
        }
    }

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn priority_is_monotonic_across_groups() {
        let txt = file_priority(&meta("txt", MIB));
        let pdf = file_priority(&meta("pdf", MIB));
        let png = file_priority(&meta("png", MIB));
        let zip = file_priority(&meta("zip", MIB));
        assert!(txt < pdf && pdf < png && png < zip, "{txt} {pdf} {png} {zip}");
    }

    #[test]
    fn every_image_extension_gets_the_image_tier() {
        for ext in FormatGroup::Image.extensions() {
            assert_eq!(file_priority(&meta(ext, MIB)), 7, "wrong tier for .{ext}");
        }
    }

    #[test]
    fn containers_and_email_stores_share_the_last_tier() {
        for ext in FormatGroup::Archive.extensions() {
            assert_eq!(file_priority(&meta(ext, MIB)), 9, "wrong tier for .{ext}");
        }
        for ext in FormatGroup::Email.extensions() {
            assert_eq!(file_priority(&meta(ext, MIB)), 9, "wrong tier for .{ext}");
        }
    }

    #[test]
    fn size_penalties_stack_and_cap() {
        assert_eq!(file_priority(&meta("txt", MIB)), 1);
        assert_eq!(file_priority(&meta("txt", 11 * MIB)), 3);
        assert_eq!(file_priority(&meta("txt", 51 * MIB)), 4);
        // Containers cap at 10 even with both penalties.
        assert_eq!(file_priority(&meta("zip", 51 * MIB)), 10);
    }

    #[test]
    fn unknown_extension_is_medium_priority() {
        assert_eq!(file_priority(&meta("xyz", MIB)), 5);
    }

    #[test]
    fn routing_prefers_cpu_for_heavy_work() {
        assert!(routes_to_cpu(&meta("pdf", MIB)));
        assert!(routes_to_cpu(&meta("txt", 11 * MIB)));
        for ext in FormatGroup::Image.extensions() {
            assert!(routes_to_cpu(&meta(ext, MIB)), ".{ext} belongs on the CPU pool");
        }
        for ext in FormatGroup::Archive.extensions() {
            assert!(routes_to_cpu(&meta(ext, MIB)), ".{ext} belongs on the CPU pool");
        }
        // Email containers parse on the I/O pool; their attachments are
        // routed individually after staging.
        assert!(!routes_to_cpu(&meta("eml", MIB)));
        assert!(!routes_to_cpu(&meta("txt", MIB)));
        assert!(!routes_to_cpu(&meta("docx", MIB)));
    }

    #[test]
    fn only_small_text_batches() {
        assert!(is_batchable(&meta("txt", 50 * 1024)));
        assert!(is_batchable(&meta("json", 1024)));
        assert!(!is_batchable(&meta("txt", 200 * 1024)));
        assert!(!is_batchable(&meta("yaml", 1024)));
        assert!(!is_batchable(&meta("pdf", 1024)));
    }
}
