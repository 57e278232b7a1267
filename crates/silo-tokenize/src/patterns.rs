//! Entity regex patterns, compiled once.
//!
//! Order is the matching priority: URL-with-scheme, email, written or
//! numeric date, ISO date, URL-without-scheme, bare domain. The sweep in
//! `lib.rs` resolves overlaps, so the individual patterns can stay
//! permissive.

use once_cell::sync::Lazy;
use regex::Regex;

/// Index of the URL-with-scheme pattern.
pub(crate) const URL: usize = 0;
/// Index of the email pattern.
pub(crate) const EMAIL: usize = 1;
/// Index of the written/numeric date pattern.
pub(crate) const DATE: usize = 2;
/// Index of the ISO date pattern.
pub(crate) const DATE_ISO: usize = 3;
/// Index of the URL-without-scheme pattern.
pub(crate) const URL_NO_SCHEME: usize = 4;
/// Index of the bare-domain pattern.
pub(crate) const DOMAIN: usize = 5;

static PATTERNS: Lazy<[Regex; 6]> = Lazy::new(|| {
    [
        // URL with scheme.
        Regex::new(r#"(?i)\b(?:https?|ftp|ftps|file)://[^\s<>"{}|\\^`\[\]]+"#)
            .expect("url pattern"),
        // Email address.
        Regex::new(
            r"(?i)[a-z0-9](?:[a-z0-9._%+-]*[a-z0-9])?@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)+",
        )
        .expect("email pattern"),
        // Numeric and written dates, plus ISO timestamps.
        Regex::new(
            r"(?xi)\b(?:
                \d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4} |
                \d{2,4}[/\-.]\d{1,2}[/\-.]\d{1,2} |
                \d{1,2}(?:st|nd|rd|th)?\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{4} |
                (?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},?\s+\d{4} |
                \d{1,2}\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4} |
                \d{4}-\d{2}-\d{2}(?:T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:\d{2})?)? |
                \d{4}/\d{2}/\d{2}(?:\s+\d{2}:\d{2}:\d{2})?
            )\b",
        )
        .expect("date pattern"),
        // ISO date: YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD.
        Regex::new(r"\b\d{4}[-/.]\d{1,2}[-/.]\d{1,2}\b").expect("iso date pattern"),
        // URL without scheme.
        Regex::new(
            r#"(?i)\b(?:www\.)?[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+(?::\d+)?(?:/[^\s<>"{}|\\^`\[\]]*)?"#,
        )
        .expect("bare url pattern"),
        // Bare domain.
        Regex::new(r"(?i)\b(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b")
            .expect("domain pattern"),
    ]
});

/// Word fallback for non-entity spans: word characters plus apostrophes
/// and hyphens.
pub(crate) static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[\w'-]+\b").expect("word pattern"));

/// All entity patterns in priority order.
pub(crate) fn entity_patterns() -> &'static [Regex; 6] {
    &PATTERNS
}
