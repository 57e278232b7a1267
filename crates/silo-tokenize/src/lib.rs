//! # Silo Tokenize - Entity-Aware Content Tokenizer
//!
//! Converts extracted text into a lossless token stream. URLs, email
//! addresses, dates and bare domains are recognized before general word
//! splitting and emitted as single tokens, so `user@example.com` never
//! shatters into `user`, `example`, `com`.
//!
//! Each [`Token`] carries the punctuation and spacing around the word;
//! concatenating `punct_before ∥ word ∥ punct_after ∥ spacing` over the
//! stream reconstructs the sanitized input's word-bearing regions.

mod patterns;

use patterns::{entity_patterns, WORD_PATTERN};
use std::collections::HashMap;

/// One token of the content stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Lowercased word or entity text.
    pub word: String,
    /// Punctuation immediately before the word.
    pub punct_before: String,
    /// Punctuation immediately after the word.
    pub punct_after: String,
    /// Whitespace separating this token from the next.
    pub spacing: String,
}

/// Entity occurrences found in a text, bucketed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub emails: Vec<String>,
    pub urls: Vec<String>,
    pub dates: Vec<String>,
    pub domains: Vec<String>,
}

/// Summary statistics over a text's token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStatistics {
    pub character_count: usize,
    pub word_count: usize,
    pub unique_word_count: usize,
    pub average_word_length: f64,
    pub lexical_diversity: f64,
}

/// Strip NUL bytes and C0 control characters except TAB, LF and CR.
///
/// Extractors occasionally surface binary junk (broken encodings, OCR
/// noise); sanitation runs before any pattern matching.
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| c >= ' ' || c == '\t' || c == '\n' || c == '\r')
        .collect()
}

/// Span of a recognized token within the sanitized text.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    const fn len(self) -> usize {
        self.end - self.start
    }
}

/// Find entity spans: all patterns matched in priority order, overlaps
/// resolved in a single left-to-right sweep where the longer match wins
/// and ties go to the earlier pattern.
fn entity_spans(text: &str) -> Vec<Span> {
    let mut raw: Vec<Span> = Vec::new();
    for pattern in entity_patterns() {
        for m in pattern.find_iter(text) {
            raw.push(Span { start: m.start(), end: m.end() });
        }
    }
    // Stable by start position: equal starts keep pattern-priority order.
    raw.sort_by_key(|s| s.start);

    let mut filtered: Vec<Span> = Vec::new();
    for span in raw {
        match filtered.last() {
            Some(last) if span.start < last.end => {
                if span.len() > last.len() {
                    *filtered.last_mut().expect("non-empty") = span;
                }
            }
            _ => filtered.push(span),
        }
    }
    filtered
}

/// All token spans (entities plus plain words) in document order.
fn token_spans(text: &str) -> Vec<Span> {
    let entities = entity_spans(text);
    let mut spans: Vec<Span> = Vec::new();
    let mut position = 0;

    for entity in entities {
        for m in WORD_PATTERN.find_iter(&text[position..entity.start]) {
            spans.push(Span { start: position + m.start(), end: position + m.end() });
        }
        spans.push(entity);
        position = entity.end;
    }
    for m in WORD_PATTERN.find_iter(&text[position..]) {
        spans.push(Span { start: position + m.start(), end: position + m.end() });
    }
    spans
}

/// Split a gap between two tokens into (punct_after, spacing, punct_before).
///
/// The leading non-whitespace run attaches to the previous token, the
/// trailing non-whitespace run to the next, and everything between is
/// spacing. The three pieces always concatenate back to the gap.
fn split_gap(gap: &str) -> (String, String, String) {
    let after_len: usize =
        gap.chars().take_while(|c| !c.is_whitespace()).map(char::len_utf8).sum();
    let (after, rest) = gap.split_at(after_len);
    if rest.is_empty() {
        return (after.to_string(), String::new(), String::new());
    }
    let before_len: usize = rest
        .chars()
        .rev()
        .take_while(|c| !c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    let (spacing, before) = rest.split_at(rest.len() - before_len);
    (after.to_string(), spacing.to_string(), before.to_string())
}

/// Tokenize text into the full `(word, punct_before, punct_after,
/// spacing)` stream, entities preserved whole.
#[must_use]
pub fn tokenize(text: &str) -> Vec<Token> {
    let text = sanitize(text);
    let spans = token_spans(&text);
    if spans.is_empty() {
        return Vec::new();
    }

    let mut tokens: Vec<Token> = spans
        .iter()
        .map(|span| Token {
            word: text[span.start..span.end].to_lowercase(),
            punct_before: String::new(),
            punct_after: String::new(),
            spacing: String::new(),
        })
        .collect();

    // Leading punctuation of the document attaches to the first token.
    let leading = &text[..spans[0].start];
    let (_, _, before_first) = split_gap(leading);
    tokens[0].punct_before = before_first;

    for i in 0..spans.len() {
        let gap_end = spans.get(i + 1).map_or(text.len(), |next| next.start);
        let gap = &text[spans[i].end..gap_end];
        let (after, spacing, before_next) = split_gap(gap);
        tokens[i].punct_after = after;
        tokens[i].spacing = spacing;
        if let Some(next) = tokens.get_mut(i + 1) {
            next.punct_before = before_next;
        }
    }
    tokens
}

/// Title variant: the ordered word list only, entities preserved.
#[must_use]
pub fn tokenize_words(text: &str) -> Vec<String> {
    let text = sanitize(text);
    token_spans(&text)
        .iter()
        .map(|span| text[span.start..span.end].to_lowercase())
        .collect()
}

/// Occurrence count per distinct token word.
#[must_use]
pub fn word_frequencies(tokens: &[Token]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.word.clone()).or_insert(0) += 1;
    }
    counts
}

/// Rebuild text from a token stream.
#[must_use]
pub fn reconstruct(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        out.push_str(&token.punct_before);
        out.push_str(&token.word);
        out.push_str(&token.punct_after);
        out.push_str(&token.spacing);
    }
    out
}

/// Extract entity occurrences bucketed by kind, for diagnostics and the
/// run summary. Bare domains are reported as scheme-less URLs; the
/// `domains` bucket only holds domains appearing in no email or URL.
#[must_use]
pub fn extract_entities(text: &str) -> Entities {
    let text = sanitize(text);
    let patterns = entity_patterns();
    let mut entities = Entities::default();

    for m in patterns[patterns::URL].find_iter(&text) {
        entities.urls.push(m.as_str().to_string());
    }
    for m in patterns[patterns::URL_NO_SCHEME].find_iter(&text) {
        let url = m.as_str().to_string();
        if !entities.urls.contains(&url) {
            entities.urls.push(url);
        }
    }
    for m in patterns[patterns::EMAIL].find_iter(&text) {
        entities.emails.push(m.as_str().to_string());
    }
    for m in patterns[patterns::DATE].find_iter(&text) {
        entities.dates.push(m.as_str().to_string());
    }
    for m in patterns[patterns::DATE_ISO].find_iter(&text) {
        let date = m.as_str().to_string();
        if !entities.dates.contains(&date) {
            entities.dates.push(date);
        }
    }

    let email_domains: Vec<String> = entities
        .emails
        .iter()
        .filter_map(|e| e.split_once('@').map(|(_, d)| d.to_string()))
        .collect();
    for m in patterns[patterns::DOMAIN].find_iter(&text) {
        let domain = m.as_str().to_string();
        let inside_url = entities.urls.iter().any(|u| u.contains(&domain));
        if !email_domains.contains(&domain) && !inside_url && !entities.domains.contains(&domain) {
            entities.domains.push(domain);
        }
    }
    entities
}

/// Summary statistics over a text.
#[must_use]
pub fn text_statistics(text: &str) -> TextStatistics {
    let words = tokenize_words(text);
    let unique: std::collections::HashSet<&String> = words.iter().collect();
    let total_len: usize = words.iter().map(String::len).sum();
    let word_count = words.len();
    TextStatistics {
        character_count: text.chars().count(),
        word_count,
        unique_word_count: unique.len(),
        average_word_length: if word_count == 0 {
            0.0
        } else {
            total_len as f64 / word_count as f64
        },
        lexical_diversity: if word_count == 0 {
            0.0
        } else {
            unique.len() as f64 / word_count as f64
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.word.as_str()).collect()
    }

    #[test]
    fn plain_words_are_lowercased() {
        let tokens = tokenize("Hello, world!");
        assert_eq!(words(&tokens), ["hello", "world"]);
        assert_eq!(tokens[0].punct_after, ",");
        assert_eq!(tokens[0].spacing, " ");
        assert_eq!(tokens[1].punct_after, "!");
    }

    #[test]
    fn emails_and_urls_stay_whole() {
        let tokens = tokenize("Contact: a@b.com, see https://x.y/z");
        let w = words(&tokens);
        assert!(w.contains(&"a@b.com"), "tokens: {w:?}");
        assert!(w.contains(&"https://x.y/z"), "tokens: {w:?}");
    }

    #[test]
    fn entity_punctuation_is_captured() {
        let tokens = tokenize("Contact: user@example.com, visit www.site.com");
        let email = tokens.iter().find(|t| t.word == "user@example.com").unwrap();
        assert_eq!(email.punct_after, ",");
        assert_eq!(email.spacing, " ");
        let contact = &tokens[0];
        assert_eq!(contact.word, "contact");
        assert_eq!(contact.punct_after, ":");
    }

    #[test]
    fn iso_dates_are_single_tokens() {
        let tokens = tokenize("Due on 2024-01-15, not later.");
        assert!(words(&tokens).contains(&"2024-01-15"));
    }

    #[test]
    fn written_dates_are_single_tokens() {
        let tokens = tokenize("Signed January 3, 2024 in Oslo");
        assert!(words(&tokens).iter().any(|w| w.starts_with("january 3")), "{tokens:?}");
    }

    #[test]
    fn url_with_scheme_beats_bare_domain() {
        let tokens = tokenize("see https://example.com/docs now");
        let w = words(&tokens);
        assert!(w.contains(&"https://example.com/docs"));
        assert!(!w.contains(&"example.com"));
    }

    #[test]
    fn overlap_prefers_longer_match() {
        // The bare-domain pattern matches a prefix of the full URL; the
        // sweep must keep only the longer URL span.
        let tokens = tokenize("www.site.com/path/page.html");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].word, "www.site.com/path/page.html");
    }

    #[test]
    fn reconstruction_roundtrips_word_regions() {
        let text = "Hello, world! Visit https://example.com on 2024-01-15.";
        let tokens = tokenize(text);
        assert_eq!(reconstruct(&tokens), text.to_lowercase());
    }

    #[test]
    fn sanitize_strips_controls_keeps_whitespace() {
        assert_eq!(sanitize("a\x00b\x01c\td\ne"), "abc\td\ne");
    }

    #[test]
    fn frequencies_count_repeats() {
        let tokens = tokenize("tick tock tick");
        let freq = word_frequencies(&tokens);
        assert_eq!(freq["tick"], 2);
        assert_eq!(freq["tock"], 1);
    }

    #[test]
    fn title_words_skip_punctuation() {
        let w = tokenize_words("Report: Q3 results (final)");
        assert_eq!(w, ["report", "q3", "results", "final"]);
    }

    #[test]
    fn empty_text_yields_no_tokens() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
        assert!(tokenize_words("...").is_empty());
    }

    #[test]
    fn apostrophes_and_hyphens_stay_in_words() {
        let w = tokenize_words("it's a well-known fact");
        assert!(w.contains(&"it's".to_string()));
        assert!(w.contains(&"well-known".to_string()));
    }

    #[test]
    fn entity_buckets_do_not_double_report_domains() {
        let entities = extract_entities("mail bob@corp.io or open https://corp.io/help also plain.org");
        assert_eq!(entities.emails, ["bob@corp.io"]);
        assert!(entities.urls.iter().any(|u| u.starts_with("https://corp.io")));
        assert!(entities.urls.contains(&"plain.org".to_string()));
        assert!(!entities.domains.contains(&"corp.io".to_string()));
    }

    #[test]
    fn statistics_compute_diversity() {
        let stats = text_statistics("one two two three three three");
        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.unique_word_count, 3);
        assert!((stats.lexical_diversity - 0.5).abs() < f64::EPSILON);
    }
}
