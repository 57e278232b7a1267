//! Per-run statistics and the end-of-run summary.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// File types shown in the summary distribution.
const SUMMARY_TOP_TYPES: usize = 10;

/// Counters for one dispatcher run.
///
/// `total` counts every produced result, staged children included;
/// `original_files` counts only the files found in the input.
/// Duplicates count toward `completed`.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub duplicates: u64,
    pub extracted_files: u64,
    pub original_files: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Result count per lowercased extension.
    pub file_types: HashMap<String, u64>,
}

impl RunStats {
    /// Record one file result.
    pub fn record(&mut self, extension: &str, failed: bool, duplicate: bool, extracted: bool) {
        self.total += 1;
        if failed {
            self.failed += 1;
        } else {
            self.completed += 1;
        }
        if duplicate {
            self.duplicates += 1;
        }
        if extracted {
            self.extracted_files += 1;
        }
        let key = if extension.is_empty() { "no_extension".to_string() } else { extension.to_string() };
        *self.file_types.entry(key).or_insert(0) += 1;
    }

    /// Completed share of all results, in percent.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }

    /// Wall-clock duration of the run in seconds.
    #[must_use]
    pub fn elapsed_seconds(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Multi-line human-readable summary.
    #[must_use]
    pub fn render_summary(&self, breaker_tripped: bool) -> String {
        let mut lines = Vec::new();
        let rule = "=".repeat(70);
        lines.push(rule.clone());
        lines.push("PROCESSING SUMMARY".to_string());
        lines.push(rule.clone());
        lines.push(format!("Original files:     {}", self.original_files));
        lines.push(format!("Extracted files:    {}", self.extracted_files));
        lines.push(format!("Total processed:    {}", self.total));
        lines.push(format!("Successful:         {}", self.completed));
        lines.push(format!("Duplicates:         {}", self.duplicates));
        lines.push(format!("Failed:             {}", self.failed));
        lines.push(format!("Success rate:       {:.1}%", self.success_rate()));
        lines.push(format!("Total time:         {:.2}s", self.elapsed_seconds()));
        if self.original_files > 0 && self.elapsed_seconds() > 0.0 {
            lines.push(format!(
                "Files per second:   {:.2}",
                self.original_files as f64 / self.elapsed_seconds()
            ));
        }
        if breaker_tripped {
            lines.push("Circuit breaker:    TRIPPED (advisory)".to_string());
        }

        if !self.file_types.is_empty() {
            lines.push(String::new());
            lines.push("File types:".to_string());
            let mut types: Vec<(&String, &u64)> = self.file_types.iter().collect();
            types.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (ext, count) in types.into_iter().take(SUMMARY_TOP_TYPES) {
                lines.push(format!("  .{ext:<12} {count}"));
            }
        }
        lines.push(rule);
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_count_as_completed() {
        let mut stats = RunStats::default();
        stats.record("txt", false, true, false);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn success_rate_over_mixed_outcomes() {
        let mut stats = RunStats::default();
        for _ in 0..3 {
            stats.record("txt", false, false, false);
        }
        stats.record("pdf", true, false, false);
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_lists_type_distribution() {
        let mut stats = RunStats::default();
        stats.original_files = 2;
        stats.record("txt", false, false, false);
        stats.record("txt", false, false, false);
        stats.record("pdf", true, false, true);
        let summary = stats.render_summary(true);
        assert!(summary.contains(".txt"));
        assert!(summary.contains("TRIPPED"));
        assert!(summary.contains("Extracted files:    1"));
    }
}
