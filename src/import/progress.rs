//! Progress tracking for import runs

use crate::types::Cursor;
use crate::util::truncate_str;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::info;

/// Number of recent failures kept for the end-of-run summary
pub const RECENT_FAILURES: usize = 100;

/// Statistics for one import run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Items handed out by the enumerator
    pub enumerated: usize,
    /// Documents accepted by the sink (articles and redirects)
    pub published: usize,
    /// Published documents that were redirects
    pub redirects: usize,
    /// Self-redirects that were not published
    pub self_redirects: usize,
    /// Items skipped after a failure
    pub skipped: usize,
    /// Publish retries
    pub retries: usize,
    /// Cursor of the last enumerated item; resume after it
    pub last_cursor: Option<Cursor>,
    /// Most recent failures as (cursor, reason), oldest first
    pub recent_failures: VecDeque<(Cursor, String)>,
    /// Wall-clock time of the run
    pub elapsed: Duration,
    /// Whether the run stopped because it was cancelled
    pub cancelled: bool,
}

impl RunStats {
    /// Documents published per second
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.published as f64 / secs
        } else {
            0.0
        }
    }
}

/// Progress tracker for a single import run
pub struct ImportProgress {
    /// Progress spinner (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    stats: RunStats,
}

impl ImportProgress {
    pub fn new(total_expected: Option<u64>, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = match total_expected {
                Some(total) => {
                    let pb = ProgressBar::new(total);
                    pb.set_style(
                        ProgressStyle::default_bar()
                            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("#>-"),
                    );
                    pb
                }
                None => {
                    let pb = ProgressBar::new_spinner();
                    pb.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} [{elapsed_precise}] {pos} items {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                    );
                    pb
                }
            };
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            stats: RunStats::default(),
        }
    }

    /// An item came out of the enumerator
    pub fn item_enumerated(&mut self, cursor: &Cursor) {
        self.stats.enumerated += 1;
        self.stats.last_cursor = Some(cursor.clone());

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(self.stats.enumerated as u64);
        }
    }

    /// A document was accepted by the sink
    pub fn document_published(&mut self, title: &str, redirect: bool) {
        self.stats.published += 1;
        if redirect {
            self.stats.redirects += 1;
        }

        if let Some(ref pb) = self.progress_bar {
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                self.stats.published as f64 / elapsed
            } else {
                0.0
            };
            pb.set_message(format!("{:.2} docs/s | {}", rate, truncate_str(title, 30)));
        }
    }

    pub fn self_redirect(&mut self) {
        self.stats.self_redirects += 1;
    }

    /// An item was given up on
    pub fn item_skipped(&mut self, cursor: &Cursor, reason: impl Into<String>) {
        self.stats.skipped += 1;
        if self.stats.recent_failures.len() == RECENT_FAILURES {
            self.stats.recent_failures.pop_front();
        }
        self.stats
            .recent_failures
            .push_back((cursor.clone(), reason.into()));
    }

    pub fn publish_retried(&mut self) {
        self.stats.retries += 1;
    }

    /// Current statistics
    pub fn get_stats(&self) -> RunStats {
        let mut stats = self.stats.clone();
        stats.elapsed = self.start_time.elapsed();
        stats
    }

    /// Mark the run as cancelled
    pub fn cancel(&mut self) {
        self.stats.cancelled = true;
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message("Cancelled");
        }
    }

    /// Finish the progress bar and return the final statistics
    pub fn finish(&mut self) -> RunStats {
        let stats = self.get_stats();
        if let Some(ref pb) = self.progress_bar {
            if !stats.cancelled {
                pb.finish_with_message(format!(
                    "Done! {} published, {} skipped, {:.2} docs/s",
                    stats.published,
                    stats.skipped,
                    stats.rate()
                ));
            }
        }
        stats
    }
}

/// Log the end-of-run summary
pub fn log_summary(source: &str, stats: &RunStats) {
    info!(
        source,
        enumerated = stats.enumerated,
        published = stats.published,
        redirects = stats.redirects,
        self_redirects = stats.self_redirects,
        skipped = stats.skipped,
        retries = stats.retries,
        cancelled = stats.cancelled,
        "Import finished in {:.1}s ({:.2} docs/s)",
        stats.elapsed.as_secs_f64(),
        stats.rate()
    );

    match &stats.last_cursor {
        Some(cursor) => info!("Last position: {} (use --continue {} to resume after it)", cursor, cursor),
        None => info!("No items were enumerated"),
    }

    for (cursor, reason) in &stats.recent_failures {
        info!("  skipped {}: {}", cursor, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let mut progress = ImportProgress::new(None, true);

        progress.item_enumerated(&Cursor::Index(1));
        progress.document_published("Alpha", false);
        progress.item_enumerated(&Cursor::Index(2));
        progress.item_skipped(&Cursor::Index(2), "parse error");
        progress.item_enumerated(&Cursor::Index(3));
        progress.document_published("Beta", true);
        progress.publish_retried();

        let stats = progress.finish();
        assert_eq!(stats.enumerated, 3);
        assert_eq!(stats.published, 2);
        assert_eq!(stats.redirects, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.last_cursor, Some(Cursor::Index(3)));
        assert_eq!(
            stats.recent_failures.front(),
            Some(&(Cursor::Index(2), "parse error".to_string()))
        );
    }

    #[test]
    fn test_recent_failures_are_capped() {
        let mut progress = ImportProgress::new(None, true);
        for i in 0..(RECENT_FAILURES as u64 + 5) {
            progress.item_skipped(&Cursor::Index(i), "boom");
        }

        let stats = progress.get_stats();
        assert_eq!(stats.skipped, RECENT_FAILURES + 5);
        assert_eq!(stats.recent_failures.len(), RECENT_FAILURES);
        assert_eq!(stats.recent_failures.front().map(|f| &f.0), Some(&Cursor::Index(5)));
    }

    #[test]
    fn test_cancellation() {
        let mut progress = ImportProgress::new(Some(10), true);
        assert!(!progress.get_stats().cancelled);
        progress.cancel();
        assert!(progress.finish().cancelled);
    }
}
