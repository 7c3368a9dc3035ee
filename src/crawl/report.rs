// src/crawl/report.rs
// =============================================================================
// Crawl statistics, collected by the workers while the crawl runs and turned
// into a serializable report once it is over.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use super::barrier::WorkBarrier;
use crate::page::PageOutcome;

// Summary of one crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Seeds handed to the crawler
    pub seeds: usize,
    /// Distinct URLs given to the page processor
    pub visited: usize,
    /// Pages written to the mirror
    pub saved: usize,
    /// Pages fetched but not mirrored (not HTML or redirected away)
    pub skipped: usize,
    /// Pages whose mirror file was already written from another URL
    pub aliases: usize,
    /// Pages that failed to fetch or save
    pub failed: usize,
    /// Queue items dropped because their URL was already visited
    pub duplicates: usize,
    /// Work items scheduled (barrier increments)
    pub scheduled: usize,
    /// Work items finished (barrier decrements)
    pub completed: usize,
    pub elapsed_ms: u64,
    /// Files written, sorted
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub(super) struct CrawlStats {
    visited: AtomicUsize,
    saved: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    duplicates: AtomicUsize,
    aliases: AtomicUsize,
    files: Mutex<Vec<PathBuf>>,
}

impl CrawlStats {
    pub(super) fn record_visit(&self) {
        self.visited.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) async fn record_outcome(&self, outcome: &PageOutcome) {
        match outcome {
            PageOutcome::Saved { path, .. } => {
                self.saved.fetch_add(1, Ordering::Relaxed);
                self.files.lock().await.push(path.clone());
            }
            PageOutcome::AlreadyMirrored { .. } => {
                self.aliases.fetch_add(1, Ordering::Relaxed);
            }
            PageOutcome::Skipped(_) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(super) async fn report(
        &self,
        seeds: usize,
        barrier: &WorkBarrier,
        elapsed: Duration,
    ) -> CrawlReport {
        let mut files = self.files.lock().await.clone();
        files.sort();

        CrawlReport {
            seeds,
            visited: self.visited.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            aliases: self.aliases.load(Ordering::Relaxed),
            scheduled: barrier.scheduled(),
            completed: barrier.completed(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            files,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SkipReason;

    #[tokio::test]
    async fn test_report_counts_outcomes() {
        let stats = CrawlStats::default();
        let barrier = WorkBarrier::new();
        barrier.add();
        barrier.done();

        stats.record_visit();
        stats.record_visit();
        stats.record_duplicate();
        stats
            .record_outcome(&PageOutcome::Saved {
                path: PathBuf::from("/m/b/index.html"),
                links: Vec::new(),
            })
            .await;
        stats
            .record_outcome(&PageOutcome::Saved {
                path: PathBuf::from("/m/a/index.html"),
                links: Vec::new(),
            })
            .await;
        stats
            .record_outcome(&PageOutcome::Skipped(SkipReason::NotHtml {
                content_type: None,
            }))
            .await;
        stats
            .record_outcome(&PageOutcome::AlreadyMirrored {
                path: PathBuf::from("/m/a/index.html"),
                links: Vec::new(),
            })
            .await;
        stats.record_failure();

        let report = stats.report(1, &barrier, Duration::from_millis(42)).await;

        assert_eq!(report.visited, 2);
        assert_eq!(report.saved, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.aliases, 1);
        assert_eq!(report.scheduled, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(report.elapsed_ms, 42);
        assert_eq!(
            report.files,
            vec![PathBuf::from("/m/a/index.html"), PathBuf::from("/m/b/index.html")]
        );
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = CrawlReport {
            seeds: 1,
            saved: 1,
            files: vec![PathBuf::from("/m/site.test/index.html")],
            ..CrawlReport::default()
        };

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();

        assert_eq!(json["saved"], 1);
        assert_eq!(json["files"][0], "/m/site.test/index.html");
    }
}
