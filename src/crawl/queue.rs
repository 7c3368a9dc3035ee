// src/crawl/queue.rs
// =============================================================================
// The crawl engine: a fixed pool of workers draining a shared work queue.
//
// How it works:
// 1. Every seed is scheduled with depth 0
// 2. Each worker takes an item, claims its URL in the visited set and hands
//    it to the page processor
// 3. Links the page returned are scheduled with depth + 1, as long as the
//    item was below the depth limit
// 4. When the outstanding-work barrier drains, the queue is closed and the
//    workers exit
//
// Deduplication happens twice. Before scheduling, a read of the visited set
// filters out links that are already known; this is only a hint, two workers
// can still race and enqueue the same URL. The authoritative check is the
// check-and-insert under the write lock when an item is dequeued, so a URL
// is processed at most once.
//
// Every enqueue runs on its own task. If workers sent into the bounded queue
// themselves, they could all block on a full queue with nobody left to
// receive.
//
// Rust concepts:
// - Arc: Shared ownership of the engine state across worker tasks
// - mpsc channel: Bounded queue; WeakSender lets tasks send without keeping
//   the queue open
// - RwLock: Many readers for the pre-schedule filter, one writer to claim
// - JoinSet: Owns the worker tasks so we can wait for all of them
// - catch_unwind: Turns a panic inside a page into an ordinary failure
// =============================================================================

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::mpsc::{self, Receiver, WeakSender};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::barrier::WorkBarrier;
use super::report::{CrawlReport, CrawlStats};
use crate::page::PageProcessor;

// A URL waiting in the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: String,
    pub depth: usize, // Link hops from the seed
}

// The engine, generic over whatever processes a page
pub struct Crawler<P> {
    parallelism: usize,
    shared: Arc<Shared<P>>,
}

// State every worker sees
struct Shared<P> {
    processor: P,
    root: PathBuf,
    max_depth: usize,
    visited: RwLock<HashSet<String>>,
    barrier: WorkBarrier,
    stats: CrawlStats,
}

impl<P: PageProcessor> Crawler<P> {
    // `parallelism` workers, following links up to `max_depth` hops from the
    // seeds, writing the mirror under `root`
    pub fn new(processor: P, parallelism: usize, max_depth: usize, root: PathBuf) -> Self {
        // The config layer rejects 0, max(1) only keeps the channel valid
        Self {
            parallelism: parallelism.max(1),
            shared: Arc::new(Shared {
                processor,
                root,
                max_depth,
                visited: RwLock::new(HashSet::new()),
                barrier: WorkBarrier::new(),
                stats: CrawlStats::default(),
            }),
        }
    }

    // Crawls from `seeds` (canonical URLs) until every reachable page within
    // the depth limit has been processed
    pub async fn run(self, seeds: Vec<String>) -> CrawlReport {
        let started = Instant::now();
        let seed_count = seeds.len();

        info!(
            seeds = seed_count,
            parallelism = self.parallelism,
            max_depth = self.shared.max_depth,
            root = %self.shared.root.display(),
            "starting crawl"
        );

        // The engine keeps the only strong sender; dropping it closes the queue
        let (sender, receiver) = mpsc::channel(self.parallelism);
        // Receivers cannot be cloned, so the workers take turns behind a mutex
        let receiver = Arc::new(Mutex::new(receiver));
        let weak_sender = sender.downgrade();

        // Seeds go through the same path as discovered links, so they are
        // counted by the barrier and deduplicated on dequeue
        for url in seeds {
            self.shared.schedule(&weak_sender, WorkItem { url, depth: 0 });
        }

        let mut workers = JoinSet::new();
        for id in 0..self.parallelism {
            workers.spawn(worker(
                id,
                Arc::clone(&self.shared),
                Arc::clone(&receiver),
                weak_sender.clone(),
            ));
        }

        // Once the barrier drains, every scheduled item has been processed
        // or dropped
        self.shared.barrier.wait().await;
        drop(sender);

        // Every recv() now returns None, so each worker leaves its loop
        while let Some(joined) = workers.join_next().await {
            if let Err(error) = joined {
                error!(%error, "worker task failed");
            }
        }

        let report = self
            .shared
            .stats
            .report(seed_count, &self.shared.barrier, started.elapsed())
            .await;

        info!(
            visited = report.visited,
            saved = report.saved,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_ms = report.elapsed_ms,
            "crawl finished"
        );

        report
    }
}

async fn worker<P: PageProcessor>(
    id: usize,
    shared: Arc<Shared<P>>,
    queue: Arc<Mutex<Receiver<WorkItem>>>,
    sender: WeakSender<WorkItem>,
) {
    debug!(worker = id, "worker started");

    loop {
        // The lock guard is a temporary, released as soon as recv() returns
        let next = queue.lock().await.recv().await;
        let Some(item) = next else {
            break;
        };

        shared.visit(item, &sender).await;
        // Children were counted inside visit(), before this item is released
        shared.barrier.done();
    }

    debug!(worker = id, "queue closed, worker exiting");
}

impl<P: PageProcessor> Shared<P> {
    // Processes one dequeued item and schedules its children
    async fn visit(self: &Arc<Self>, item: WorkItem, sender: &WeakSender<WorkItem>) {
        if !self.claim(&item.url).await {
            debug!(url = %item.url, "already crawled");
            self.stats.record_duplicate();
            return;
        }
        self.stats.record_visit();

        // The processor is only borrowed for the call
        let processed = AssertUnwindSafe(self.processor.process(&item.url, &self.root))
            .catch_unwind()
            .await;

        let links = match processed {
            Ok(Ok(outcome)) => {
                self.stats.record_outcome(&outcome).await;
                outcome.into_links()
            }
            // A page that failed to save still reports its links
            Ok(Err(error)) => {
                warn!(url = %item.url, %error, "processing page failed");
                self.stats.record_failure();
                error.into_links()
            }
            Err(_) => {
                error!(url = %item.url, "page processor panicked");
                self.stats.record_failure();
                Vec::new()
            }
        };

        // Links of a page at the depth limit are never followed
        if item.depth >= self.max_depth {
            return;
        }

        for url in self.unvisited(links).await {
            self.schedule(
                sender,
                WorkItem {
                    url,
                    depth: item.depth + 1,
                },
            );
        }
    }

    // Check-and-insert; true if this call is the first to see `url`
    async fn claim(&self, url: &str) -> bool {
        let mut visited = self.visited.write().await;
        if visited.contains(url) {
            return false;
        }
        visited.insert(url.to_string())
    }

    // Best-effort filter before scheduling
    async fn unvisited(&self, links: Vec<String>) -> Vec<String> {
        let visited = self.visited.read().await;
        links
            .into_iter()
            .filter(|link| !visited.contains(link))
            .collect()
    }

    // Counts the item as outstanding, then sends it from a separate task
    fn schedule(self: &Arc<Self>, sender: &WeakSender<WorkItem>, item: WorkItem) {
        self.barrier.add();

        let shared = Arc::clone(self);
        let sender = sender.clone();
        // Detached: the barrier, not a JoinHandle, tracks this task
        tokio::spawn(async move {
            let delivered = match sender.upgrade() {
                Some(sender) => sender.send(item).await.is_ok(),
                None => false,
            };

            // The item will never be received, so release it here
            if !delivered {
                warn!("queue closed before an item could be enqueued");
                shared.barrier.done();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{PageError, PageOutcome};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    // An in-memory site: URL -> links on that page
    #[derive(Clone, Default)]
    struct FakeSite {
        pages: Arc<HashMap<String, Vec<String>>>,
        broken: Arc<HashSet<String>>,
        calls: Arc<StdMutex<Vec<String>>>,
    }

    impl FakeSite {
        fn new(pages: Vec<(&str, Vec<&str>)>) -> Self {
            let pages = pages
                .into_iter()
                .map(|(url, links)| {
                    (url.to_string(), links.into_iter().map(str::to_string).collect())
                })
                .collect();
            Self {
                pages: Arc::new(pages),
                ..Self::default()
            }
        }

        fn with_broken(mut self, urls: &[&str]) -> Self {
            self.broken = Arc::new(urls.iter().map(|u| u.to_string()).collect());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageProcessor for FakeSite {
        async fn process(&self, url: &str, root: &Path) -> Result<PageOutcome, PageError> {
            self.calls.lock().unwrap().push(url.to_string());
            tokio::task::yield_now().await;

            let links = self.pages.get(url).cloned().unwrap_or_default();
            let path = root.join(url.replace("://", "/"));

            if self.broken.contains(url) {
                return Err(PageError::Save {
                    url: url.to_string(),
                    path,
                    links,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }

            Ok(PageOutcome::Saved { path, links })
        }
    }

    async fn crawl(site: &FakeSite, par: usize, depth: usize, seeds: &[&str]) -> CrawlReport {
        let crawler = Crawler::new(site.clone(), par, depth, PathBuf::from("/m"));
        let seeds = seeds.iter().map(|s| s.to_string()).collect();
        tokio::time::timeout(Duration::from_secs(10), crawler.run(seeds))
            .await
            .expect("crawl did not terminate")
    }

    fn sorted(mut urls: Vec<String>) -> Vec<String> {
        urls.sort();
        urls
    }

    #[tokio::test]
    async fn test_no_seeds_finishes_immediately() {
        let site = FakeSite::default();
        let report = crawl(&site, 4, 3, &[]).await;

        assert_eq!(report, CrawlReport { elapsed_ms: report.elapsed_ms, ..CrawlReport::default() });
        assert!(site.calls().is_empty());
    }

    #[tokio::test]
    async fn test_depth_zero_only_processes_seeds() {
        let site = FakeSite::new(vec![("http://s/", vec!["http://s/a", "http://s/b"])]);
        let report = crawl(&site, 2, 0, &["http://s/"]).await;

        assert_eq!(site.calls(), vec!["http://s/"]);
        assert_eq!(report.scheduled, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(report.saved, 1);
    }

    #[tokio::test]
    async fn test_depth_one_follows_direct_links() {
        let site = FakeSite::new(vec![
            ("http://s/", vec!["http://s/a", "http://s/b"]),
            ("http://s/a", vec!["http://s/deeper"]),
        ]);
        let report = crawl(&site, 2, 1, &["http://s/"]).await;

        assert_eq!(
            sorted(site.calls()),
            vec!["http://s/", "http://s/a", "http://s/b"]
        );
        assert_eq!(report.visited, 3);
    }

    #[tokio::test]
    async fn test_depth_limit_cuts_long_chain() {
        let chain: HashMap<String, Vec<String>> = (0..10)
            .map(|i| (format!("http://s/{}", i), vec![format!("http://s/{}", i + 1)]))
            .collect();
        let site = FakeSite {
            pages: Arc::new(chain),
            ..FakeSite::default()
        };

        crawl(&site, 3, 3, &["http://s/0"]).await;

        assert_eq!(
            sorted(site.calls()),
            vec!["http://s/0", "http://s/1", "http://s/2", "http://s/3"]
        );
    }

    #[tokio::test]
    async fn test_cycle_is_fetched_once_per_page() {
        let site = FakeSite::new(vec![
            ("http://s/x", vec!["http://s/y"]),
            ("http://s/y", vec!["http://s/x"]),
        ]);
        let report = crawl(&site, 2, 10, &["http://s/x"]).await;

        assert_eq!(sorted(site.calls()), vec!["http://s/x", "http://s/y"]);
        assert_eq!(report.scheduled, report.completed);
    }

    #[tokio::test]
    async fn test_repeated_seeds_are_deduplicated() {
        let site = FakeSite::new(vec![("http://s/", vec![])]);
        let report = crawl(&site, 2, 1, &["http://s/", "http://s/", "http://s/"]).await;

        assert_eq!(site.calls(), vec!["http://s/"]);
        assert_eq!(report.seeds, 3);
        assert_eq!(report.duplicates, 2);
        assert_eq!(report.scheduled, 3);
        assert_eq!(report.completed, 3);
    }

    #[tokio::test]
    async fn test_many_workers_many_pages() {
        // A hub linking to 100 pages, each linking back to the hub and to
        // its neighbour
        let urls: Vec<String> = (0..100).map(|i| format!("http://s/p{}", i)).collect();
        let mut pages: HashMap<String, Vec<String>> = HashMap::new();
        pages.insert("http://s/".to_string(), urls.clone());
        for (i, url) in urls.iter().enumerate() {
            pages.insert(
                url.clone(),
                vec!["http://s/".to_string(), urls[(i + 1) % urls.len()].clone()],
            );
        }
        let site = FakeSite {
            pages: Arc::new(pages),
            ..FakeSite::default()
        };

        let report = crawl(&site, 8, 3, &["http://s/"]).await;

        let calls = site.calls();
        let unique: HashSet<_> = calls.iter().cloned().collect();
        assert_eq!(calls.len(), 101);
        assert_eq!(unique.len(), 101);
        assert_eq!(report.saved, 101);
        assert_eq!(report.files.len(), 101);
        assert_eq!(report.scheduled, report.completed);
    }

    #[tokio::test]
    async fn test_failed_page_still_fans_out() {
        let site = FakeSite::new(vec![("http://s/", vec!["http://s/a"])]).with_broken(&["http://s/"]);
        let report = crawl(&site, 1, 1, &["http://s/"]).await;

        assert_eq!(sorted(site.calls()), vec!["http://s/", "http://s/a"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.saved, 1);
    }

    #[tokio::test]
    async fn test_panicking_processor_does_not_hang() {
        struct Panics;

        #[async_trait]
        impl PageProcessor for Panics {
            async fn process(&self, _url: &str, _root: &Path) -> Result<PageOutcome, PageError> {
                panic!("boom");
            }
        }

        let crawler = Crawler::new(Panics, 1, 1, PathBuf::from("/m"));
        let report = tokio::time::timeout(
            Duration::from_secs(10),
            crawler.run(vec!["http://s/".to_string()]),
        )
        .await
        .expect("crawl did not terminate");

        assert_eq!(report.failed, 1);
        assert_eq!(report.scheduled, report.completed);
    }
}
