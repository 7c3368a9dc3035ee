// src/crawl/mod.rs
// =============================================================================
// This module is the concurrent crawl engine.
//
// Features:
// - A fixed pool of workers sharing one work queue
// - At-most-once processing of every URL (visited set)
// - Depth limit counted in link hops from the seeds
// - Termination once no scheduled work is left (outstanding-work barrier)
//
// What a worker does with a URL lives in the `page` module; the engine only
// schedules, deduplicates and counts.
// =============================================================================

mod barrier;
mod queue;
mod report;

pub use queue::Crawler;
pub use report::CrawlReport;
