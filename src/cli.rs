// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
//   site-mirror [--par N] [--depth D] [--path DIR] URL...
//
// Seeds are canonicalized before they reach the crawler: the path is reset to
// `/` and query and fragment are cleared, so every seed starts at the root of
// its site.
// =============================================================================

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::page::canonicalize;

#[derive(Parser, Debug)]
#[command(
    name = "site-mirror",
    version,
    about = "Mirror websites into a local directory tree",
    long_about = "site-mirror crawls one or more websites, rewrites their links to point at \
                  local files and saves every page under a mirror directory, so the copy can \
                  be browsed offline from a static file server."
)]
pub struct Cli {
    /// Seed URLs to start crawling from
    ///
    /// Only the scheme and host are used: every seed starts at `/`
    pub seeds: Vec<String>,

    /// Degree of parallelism, the max number of concurrent requests (> 0)
    #[arg(long, default_value_t = 1)]
    pub par: usize,

    /// Depth limit in link hops from the seeds (0 = seeds only)
    #[arg(long, default_value_t = 1)]
    pub depth: usize,

    /// Directory the mirror is written to (default: current directory)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, default_value = concat!("site-mirror/", env!("CARGO_PKG_VERSION")))]
    pub user_agent: String,

    /// Print the crawl report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

// Turns an operator-supplied URL into a canonical seed at the site root
pub fn canonical_seed(raw: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw)?;
    url.set_path("/");
    Ok(canonicalize(url).to_string())
}
