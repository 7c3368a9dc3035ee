// src/page/mod.rs
// =============================================================================
// The page processor: everything that happens to a single URL.
//
//   fetch -> content-type gate -> redirect-origin gate -> parse
//         -> walk DOM (extract + localize links) -> write to mirror tree
//
// Submodules:
// - http: fetching and the two gates
// - html: tag tables, DOM walk, link extraction and localization
// - mirror: on-disk layout and rewritten link form
//
// The crawl engine only sees the `PageProcessor` trait, so it can be driven
// by something other than the network in tests.
// =============================================================================

mod html;
mod http;
mod mirror;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::{Host, Url};

use self::http::Fetched;

// Why a page was fetched but not mirrored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No Content-Type value contained text/html
    NotHtml { content_type: Option<String> },
    /// The final response came from another host
    CrossOriginRedirect { from: String, to: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotHtml { content_type } => write!(
                f,
                "not an html page (content type: {})",
                content_type.as_deref().unwrap_or("none")
            ),
            SkipReason::CrossOriginRedirect { from, to } => {
                write!(f, "redirected to another host from {} to {}", from, to)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was written to `path`; `links` are its same-origin links
    Saved { path: PathBuf, links: Vec<String> },
    /// Another URL of this run was already written to `path` (`/a` and `/a/`,
    /// or http and https on one host); the file is left alone but `links`
    /// are still followed
    AlreadyMirrored { path: PathBuf, links: Vec<String> },
    /// The page is not part of the mirror and has no links to follow
    Skipped(SkipReason),
}

impl PageOutcome {
    pub fn into_links(self) -> Vec<String> {
        match self {
            PageOutcome::Saved { links, .. } | PageOutcome::AlreadyMirrored { links, .. } => links,
            PageOutcome::Skipped(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("getting {url}: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("getting {url}: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("parsing url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("reading {url} as HTML: {source}")]
    Body {
        url: String,
        source: reqwest::Error,
    },

    // The page was parsed, so its links are still worth following
    #[error("saving {url} to {}: {source}", .path.display())]
    Save {
        url: String,
        path: PathBuf,
        links: Vec<String>,
        source: std::io::Error,
    },
}

impl PageError {
    // Links discovered before the failure
    pub fn into_links(self) -> Vec<String> {
        match self {
            PageError::Save { links, .. } => links,
            _ => Vec::new(),
        }
    }
}

// Processes one canonical URL into the mirror rooted at `root`
#[async_trait]
pub trait PageProcessor: Send + Sync + 'static {
    async fn process(&self, url: &str, root: &Path) -> Result<PageOutcome, PageError>;
}

// The real processor, backed by one pooled HTTP client.
// `written` holds every mirror file claimed so far, so two URLs that map to
// the same file never write it twice or concurrently.
#[derive(Debug, Clone)]
pub struct HttpPageProcessor {
    client: Client,
    written: Arc<Mutex<HashSet<PathBuf>>>,
}

impl HttpPageProcessor {
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        // The default redirect policy follows up to 10 hops
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            written: Arc::new(Mutex::new(HashSet::new())),
        })
    }
}

#[async_trait]
impl PageProcessor for HttpPageProcessor {
    async fn process(&self, url: &str, root: &Path) -> Result<PageOutcome, PageError> {
        debug!(url, "started to process");

        let page = match http::fetch_page(&self.client, url).await? {
            Fetched::Page(page) => page,
            Fetched::Skipped(reason) => {
                info!(url, %reason, "skipping page");
                return Ok(PageOutcome::Skipped(reason));
            }
        };

        let rewritten = html::rewrite_page(&page.body, &page.final_url, root);
        let path = mirror::mirror_path(root, &page.final_url);

        // Claim the file before writing; the guard is dropped right away so
        // the write itself runs unlocked
        let claimed = self.written.lock().await.insert(path.clone());
        if !claimed {
            info!(url, path = %path.display(), "already mirrored under another url");
            return Ok(PageOutcome::AlreadyMirrored {
                path,
                links: rewritten.links,
            });
        }

        if let Err(source) = mirror::save_page(&path, &rewritten.html).await {
            // Give another URL for the same file a chance to write it
            self.written.lock().await.remove(&path);
            return Err(PageError::Save {
                url: url.to_string(),
                path,
                links: rewritten.links,
                source,
            });
        }

        info!(url, path = %path.display(), links = rewritten.links.len(), "saved");

        Ok(PageOutcome::Saved {
            path,
            links: rewritten.links,
        })
    }
}

// Clears query and fragment
pub fn canonicalize(mut url: Url) -> Url {
    url.set_query(None);
    url.set_fragment(None);
    url
}

// Host without port, and without brackets for IPv6 literals
pub fn hostname(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv6(address) => Some(address.to_string()),
        host => Some(host.to_string()),
    }
}
