// src/page/http.rs
// =============================================================================
// Fetches a page and decides whether it belongs in the mirror.
//
// Gates, in order:
// - transport errors and any status other than 200 are errors
// - responses without a text/html Content-Type are skipped
// - responses that were redirected to another host are skipped, which keeps
//   the crawl on the original host even across 3xx redirects
//
// reqwest follows redirects for us, so `response.url()` is the final URL.
//
// Rust concepts:
// - map_err + ?: Wrap library errors into our PageError and return early
// - Enums with data: Fetched is either a page or the reason it was skipped
// - Iterators: any() over every value of a repeated header
// =============================================================================

use reqwest::header::{HeaderMap, HeaderName, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use url::Url;

use super::{hostname, PageError, SkipReason};

const HTML_CONTENT_TYPE: &str = "text/html";

// An HTML page on the requested host
#[derive(Debug)]
pub struct FetchedPage {
    pub final_url: Url,
    pub body: String,
}

// What the gates decided about a response
#[derive(Debug)]
pub enum Fetched {
    Page(FetchedPage),
    Skipped(SkipReason),
}

// GETs `url` and runs the gates; the body is only read for pages we keep
pub async fn fetch_page(client: &Client, url: &str) -> Result<Fetched, PageError> {
    // Connection errors and timeouts end up here, redirect loops too
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| PageError::Transport {
            url: url.to_string(),
            source,
        })?;

    // Only 200 counts, other 2xx codes carry no page to mirror
    if response.status() != StatusCode::OK {
        return Err(PageError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    // Servers may send several Content-Type values, any of them may match
    if !header_contains(response.headers(), CONTENT_TYPE, HTML_CONTENT_TYPE) {
        // Kept for the log line only
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        return Ok(Fetched::Skipped(SkipReason::NotHtml { content_type }));
    }

    let requested = Url::parse(url).map_err(|source| PageError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    // Owned copy, text() below consumes the response
    let final_url = response.url().clone();

    // Ports are ignored, the host name alone decides
    if hostname(&final_url) != hostname(&requested) {
        return Ok(Fetched::Skipped(SkipReason::CrossOriginRedirect {
            from: url.to_string(),
            to: final_url.to_string(),
        }));
    }

    // Decodes using the charset from Content-Type, UTF-8 otherwise
    let body = response.text().await.map_err(|source| PageError::Body {
        url: url.to_string(),
        source,
    })?;

    Ok(Fetched::Page(FetchedPage { final_url, body }))
}

// True if any value of the header contains `needle`
fn header_contains(headers: &HeaderMap, key: HeaderName, needle: &str) -> bool {
    headers
        .get_all(key)
        .iter()
        .any(|value| value.to_str().map(|v| v.contains(needle)).unwrap_or(false))
}
