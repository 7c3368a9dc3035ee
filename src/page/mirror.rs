// src/page/mirror.rs
// =============================================================================
// On-disk layout of the mirror tree.
//
// A page with hostname H and path P lives at:
//   root/H/P             when P ends in a `.html` file name
//   root/H/P/index.html  otherwise
//
// Rewritten links point at the same place, as path-only references:
//   /root/H/P[/index.html]
// so the mirror is browsable from a static file server whose document root
// contains `root`.
// =============================================================================

use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use super::hostname;

const INDEX_FILE: &str = "index.html";
const HTML_EXTENSION: &str = ".html";

// Characters that must be escaped when the mirror root is embedded in a link
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

// A single file name must not introduce a separator once decoded
const SEGMENT_ESCAPE: &AsciiSet = &PATH_ESCAPE.add(b'/').add(b'\\');

// Returns the file a page fetched from `url` is stored in
pub fn mirror_path(root: &Path, url: &Url) -> PathBuf {
    let mut path = root.join(hostname(url).unwrap_or_default());

    for name in mirror_segments(url) {
        path.push(name);
    }

    path
}

// Returns the path-only reference a same-origin link is rewritten to, or None
// if the link has no host to file it under.
//
// Built from the same names as `mirror_path`, each one percent-encoded, so a
// static server decoding the reference lands on the file that was written.
pub fn local_href(root: &Path, link: &Url) -> Option<String> {
    let host = hostname(link)?;

    let mut href = format!("{}/{}", encoded_root(root), host);
    for name in mirror_segments(link) {
        href.push('/');
        href.extend(utf8_percent_encode(&name, SEGMENT_ESCAPE));
    }

    Some(href)
}

// Writes a rendered page, creating parent directories as needed
pub async fn save_page(path: &Path, html: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, html).await
}

// File names below the host directory, ending in the page's own file
fn mirror_segments(url: &Url) -> Vec<String> {
    let mut names = file_segments(url);

    let is_html = names
        .last()
        .map(|name| name.ends_with(HTML_EXTENSION))
        .unwrap_or(false);
    if !is_html {
        names.push(INDEX_FILE.to_string());
    }

    names
}

// Decoded, non-empty path segments that are safe to use as file names
fn file_segments(url: &Url) -> Vec<String> {
    let Some(segments) = url.path_segments() else {
        return Vec::new();
    };

    segments
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| {
            let decoded = percent_decode_str(segment).decode_utf8_lossy();
            // Keep the encoded spelling rather than escape the host directory
            if decoded.contains(['/', '\\']) || decoded == ".." {
                segment.to_string()
            } else {
                decoded.into_owned()
            }
        })
        .collect()
}

fn encoded_root(root: &Path) -> String {
    let root = root.to_string_lossy();
    utf8_percent_encode(root.trim_end_matches('/'), PATH_ESCAPE).to_string()
}
