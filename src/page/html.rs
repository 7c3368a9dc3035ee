// src/page/html.rs
// =============================================================================
// Link processing for a single parsed page.
//
// We use the `scraper` crate which parses HTML into a tree (built on
// html5ever). Instead of querying it with CSS selectors we walk the whole
// tree breadth-first, because we need to both read and rewrite attributes:
//
// 1. Extraction: same-origin links of navigational tags (a, area, base) are
//    collected, canonicalized, for the crawler to follow.
// 2. Localization: the same links are rewritten in place to point into the
//    mirror tree, so the saved copy can be browsed offline.
//
// After the walk the mutated tree is serialized back to HTML.
//
// Rust concepts:
// - VecDeque: FIFO queue for the breadth-first walk
// - let-else: Early `continue` when a node is not what we need
// - Option combinators: and_then / find_map instead of nested matches
// - Two-phase borrow: node ids are collected first, then the tree is
//   borrowed mutably one node at a time
// =============================================================================

use std::collections::VecDeque;
use std::path::Path;

use scraper::node::Element;
use scraper::{Html, Node};
use tracing::debug;
use url::Url;

use super::{canonicalize, hostname, mirror};

// Tags that may carry a link in an href or src attribute
pub const LINK_TAGS: [&str; 13] = [
    "audio", "embed", "iframe", "img", "input", "script", "source", "track", "video", "a",
    "link", "area", "base",
];

// Tags whose links are followed and rewritten
pub const NAVIGATIONAL_TAGS: [&str; 3] = ["a", "area", "base"];

const LINK_ATTRIBUTES: [&str; 2] = ["href", "src"];

// Result of processing one page
#[derive(Debug, Clone)]
pub struct RewrittenPage {
    /// Canonical same-origin links, in document (breadth-first) order
    pub links: Vec<String>,
    /// The page serialized after localization
    pub html: String,
}

// The attribute of an element that holds a same-origin link
struct LinkAttribute {
    index: usize,
    link: Url,
}

// Parses `body`, extracts and localizes same-origin links relative to
// `page_url`, and renders the result
//
// Parsing never fails: html5ever recovers from malformed markup the same way
// browsers do, we only log how much it had to fix.
pub fn rewrite_page(body: &str, page_url: &Url, root: &Path) -> RewrittenPage {
    let mut document = Html::parse_document(body);
    if !document.errors.is_empty() {
        debug!(url = %page_url, errors = document.errors.len(), "recovered from malformed HTML");
    }

    // Breadth-first order over every node below the document root.
    // Only ids are kept, so the tree is free to be mutated afterwards
    let order: Vec<_> = {
        let mut order = Vec::new();
        let mut queue: VecDeque<_> = document.tree.root().children().collect();
        while let Some(node) = queue.pop_front() {
            order.push(node.id());
            queue.extend(node.children());
        }
        order
    };

    let mut links = Vec::new();

    for id in order {
        // Only elements carry links
        let Some(element) = document.tree.get(id).and_then(|node| node.value().as_element()) else {
            continue;
        };
        let Some(found) = find_link_attribute(element, page_url) else {
            continue;
        };

        // 1. Extraction
        if let Some(link) = extract_link(element.name(), &found.link) {
            links.push(link);
        }

        // 2. Localization
        let Some(local) = localize_link(element.name(), &found.link, root) else {
            continue;
        };

        // Attributes keep document order ('deterministic' feature), so the
        // index found above still points at the same attribute
        if let Some(mut node) = document.tree.get_mut(id) {
            if let Node::Element(element) = node.value() {
                if let Some((_, value)) = element.attrs.iter_mut().nth(found.index) {
                    *value = local.into();
                }
            }
        }
    }

    // Serialization of an unchanged tree is stable, so a re-run rewrites
    // identical bytes
    RewrittenPage {
        links,
        html: document.html(),
    }
}

// Finds the first href/src attribute of a link-carrying element that resolves
// to the same host as the page
fn find_link_attribute(element: &Element, page_url: &Url) -> Option<LinkAttribute> {
    if !LINK_TAGS.contains(&element.name()) {
        return None;
    }
    let page_host = hostname(page_url)?;

    element
        .attrs()
        .enumerate()
        .find_map(|(index, (key, value))| {
            if !LINK_ATTRIBUTES.contains(&key) {
                return None;
            }

            // Relative values resolve against the page's final URL
            match page_url.join(value) {
                Ok(link) if hostname(&link).as_deref() == Some(page_host.as_str()) => {
                    Some(LinkAttribute { index, link })
                }
                // Another host, or no host at all (mailto:, javascript:)
                Ok(_) => None,
                Err(error) => {
                    debug!(url = %page_url, value, %error, "skipping malformed link");
                    None
                }
            }
        })
}

// Canonical form of a link the crawler should follow
fn extract_link(tag: &str, link: &Url) -> Option<String> {
    if !NAVIGATIONAL_TAGS.contains(&tag) {
        return None;
    }
    Some(canonicalize(link.clone()).to_string())
}

// Only navigational links are rewritten; assets keep their original value
fn localize_link(tag: &str, link: &Url, root: &Path) -> Option<String> {
    if !NAVIGATIONAL_TAGS.contains(&tag) {
        return None;
    }
    mirror::local_href(root, link)
}
