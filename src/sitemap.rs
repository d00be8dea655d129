//! Sitemap XML ingestion.
//!
//! Catalog exports are not always well-behaved sitemaps, so parsing tries
//! progressively looser readings of the document (see [`SitemapShape`]).

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

// Trailing sentence punctuation is not part of the URL.
const URL_TOKEN: &str = r#"https?://[^\s<>"']*[^\s<>"',.;:!?)]"#;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapUrl {
    pub location: String,
    pub last_modified: Option<String>,
    pub change_frequency: Option<String>,
    pub priority: Option<String>,
}

impl SitemapUrl {
    pub fn bare(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Self::default()
        }
    }
}

/// Which reading of the document produced the URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SitemapShape {
    /// `urlset > url > loc`
    UrlSet,
    /// `url` children under some other root element
    WrappedUrls,
    /// any element with a `loc` child, at any depth
    NestedLoc,
    /// bare `http(s)://` tokens in the text content; attribute values are not scanned
    TextScan,
    /// not XML; nothing extracted
    Unparsable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapDocument {
    pub source_label: String,
    pub shape: SitemapShape,
    pub urls: Vec<SitemapUrl>,
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    fn as_sitemap_url(&self) -> Option<SitemapUrl> {
        Some(SitemapUrl {
            location: self.child_text("loc")?,
            last_modified: self.child_text("lastmod"),
            change_frequency: self.child_text("changefreq"),
            priority: self.child_text("priority"),
        })
    }
}

/// Elements of a document plus all of its character data in document order.
/// Attribute values (`xmlns`, `xsi:schemaLocation`) are in neither.
#[derive(Debug, Default)]
struct Tree {
    roots: Vec<Node>,
    content: String,
}

impl Tree {
    fn push_text(&mut self, text: &str) {
        if !self.content.is_empty() {
            self.content.push('\n');
        }
        self.content.push_str(text);
    }
}

/// Read the document into a forest of elements keyed by local name, so that
/// namespace prefixes do not matter.
fn parse_tree(document: &str) -> Result<Tree> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut tree = Tree::default();
    let mut stack: Vec<Node> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Node {
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Node::default()
            }),
            Event::Empty(e) => {
                let node = Node {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Node::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => tree.roots.push(node),
                }
            }
            Event::End(_) => {
                let node = stack.pop().context("Unbalanced closing tag")?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => tree.roots.push(node),
                }
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
                tree.push_text(&text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
                tree.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        anyhow::bail!("Unclosed element <{}> at end of document", open.name);
    }
    Ok(tree)
}

fn url_children(root: &Node) -> Vec<SitemapUrl> {
    root.children
        .iter()
        .filter(|c| c.name == "url")
        .filter_map(Node::as_sitemap_url)
        .collect()
}

fn collect_nested(node: &Node, out: &mut Vec<SitemapUrl>) {
    if let Some(url) = node.as_sitemap_url() {
        out.push(url);
    }
    for child in node.children.iter().filter(|c| c.name != "loc") {
        collect_nested(child, out);
    }
}

fn scan_text(content: &str) -> Vec<SitemapUrl> {
    match Regex::new(URL_TOKEN) {
        Ok(re) => re
            .find_iter(content)
            .map(|m| SitemapUrl::bare(m.as_str()))
            .collect(),
        Err(e) => {
            warn!(action = "compile", component = "sitemap_text_scan", error = %e, "Invalid URL token pattern");
            Vec::new()
        }
    }
}

fn read_urls(document: &str) -> Result<(SitemapShape, Vec<SitemapUrl>)> {
    let tree = parse_tree(document)?;
    let roots = &tree.roots;

    let url_set: Vec<SitemapUrl> = roots
        .iter()
        .filter(|r| r.name == "urlset")
        .flat_map(url_children)
        .collect();
    if !url_set.is_empty() {
        return Ok((SitemapShape::UrlSet, url_set));
    }

    let wrapped: Vec<SitemapUrl> = roots
        .iter()
        .filter(|r| r.name != "urlset")
        .flat_map(url_children)
        .collect();
    if !wrapped.is_empty() {
        return Ok((SitemapShape::WrappedUrls, wrapped));
    }

    let mut nested = Vec::new();
    for root in roots {
        collect_nested(root, &mut nested);
    }
    if !nested.is_empty() {
        return Ok((SitemapShape::NestedLoc, nested));
    }

    Ok((SitemapShape::TextScan, scan_text(&tree.content)))
}

/// Parse one sitemap document. Never fails: a document that is not XML
/// yields no URLs and a warning.
pub fn parse_sitemap(document: &str, source_label: &str) -> SitemapDocument {
    let document = document.trim_start_matches('\u{feff}');
    let (shape, urls) = match read_urls(document) {
        Ok(result) => result,
        Err(e) => {
            warn!(action = "parse", component = "sitemap", source = source_label, error = %e, "Unparsable sitemap, skipping");
            (SitemapShape::Unparsable, Vec::new())
        }
    };

    debug!(
        action = "parsed",
        component = "sitemap",
        source = source_label,
        shape = ?shape,
        url_count = urls.len(),
        "Sitemap parsed"
    );

    SitemapDocument {
        source_label: source_label.to_string(),
        shape,
        urls,
    }
}

pub fn parse_sitemap_bytes(document: &[u8], source_label: &str) -> SitemapDocument {
    parse_sitemap(&String::from_utf8_lossy(document), source_label)
}

pub fn read_sitemap_file(path: &Path, source_label: &str) -> Result<SitemapDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read sitemap {:?}", path))?;
    Ok(parse_sitemap_bytes(&bytes, source_label))
}

pub fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// All `*.xml` files below `root`, sorted by path.
pub fn scan_directory(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("Sitemap directory not found: {:?}", root);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(action = "scan", component = "sitemap_directory", root = ?root, error = %e, "Skipping unreadable path");
                continue;
            }
        };
        if entry.file_type().is_file() && is_xml_file(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(action = "scan", component = "sitemap_directory", root = ?root, file_count = files.len(), "Sitemap files discovered");
    Ok(files)
}

/// Parse every sitemap below `root`, one document per readable file, labelled
/// with its path relative to `root`.
pub fn parse_directory_files(root: &Path) -> Result<Vec<SitemapDocument>> {
    let start_time = Instant::now();
    let files = scan_directory(root)?;

    let documents: Vec<SitemapDocument> = files
        .par_iter()
        .filter_map(|path| {
            let label = path.strip_prefix(root).unwrap_or(path).display().to_string();
            match read_sitemap_file(path, &label) {
                Ok(document) => Some(document),
                Err(e) => {
                    warn!(action = "read", component = "sitemap_directory", file_path = ?path, error = %e, "Skipping sitemap file");
                    None
                }
            }
        })
        .collect();

    info!(
        action = "complete",
        component = "sitemap_directory",
        root = ?root,
        file_count = files.len(),
        parsed_count = documents.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Sitemap directory parsed"
    );
    Ok(documents)
}

/// Parse every sitemap below `root` into a single document.
pub fn parse_directory(root: &Path, source_label: &str) -> Result<SitemapDocument> {
    let documents = parse_directory_files(root)?;
    let shape = documents
        .first()
        .map(|d| d.shape)
        .unwrap_or(SitemapShape::Unparsable);

    Ok(SitemapDocument {
        source_label: source_label.to_string(),
        shape,
        urls: documents.into_iter().flat_map(|d| d.urls).collect(),
    })
}
