use anyhow::Result;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::domain::DomainExtractor;
use crate::sitemap::{self, SitemapDocument, SitemapUrl};

pub const REJECTED_SAMPLE_SIZE: usize = 5;

/// Unique merchant domain names for one named source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    pub label: String,
    pub domains: HashSet<String>,
}

impl DomainSet {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            domains: HashSet::new(),
        }
    }

    pub fn from_domains<I, S>(label: impl Into<String>, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn insert(&mut self, domain: impl Into<String>) -> bool {
        self.domains.insert(domain.into())
    }
}

/// Outcome of running the extractor over one sitemap document.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub domains: HashSet<String>,
    pub url_count: usize,
    pub rejected_count: usize,
    pub rejected_sample: Vec<String>,
}

impl ExtractionReport {
    fn merge(&mut self, other: ExtractionReport) {
        self.domains.extend(other.domains);
        self.url_count += other.url_count;
        self.rejected_count += other.rejected_count;
        let room = REJECTED_SAMPLE_SIZE.saturating_sub(self.rejected_sample.len());
        self.rejected_sample
            .extend(other.rejected_sample.into_iter().take(room));
    }
}

pub fn extract_document(document: &SitemapDocument, extractor: &DomainExtractor) -> ExtractionReport {
    let mut report = ExtractionReport {
        url_count: document.urls.len(),
        ..ExtractionReport::default()
    };

    for url in &document.urls {
        match extractor.extract(&url.location) {
            Ok(domain) => {
                report.domains.insert(domain.name);
            }
            Err(reason) => {
                debug!(action = "reject", component = "domain_extraction", source = %document.source_label, url = %url.location, reason = %reason, "No domain extracted");
                report.rejected_count += 1;
                if report.rejected_sample.len() < REJECTED_SAMPLE_SIZE {
                    report.rejected_sample.push(url.location.clone());
                }
            }
        }
    }
    report
}

fn log_rejections(label: &str, report: &ExtractionReport) {
    if report.rejected_count > 0 {
        info!(
            action = "rejected",
            component = "domain_set",
            source = label,
            rejected_count = report.rejected_count,
            sample = ?report.rejected_sample,
            "URLs without an extractable domain"
        );
    }
}

/// Unique domain names of every URL in one sitemap document.
pub fn build_domain_set(document: &SitemapDocument, extractor: &DomainExtractor) -> DomainSet {
    let report = extract_document(document, extractor);
    log_rejections(&document.source_label, &report);
    DomainSet {
        label: document.source_label.clone(),
        domains: report.domains,
    }
}

/// One source's sitemaps together with the domains extracted from them.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub domains: DomainSet,
    pub documents: Vec<SitemapDocument>,
    pub url_count: usize,
    pub rejected_count: usize,
    pub rejected_sample: Vec<String>,
}

impl Catalog {
    pub fn from_documents(
        label: &str,
        documents: Vec<SitemapDocument>,
        extractor: &DomainExtractor,
    ) -> Self {
        let reports: Vec<ExtractionReport> = documents
            .par_iter()
            .map(|document| extract_document(document, extractor))
            .collect();

        let mut total = ExtractionReport::default();
        for (document, report) in documents.iter().zip(reports) {
            info!(
                action = "file",
                component = "domain_set",
                source = label,
                file = %document.source_label,
                url_count = report.url_count,
                domain_count = report.domains.len(),
                "Domains extracted from sitemap file"
            );
            total.merge(report);
        }
        log_rejections(label, &total);

        Self {
            domains: DomainSet {
                label: label.to_string(),
                domains: total.domains,
            },
            documents,
            url_count: total.url_count,
            rejected_count: total.rejected_count,
            rejected_sample: total.rejected_sample,
        }
    }

    pub fn label(&self) -> &str {
        &self.domains.label
    }

    pub fn urls(&self) -> impl Iterator<Item = &SitemapUrl> {
        self.documents.iter().flat_map(|d| d.urls.iter())
    }

    /// Map each domain to the first URL (in file order) it was extracted from.
    pub fn url_index(&self, extractor: &DomainExtractor) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for url in self.urls() {
            if let Ok(domain) = extractor.extract(&url.location) {
                index
                    .entry(domain.name)
                    .or_insert_with(|| url.location.clone());
            }
        }
        index
    }
}

pub fn load_catalog(path: &Path, label: &str, extractor: &DomainExtractor) -> Result<Catalog> {
    let start_time = Instant::now();
    let documents = sitemap::parse_directory_files(path)?;
    let catalog = Catalog::from_documents(label, documents, extractor);

    info!(
        action = "complete",
        component = "domain_set",
        source = label,
        file_count = catalog.documents.len(),
        url_count = catalog.url_count,
        unique_domains = catalog.domains.len(),
        rejected_count = catalog.rejected_count,
        duration_ms = start_time.elapsed().as_millis(),
        "Domain set built"
    );
    Ok(catalog)
}

/// Union of the domain sets of every sitemap found below `path`.
pub fn process_directory(path: &Path, label: &str, extractor: &DomainExtractor) -> Result<DomainSet> {
    Ok(load_catalog(path, label, extractor)?.domains)
}

/// Reserve a label not yet in `taken`: `preferred`, then `alternate`, then
/// `preferred-2`, `preferred-3`, ...
pub fn claim_label(taken: &mut HashSet<String>, preferred: &str, alternate: Option<&str>) -> String {
    if taken.insert(preferred.to_string()) {
        return preferred.to_string();
    }

    let label = match alternate {
        Some(alternate) if taken.insert(alternate.to_string()) => alternate.to_string(),
        _ => {
            let mut n = 2;
            loop {
                let candidate = format!("{preferred}-{n}");
                if taken.insert(candidate.clone()) {
                    break candidate;
                }
                n += 1;
            }
        }
    };
    warn!(action = "rename", component = "labels", label = preferred, renamed = %label, "Label already in use");
    label
}

/// One catalog per competitor below `root`. Subdirectories are competitors
/// named after the directory; loose `*.xml` files are competitors named after
/// the file stem, or the full file name when the stem is already taken.
pub fn discover_competitors(root: &Path, extractor: &DomainExtractor) -> Result<Vec<Catalog>> {
    if !root.is_dir() {
        anyhow::bail!("Competitors directory not found: {:?}", root);
    }

    let mut catalogs = Vec::new();
    let mut labels = HashSet::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(action = "scan", component = "competitors", root = ?root, error = %e, "Skipping unreadable path");
                continue;
            }
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }

        if entry.file_type().is_dir() {
            let label = claim_label(&mut labels, &name, None);
            catalogs.push(load_catalog(path, &label, extractor)?);
        } else if sitemap::is_xml_file(path) {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| name.to_string());
            match sitemap::read_sitemap_file(path, &stem) {
                Ok(mut document) => {
                    let label = claim_label(&mut labels, &stem, Some(name.as_ref()));
                    document.source_label = label.clone();
                    catalogs.push(Catalog::from_documents(&label, vec![document], extractor));
                }
                Err(e) => {
                    warn!(action = "read", component = "competitors", file_path = ?path, error = %e, "Skipping competitor sitemap");
                }
            }
        }
    }

    catalogs.sort_by(|a, b| a.label().cmp(b.label()));
    info!(action = "complete", component = "competitors", root = ?root, competitor_count = catalogs.len(), "Competitors discovered");
    Ok(catalogs)
}
