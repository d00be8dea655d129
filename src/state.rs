//! Reader for the progress file written by the merchant page crawler.
//!
//! Only the merchant records matter here: their `urlPath` values are compared
//! as domains exactly as written, and their scraped attributes feed the
//! annotated URL report.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::domain_set::DomainSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRecord {
    #[serde(default)]
    pub url_path: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub has_marker: Option<bool>,
}

impl MerchantRecord {
    pub fn url_path(&self) -> Option<&str> {
        self.url_path.as_deref().filter(|path| !path.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScrapeState {
    pub merchants: Vec<MerchantRecord>,
}

impl ScrapeState {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Scrape state is not a valid state document")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scrape state {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Invalid scrape state {:?}", path))
    }

    /// Every non-empty `urlPath`, unmodified. Values with surrounding
    /// whitespace are kept as written and reported.
    pub fn domain_set(&self, label: &str) -> DomainSet {
        let mut set = DomainSet::new(label);
        let mut missing = 0usize;
        let mut padded = 0usize;
        for record in &self.merchants {
            match record.url_path() {
                Some(path) => {
                    if path.trim() != path {
                        padded += 1;
                    }
                    set.insert(path);
                }
                None => missing += 1,
            }
        }
        if missing > 0 {
            warn!(action = "parse", component = "scrape_state", source = label, missing_count = missing, "Merchant records without urlPath skipped");
        }
        if padded > 0 {
            warn!(action = "parse", component = "scrape_state", source = label, padded_count = padded, "urlPath values with surrounding whitespace kept verbatim");
        }
        set
    }

    /// Merchant records keyed by `urlPath`; the first record wins.
    pub fn merchants_by_path(&self) -> HashMap<String, MerchantRecord> {
        let mut index = HashMap::new();
        for record in &self.merchants {
            if let Some(path) = record.url_path() {
                index
                    .entry(path.to_string())
                    .or_insert_with(|| record.clone());
            }
        }
        index
    }
}

/// Load the state file as a domain set. When `required` is false, any problem
/// with the file degrades to an empty set and a warning.
pub fn load_state_domain_set(path: &Path, label: &str, required: bool) -> Result<(DomainSet, ScrapeState)> {
    let state = match ScrapeState::load(path) {
        Ok(state) => state,
        Err(e) if !required => {
            let error = format!("{e:#}");
            warn!(action = "load", component = "scrape_state", file_path = ?path, error = %error, "Unusable scrape state, using an empty set");
            ScrapeState::default()
        }
        Err(e) => return Err(e),
    };

    let set = state.domain_set(label);
    info!(
        action = "loaded",
        component = "scrape_state",
        source = label,
        merchant_count = state.merchants.len(),
        unique_domains = set.len(),
        "Scrape state loaded"
    );
    Ok((set, state))
}
