use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

use crate::domain::DomainExtractor;
use crate::domain_set::{self, Catalog, DomainSet};
use crate::state::{self, ScrapeState};
use crate::stats::AnalysisResult;
use crate::utils::format_number;
use crate::{overlap, report, rules, Args};

/// Compare the reference catalog against every competitor catalog and, when
/// given, the scrape state set.
pub fn run_comparison(
    reference: &Catalog,
    competitors: &[Catalog],
    scrape: Option<(&DomainSet, &ScrapeState)>,
    extractor: &DomainExtractor,
) -> AnalysisResult {
    let start_time = Instant::now();

    let mut sets: Vec<&DomainSet> = competitors.iter().map(|c| &c.domains).collect();
    if let Some((set, _)) = scrape {
        sets.push(set);
    }
    if sets.is_empty() {
        warn!(action = "compare", component = "overlap", "No competitor sets to compare against");
    }

    let results = overlap::compare_all(&reference.domains, &sets);

    let reference_index = reference.url_index(extractor);
    let merchants = scrape
        .map(|(_, state)| state.merchants_by_path())
        .unwrap_or_default();
    let annotations: BTreeMap<String, Vec<_>> = competitors
        .iter()
        .map(|competitor| {
            (
                competitor.label().to_string(),
                report::annotate_urls(competitor.urls(), extractor, &reference_index, &merchants),
            )
        })
        .collect();

    info!(
        action = "complete",
        component = "overlap",
        reference_domains = reference.domains.len(),
        competitor_count = results.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Overlap comparison completed"
    );

    AnalysisResult {
        reference_source: reference.label().to_string(),
        reference_domains: reference.domains.len(),
        reference_urls: reference.url_count,
        reference_rejected: reference.rejected_count,
        results,
        annotations,
    }
}

pub fn analyze_catalogs(args: &Args) -> Result<AnalysisResult> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "analysis", "Starting catalog overlap analysis");

    let rules = rules::load_rules(args.rules.as_deref())?;
    let extractor = DomainExtractor::new(rules)?;

    let reference_dir = args
        .reference
        .as_deref()
        .context("A reference catalog directory is required")?;
    let reference = domain_set::load_catalog(reference_dir, &args.reference_label, &extractor)
        .context("Failed to load reference catalog")?;

    let competitors = match args.competitors.as_deref() {
        Some(dir) => domain_set::discover_competitors(dir, &extractor)
            .context("Failed to load competitor catalogs")?,
        None => Vec::new(),
    };

    let scrape = match args.state.as_deref() {
        Some(path) => Some(state::load_state_domain_set(
            path,
            &args.state_label,
            args.require_state,
        )?),
        None => None,
    };

    let result = run_comparison(
        &reference,
        &competitors,
        scrape.as_ref().map(|(set, state)| (set, state)),
        &extractor,
    );

    info!(
        action = "complete",
        component = "analysis",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Analysis completed successfully"
    );
    Ok(result)
}

pub fn print_analysis_results(result: &AnalysisResult, top: Option<usize>) {
    println!("\n--- {} Catalog Overlap ---", result.reference_source);
    println!(
        "Reference domains: {} (from {} URLs, {} without a domain)",
        format_number(result.reference_domains),
        format_number(result.reference_urls),
        format_number(result.reference_rejected)
    );
    println!("Competitors compared: {}", format_number(result.results.len()));

    if result.results.is_empty() {
        return;
    }

    let shown = top.unwrap_or(result.results.len()).min(result.results.len());
    println!("\nTop {} competitors by overlap:", shown);
    for entry in result.results.iter().take(shown) {
        if entry.total_domains == 0 {
            println!("- {}: no domains", entry.source_name);
        } else {
            println!(
                "- {}: {} of {} domains ({:.2}%)",
                entry.source_name,
                format_number(entry.overlapping_domains),
                format_number(entry.total_domains),
                entry.overlap_percentage
            );
        }
    }
}
