use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "catalog-overlap",
    about = "Compare merchant domain coverage between a reference catalog and competitor sitemaps",
    version,
    long_about = None
)]
pub struct Args {
    /// Directory of reference catalog sitemaps
    #[arg(short, long, required_unless_present = "init")]
    pub reference: Option<PathBuf>,

    /// Label for the reference catalog in reports
    #[arg(long, default_value = "reference")]
    pub reference_label: String,

    /// Directory of competitor sitemaps, one subdirectory or file per competitor
    #[arg(short, long)]
    pub competitors: Option<PathBuf>,

    /// Scrape state file whose merchant urlPath values are compared as a competitor
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Label for the scrape state competitor
    #[arg(long, default_value = "scrape-state")]
    pub state_label: String,

    /// Fail instead of warning when the scrape state is missing or inconsistent
    #[arg(long, requires = "state")]
    pub require_state: bool,

    /// Path to custom extractor rules file
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Directory to write summary.json, overlap.csv and per-competitor URL reports
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of top competitors to display
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Initialize catalog_rules.toml with the default rules
    #[arg(long)]
    pub init: bool,
}
