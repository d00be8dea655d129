pub mod analysis;
pub mod args;
pub mod domain;
pub mod domain_set;
pub mod overlap;
pub mod report;
pub mod rules;
pub mod sitemap;
pub mod state;
pub mod stats;
pub mod utils;

pub use analysis::{analyze_catalogs, run_comparison};
pub use args::Args;
pub use domain::{Domain, DomainExtractor, Rejection};
pub use domain_set::{Catalog, DomainSet};
pub use rules::{init_default_rules, ExtractorRules};
pub use stats::{AnalysisResult, OverlapResult};
