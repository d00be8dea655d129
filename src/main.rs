use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::error;

use catalog_overlap::{analysis, report, rules, utils, Args};

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);

    if args.init {
        return rules::init_default_rules(Path::new(rules::DEFAULT_RULES_FILE));
    }

    utils::validate_args(&args)?;
    utils::configure_workers(args.workers)?;

    let outcome = analysis::analyze_catalogs(&args).and_then(|result| {
        if let Some(output_dir) = args.output.as_deref() {
            report::write_reports(output_dir, &result)?;
        }
        Ok(result)
    });

    match outcome {
        Ok(result) => {
            analysis::print_analysis_results(&result, args.top);
            Ok(())
        }
        Err(e) => {
            let error = format!("{e:#}");
            error!(error = %error, "Error");
            std::process::exit(1);
        }
    }
}
