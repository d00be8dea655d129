use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain_set::DomainSet;
use crate::stats::OverlapResult;

/// Percentage of `total` covered by `overlapping`, rounded to two decimals.
pub fn overlap_percentage(overlapping: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = overlapping as f64 / total as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// How much of `competitor` the reference set also covers. `source_name` is
/// left empty for the caller to stamp.
pub fn calculate_overlap(reference: &HashSet<String>, competitor: &HashSet<String>) -> OverlapResult {
    let (smaller, larger) = if reference.len() <= competitor.len() {
        (reference, competitor)
    } else {
        (competitor, reference)
    };
    let overlapping = smaller.iter().filter(|d| larger.contains(*d)).count();
    let total = competitor.len();

    OverlapResult {
        source_name: String::new(),
        total_domains: total,
        overlapping_domains: overlapping,
        overlap_percentage: overlap_percentage(overlapping, total),
    }
}

fn ranking(a: &OverlapResult, b: &OverlapResult) -> Ordering {
    match (a.total_domains == 0, b.total_domains == 0) {
        (false, false) => b.overlap_percentage.total_cmp(&a.overlap_percentage),
        (empty_a, empty_b) => empty_a.cmp(&empty_b),
    }
}

/// Empty competitors last, the rest by descending percentage. Stable, so
/// exact ties keep their input order.
pub fn rank_results(results: &mut [OverlapResult]) {
    results.sort_by(ranking);
}

pub fn compare_all(reference: &DomainSet, competitors: &[&DomainSet]) -> Vec<OverlapResult> {
    let mut results: Vec<OverlapResult> = competitors
        .par_iter()
        .map(|competitor| OverlapResult {
            source_name: competitor.label.clone(),
            ..calculate_overlap(&reference.domains, &competitor.domains)
        })
        .collect();
    rank_results(&mut results);
    results
}
