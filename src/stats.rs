use serde::Serialize;
use std::collections::BTreeMap;

use crate::report::AnnotatedRow;

/// Overlap of the reference catalog with one competitor, relative to the
/// competitor's size.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapResult {
    pub source_name: String,
    pub total_domains: usize,
    pub overlapping_domains: usize,
    pub overlap_percentage: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub reference_source: String,
    pub reference_domains: usize,
    pub reference_urls: usize,
    pub reference_rejected: usize,
    pub results: Vec<OverlapResult>,
    #[serde(skip)]
    pub annotations: BTreeMap<String, Vec<AnnotatedRow>>,
}
