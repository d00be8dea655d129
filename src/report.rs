use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use url::Url;

use crate::domain::DomainExtractor;
use crate::domain_set::claim_label;
use crate::sitemap::SitemapUrl;
use crate::state::MerchantRecord;
use crate::stats::AnalysisResult;

pub const SUMMARY_FILE: &str = "summary.json";
pub const OVERLAP_FILE: &str = "overlap.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    Matched,
    #[serde(rename = "Not Matched")]
    NotMatched,
}

/// One competitor URL as it appears in the per-competitor CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedRow {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "Status")]
    pub status: MatchStatus,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Has Marker")]
    pub has_marker: Option<bool>,
    #[serde(rename = "Reference URL")]
    pub reference_url: Option<String>,
    #[serde(rename = "Store Name")]
    pub store_name: Option<String>,
}

fn last_segment(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_default()
}

/// Annotate each URL with whether its domain is in the reference catalog.
/// Rejected URLs carry their last path segment in place of a domain.
pub fn annotate_urls<'a>(
    urls: impl IntoIterator<Item = &'a SitemapUrl>,
    extractor: &DomainExtractor,
    reference_index: &HashMap<String, String>,
    merchants: &HashMap<String, MerchantRecord>,
) -> Vec<AnnotatedRow> {
    urls.into_iter()
        .map(|url| {
            let domain = match extractor.extract(&url.location) {
                Ok(domain) => domain.name,
                Err(_) => last_segment(&url.location),
            };
            let reference_url = reference_index.get(&domain).cloned();
            let merchant = merchants.get(&domain);

            AnnotatedRow {
                url: url.location.clone(),
                status: if reference_url.is_some() {
                    MatchStatus::Matched
                } else {
                    MatchStatus::NotMatched
                },
                has_marker: merchant.and_then(|m| m.has_marker),
                store_name: merchant.and_then(|m| m.store_name.clone()),
                reference_url,
                domain,
            }
        })
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    result: &'a AnalysisResult,
}

pub fn summary_json(result: &AnalysisResult) -> Result<String> {
    let summary = Summary {
        generated_at: Utc::now(),
        result,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the summary, the ranking and one annotated CSV per competitor into
/// `output_dir`, returning the files written.
pub fn write_reports(output_dir: &Path, result: &AnalysisResult) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let mut written = Vec::new();

    let summary_path = output_dir.join(SUMMARY_FILE);
    fs::write(&summary_path, summary_json(result)?)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    written.push(summary_path);

    let overlap_path = output_dir.join(OVERLAP_FILE);
    write_csv(&overlap_path, &result.results)?;
    written.push(overlap_path);

    // Distinct labels can sanitize to the same file name.
    let mut stems = HashSet::new();
    for (label, rows) in &result.annotations {
        let stem = claim_label(&mut stems, &file_safe(label), None);
        let path = output_dir.join(format!("{stem}_urls.csv"));
        write_csv(&path, rows)?;
        written.push(path);
    }

    info!(action = "write", component = "reports", output_dir = ?output_dir, file_count = written.len(), "Reports written");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ExtractorRules;
    use crate::stats::OverlapResult;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn rows() -> Vec<AnnotatedRow> {
        let extractor = DomainExtractor::new(ExtractorRules::default()).unwrap();
        let reference_index = HashMap::from([(
            "shop.com".to_string(),
            "https://ref.test/store/shop.com".to_string(),
        )]);
        let merchants = HashMap::from([(
            "shop.com".to_string(),
            MerchantRecord {
                url_path: Some("shop.com".into()),
                store_name: Some("Shop & Co".into()),
                has_marker: Some(true),
            },
        )]);
        let urls = [
            SitemapUrl::bare("https://comp.test/view/shop.com"),
            SitemapUrl::bare("https://comp.test/view/other.net"),
            SitemapUrl::bare("https://comp.test/brands/acme/"),
        ];
        annotate_urls(&urls, &extractor, &reference_index, &merchants)
    }

    #[test]
    fn annotates_matches_and_rejections() {
        let rows = rows();
        assert_eq!(
            rows[0],
            AnnotatedRow {
                url: "https://comp.test/view/shop.com".into(),
                status: MatchStatus::Matched,
                domain: "shop.com".into(),
                has_marker: Some(true),
                reference_url: Some("https://ref.test/store/shop.com".into()),
                store_name: Some("Shop & Co".into()),
            }
        );
        assert_eq!(rows[1].status, MatchStatus::NotMatched);
        assert_eq!(rows[1].domain, "other.net");
        assert_eq!(rows[1].reference_url, None);
        assert_eq!(rows[2].status, MatchStatus::NotMatched);
        assert_eq!(rows[2].domain, "acme");
    }

    #[test]
    fn writes_all_report_files() {
        let dir = TempDir::new().unwrap();
        let result = AnalysisResult {
            reference_source: "reference".into(),
            reference_domains: 3,
            reference_urls: 4,
            reference_rejected: 1,
            results: vec![OverlapResult {
                source_name: "comp/a".into(),
                total_domains: 3,
                overlapping_domains: 2,
                overlap_percentage: 66.67,
            }],
            annotations: BTreeMap::from([("comp/a".to_string(), rows())]),
        };

        let written = write_reports(&dir.path().join("out"), &result).unwrap();
        assert_eq!(written.len(), 3);

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written[0]).unwrap()).unwrap();
        assert_eq!(summary["referenceDomains"], 3);
        assert_eq!(summary["results"][0]["overlapPercentage"], 66.67);
        assert!(summary["generatedAt"].is_string());
        assert!(summary.get("annotations").is_none());

        let overlap = fs::read_to_string(&written[1]).unwrap();
        assert_eq!(
            overlap.lines().collect::<Vec<_>>(),
            [
                "sourceName,totalDomains,overlappingDomains,overlapPercentage",
                "comp/a,3,2,66.67"
            ]
        );

        assert!(written[2].ends_with("comp_a_urls.csv"));
        let annotated = fs::read_to_string(&written[2]).unwrap();
        let lines: Vec<&str> = annotated.lines().collect();
        assert_eq!(lines[0], "URL,Status,Domain,Has Marker,Reference URL,Store Name");
        assert_eq!(
            lines[1],
            "https://comp.test/view/shop.com,Matched,shop.com,true,https://ref.test/store/shop.com,Shop & Co"
        );
        assert_eq!(lines[2], "https://comp.test/view/other.net,Not Matched,other.net,,,");
    }

    #[test]
    fn sanitized_file_names_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let result = AnalysisResult {
            reference_source: "reference".into(),
            reference_domains: 1,
            reference_urls: 1,
            reference_rejected: 0,
            results: Vec::new(),
            annotations: BTreeMap::from([
                ("comp a".to_string(), rows()),
                ("comp_a".to_string(), rows()[..1].to_vec()),
            ]),
        };

        let written = write_reports(dir.path(), &result).unwrap();
        assert_eq!(written.len(), 4);
        assert!(written[2].ends_with("comp_a_urls.csv"));
        assert!(written[3].ends_with("comp_a-2_urls.csv"));
        assert_eq!(fs::read_to_string(&written[2]).unwrap().lines().count(), 4);
        assert_eq!(fs::read_to_string(&written[3]).unwrap().lines().count(), 2);
    }
}
