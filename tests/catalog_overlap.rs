//! End-to-end runs over sitemap trees on disk.

use catalog_overlap::{analyze_catalogs, report, Args};
use clap::Parser;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn urlset(locs: &[&str]) -> String {
    let body: String = locs
        .iter()
        .map(|loc| format!("  <url><loc>{loc}</loc></url>\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{body}</urlset>\n"
    )
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// reference: a.com b.com c.com
/// agg (subdir, two files): b.com c.com d.com, plus rejected slugs
/// flat: a.com only
/// ghost (subdir): nothing parseable
fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        &root.join("reference/sitemap-1.xml"),
        &urlset(&["https://ref.test/store/a.com", "https://ref.test/coupons/b.com"]),
    );
    write(
        &root.join("reference/nested/sitemap-2.xml"),
        &urlset(&["https://www.c.com", "https://ref.test/about"]),
    );

    write(
        &root.join("competitors/agg/part-1.xml"),
        &urlset(&["https://agg.test/s/b.com", "https://agg.test/s/all", "https://agg.test/s/nodot"]),
    );
    write(
        &root.join("competitors/agg/part-2.xml"),
        "<catalog><url><loc>https://agg.test/s/c.com</loc></url><url><loc>https://agg.test/s/d.com</loc></url></catalog>",
    );
    write(
        &root.join("competitors/flat.xml"),
        "https://flat.test/promo-codes/a.com/page\n",
    );
    write(&root.join("competitors/ghost/broken.xml"), "<urlset><url>");

    write(
        &root.join("rules.toml"),
        "slug_host = \"agg.test\"\n",
    );
    write(
        &root.join("state.json"),
        r#"{"merchants": [{"urlPath": "a.com", "storeName": "A Store", "hasMarker": false}, {"urlPath": "x.com"}]}"#,
    );
    dir
}

fn args(root: &Path, extra: &[&str]) -> Args {
    let mut argv = vec![
        "catalog-overlap".to_string(),
        "--reference".to_string(),
        root.join("reference").display().to_string(),
        "--competitors".to_string(),
        root.join("competitors").display().to_string(),
        "--rules".to_string(),
        root.join("rules.toml").display().to_string(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Args::parse_from(argv)
}

#[test]
fn ranks_competitors_against_reference() {
    let dir = fixture();
    let result = analyze_catalogs(&args(dir.path(), &[])).unwrap();

    assert_eq!(result.reference_source, "reference");
    assert_eq!(result.reference_domains, 3);
    assert_eq!(result.reference_urls, 4);
    assert_eq!(result.reference_rejected, 1);

    let ranked: Vec<(&str, usize, usize, f64)> = result
        .results
        .iter()
        .map(|r| {
            (
                r.source_name.as_str(),
                r.overlapping_domains,
                r.total_domains,
                r.overlap_percentage,
            )
        })
        .collect();
    assert_eq!(
        ranked,
        [
            ("flat", 1, 1, 100.0),
            ("agg", 2, 3, 66.67),
            ("ghost", 0, 0, 0.0),
        ]
    );

    let agg_rows = &result.annotations["agg"];
    assert_eq!(agg_rows.len(), 5);
    assert_eq!(
        agg_rows[0].reference_url.as_deref(),
        Some("https://ref.test/coupons/b.com")
    );
    assert_eq!(agg_rows[1].domain, "all");
    assert_eq!(agg_rows[2].domain, "nodot");
}

#[test]
fn scrape_state_joins_the_ranking() {
    let dir = fixture();
    let state = dir.path().join("state.json").display().to_string();
    let result = analyze_catalogs(&args(dir.path(), &["--state", &state, "--require-state"])).unwrap();

    let state_entry = result
        .results
        .iter()
        .find(|r| r.source_name == "scrape-state")
        .unwrap();
    assert_eq!(state_entry.total_domains, 2);
    assert_eq!(state_entry.overlapping_domains, 1);
    assert_eq!(state_entry.overlap_percentage, 50.0);

    let flat = &result.annotations["flat"][0];
    assert_eq!(flat.store_name.as_deref(), Some("A Store"));
    assert_eq!(flat.has_marker, Some(false));
}

#[test]
fn required_state_must_exist() {
    let dir = fixture();
    let missing = dir.path().join("missing.json").display().to_string();
    assert!(analyze_catalogs(&args(dir.path(), &["--state", &missing, "--require-state"])).is_err());

    let result = analyze_catalogs(&args(dir.path(), &["--state", &missing])).unwrap();
    let state_entry = result
        .results
        .iter()
        .find(|r| r.source_name == "scrape-state")
        .unwrap();
    assert_eq!(state_entry.total_domains, 0);
    assert_eq!(result.results.last().map(|r| r.total_domains), Some(0));
}

#[test]
fn missing_reference_is_fatal() {
    let dir = fixture();
    fs::remove_dir_all(dir.path().join("reference")).unwrap();
    assert!(analyze_catalogs(&args(dir.path(), &[])).is_err());
}

#[test]
fn reports_are_written() {
    let dir = fixture();
    let result = analyze_catalogs(&args(dir.path(), &[])).unwrap();
    let out = dir.path().join("out");
    let written = report::write_reports(&out, &result).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "summary.json",
            "overlap.csv",
            "agg_urls.csv",
            "flat_urls.csv",
            "ghost_urls.csv"
        ]
    );

    let overlap = fs::read_to_string(out.join("overlap.csv")).unwrap();
    assert_eq!(overlap.lines().nth(1), Some("flat,1,1,100.0"));
    let ghost = fs::read_to_string(out.join("ghost_urls.csv")).unwrap();
    assert!(ghost.is_empty());
}
