use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

// Include the rules template at compile time
const DEFAULT_RULES_TEMPLATE: &str = include_str!("../default_catalog_rules.toml");

pub const DEFAULT_RULES_FILE: &str = "catalog_rules.toml";

pub const DEFAULT_MARKERS: [&str; 7] = [
    "promo-codes",
    "store",
    "coupons",
    "site",
    "coupon-codes",
    "s",
    "view",
];

/// Configuration consumed by the domain extraction cascade.
///
/// Both aggregator hosts are matched as substrings of the URL host, so
/// `retailer.example` also covers `www.retailer.example`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorRules {
    /// Path words whose following segment names a merchant domain.
    pub markers: Vec<String>,
    /// Aggregator serving merchant pages at `/s/<domain>`.
    pub slug_host: Option<String>,
    /// Aggregator whose dotless `/coupons/<slug>` pages must be rejected.
    pub coupon_guard_host: Option<String>,
}

impl Default for ExtractorRules {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            slug_host: None,
            coupon_guard_host: None,
        }
    }
}

impl ExtractorRules {
    pub fn with_slug_host(mut self, host: impl Into<String>) -> Self {
        self.slug_host = Some(host.into());
        self
    }

    pub fn with_coupon_guard_host(mut self, host: impl Into<String>) -> Self {
        self.coupon_guard_host = Some(host.into());
        self
    }

    pub fn is_marker(&self, segment: &str) -> bool {
        self.markers.iter().any(|m| m == segment)
    }
}

pub fn parse_rules(content: &str) -> Result<ExtractorRules> {
    let rules: ExtractorRules = toml::from_str(content)?;
    if rules.markers.iter().any(|m| m.is_empty() || m.contains('/')) {
        anyhow::bail!("Marker words must be non-empty single path segments");
    }
    Ok(rules)
}

pub fn load_rules(rules_file_path: Option<&Path>) -> Result<ExtractorRules> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "rules_loading",
        "Starting extractor rules loading"
    );

    let rules = if let Some(path) = rules_file_path {
        info!(action = "load", component = "rules_file", file_path = ?path, "Loading rules from specified file");
        if !path.exists() {
            anyhow::bail!("Rules file not found: {:?}", path);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {:?}", path))?;
        parse_rules(&content).with_context(|| format!("Invalid rules file {:?}", path))?
    } else {
        let default_file = Path::new(DEFAULT_RULES_FILE);
        if default_file.exists() {
            info!(action = "load", component = "default_rules_file", file_path = ?default_file, "Loading rules from default file");
            match fs::read_to_string(default_file)
                .map_err(anyhow::Error::from)
                .and_then(|content| parse_rules(&content))
            {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(action = "parse", component = "default_rules_file", error = %e, "Invalid rules file, using built-in defaults");
                    ExtractorRules::default()
                }
            }
        } else {
            info!(
                action = "load",
                component = "builtin_rules",
                "Using built-in default rules"
            );
            ExtractorRules::default()
        }
    };

    info!(
        action = "complete",
        component = "rules_loading",
        marker_count = rules.markers.len(),
        slug_host = rules.slug_host.as_deref().unwrap_or("-"),
        coupon_guard_host = rules.coupon_guard_host.as_deref().unwrap_or("-"),
        duration_ms = start_time.elapsed().as_millis(),
        "Extractor rules ready"
    );
    Ok(rules)
}

pub fn init_default_rules(target: &Path) -> Result<()> {
    if target.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first if you want to reinitialize.",
            target.display()
        );
    }

    fs::write(target, DEFAULT_RULES_TEMPLATE)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    println!("Created {} with default rules", target.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn template_matches_builtin_defaults() {
        let rules = parse_rules(DEFAULT_RULES_TEMPLATE).unwrap();
        assert_eq!(rules, ExtractorRules::default());
    }

    #[test]
    fn partial_file_keeps_default_markers() {
        let rules = parse_rules(r#"slug_host = "deals.example""#).unwrap();
        assert_eq!(rules.slug_host.as_deref(), Some("deals.example"));
        assert!(rules.coupon_guard_host.is_none());
        assert!(rules.is_marker("promo-codes"));
        assert!(rules.is_marker("s"));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_markers() {
        assert!(parse_rules("slughost = \"x\"").is_err());
        assert!(parse_rules("markers = [\"a/b\"]").is_err());
        assert!(parse_rules("markers = [\"\"]").is_err());
    }

    #[test]
    fn explicit_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(load_rules(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.toml");
        fs::write(&path, "markers = [\"brand\"]\ncoupon_guard_host = \"b.example\"\n").unwrap();

        let rules = load_rules(Some(&path)).unwrap();
        assert_eq!(rules.markers, vec!["brand".to_string()]);
        assert_eq!(rules.coupon_guard_host.as_deref(), Some("b.example"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_RULES_FILE);
        init_default_rules(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_RULES_TEMPLATE);
        assert!(init_default_rules(&path).is_err());
    }
}
