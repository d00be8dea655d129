//! Merchant domain extraction from catalog URLs.
//!
//! Catalog sites embed the merchant they describe somewhere in their own URL
//! structure. [`DomainExtractor::extract`] runs an ordered cascade of rules
//! over the parsed URL and stops at the first rule that reaches a verdict.

use anyhow::Result;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::rules::ExtractorRules;

const DOMAIN_SHAPE: &str = r"^[a-zA-Z0-9][a-zA-Z0-9-]*(\.[a-zA-Z0-9-]+)+$";
const SLUG_PREFIX: &str = "s";
const SLUG_ALL: &str = "all";
const COUPONS_SEGMENT: &str = "coupons";

/// A merchant identity. Two domains are the same merchant iff `name` is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    /// The token as it appeared in the URL.
    pub full: String,
    /// Canonical form used for set membership.
    pub name: String,
}

impl Domain {
    fn verbatim(token: &str) -> Self {
        Self {
            full: token.to_string(),
            name: token.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("malformed url: {0}")]
    MalformedUrl(String),
    #[error("aggregator listing page /s/all")]
    SlugIsAll,
    #[error("aggregator slug `{0}` is not a domain")]
    SlugWithoutDot(String),
    #[error("coupon slug `{0}` is not a domain")]
    CouponSlugWithoutDot(String),
    #[error("no domain found")]
    NoDomainFound,
}

pub type Verdict = std::result::Result<Domain, Rejection>;

/// The parts of a URL the rules look at.
#[derive(Debug)]
pub struct UrlParts<'a> {
    pub host: Option<&'a str>,
    pub segments: Vec<&'a str>,
}

impl<'a> UrlParts<'a> {
    pub fn new(url: &'a Url) -> Self {
        let segments = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        Self {
            host: url.host_str(),
            segments,
        }
    }

    fn host_contains(&self, needle: Option<&str>) -> bool {
        match (self.host, needle) {
            (Some(host), Some(needle)) if !needle.is_empty() => host.contains(needle),
            _ => false,
        }
    }
}

/// A rule either reaches a verdict or passes to the next one.
type Rule = fn(&DomainExtractor, &UrlParts<'_>) -> Option<Verdict>;

const CASCADE: [(&str, Rule); 5] = [
    ("aggregator_slug", DomainExtractor::aggregator_slug),
    ("embedded_domain", DomainExtractor::embedded_domain),
    ("marker_follows", DomainExtractor::marker_follows),
    ("coupon_guard", DomainExtractor::coupon_guard),
    ("hostname_fallback", DomainExtractor::hostname_fallback),
];

#[derive(Debug, Clone)]
pub struct DomainExtractor {
    rules: ExtractorRules,
    domain_shape: Regex,
}

impl DomainExtractor {
    pub fn new(rules: ExtractorRules) -> Result<Self> {
        Ok(Self {
            rules,
            domain_shape: Regex::new(DOMAIN_SHAPE)?,
        })
    }

    /// Extract the merchant domain from `url`. Never fails for bad input;
    /// unparsable URLs come back as [`Rejection::MalformedUrl`].
    pub fn extract(&self, url: &str) -> Verdict {
        let parsed = Url::parse(url.trim()).map_err(|e| Rejection::MalformedUrl(e.to_string()))?;
        self.extract_parts(&UrlParts::new(&parsed))
    }

    pub fn extract_parts(&self, parts: &UrlParts<'_>) -> Verdict {
        CASCADE
            .iter()
            .find_map(|(_, rule)| rule(self, parts))
            .unwrap_or(Err(Rejection::NoDomainFound))
    }

    /// Name of the rule that decides `url`, for diagnostics.
    pub fn deciding_rule(&self, url: &str) -> Option<&'static str> {
        let parsed = Url::parse(url.trim()).ok()?;
        let parts = UrlParts::new(&parsed);
        CASCADE
            .iter()
            .find(|(_, rule)| rule(self, &parts).is_some())
            .map(|(name, _)| *name)
    }

    fn aggregator_slug(&self, parts: &UrlParts<'_>) -> Option<Verdict> {
        if !parts.host_contains(self.rules.slug_host.as_deref()) {
            return None;
        }
        let [prefix, slug] = parts.segments.as_slice() else {
            return None;
        };
        if *prefix != SLUG_PREFIX {
            return None;
        }

        Some(if *slug == SLUG_ALL {
            Err(Rejection::SlugIsAll)
        } else if !slug.contains('.') {
            Err(Rejection::SlugWithoutDot(slug.to_string()))
        } else {
            Ok(Domain::verbatim(slug))
        })
    }

    fn embedded_domain(&self, parts: &UrlParts<'_>) -> Option<Verdict> {
        parts
            .segments
            .iter()
            .find(|segment| self.domain_shape.is_match(segment))
            .map(|segment| Ok(Domain::verbatim(segment)))
    }

    // Every marker is tried, not just the first one in the path.
    fn marker_follows(&self, parts: &UrlParts<'_>) -> Option<Verdict> {
        parts
            .segments
            .windows(2)
            .find(|pair| self.rules.is_marker(pair[0]) && pair[1].contains('.'))
            .map(|pair| Ok(Domain::verbatim(pair[1])))
    }

    fn coupon_guard(&self, parts: &UrlParts<'_>) -> Option<Verdict> {
        if !parts.host_contains(self.rules.coupon_guard_host.as_deref()) {
            return None;
        }
        let position = parts.segments.iter().position(|s| *s == COUPONS_SEGMENT)?;
        let slug = parts.segments.get(position + 1)?;
        if slug.contains('.') {
            return None;
        }
        Some(Err(Rejection::CouponSlugWithoutDot(slug.to_string())))
    }

    fn hostname_fallback(&self, parts: &UrlParts<'_>) -> Option<Verdict> {
        if !parts.segments.is_empty() {
            return None;
        }
        let host = parts.host.filter(|host| host.contains('.'))?;
        Some(Ok(Domain {
            full: host.to_string(),
            name: host.strip_prefix("www.").unwrap_or(host).to_string(),
        }))
    }
}
