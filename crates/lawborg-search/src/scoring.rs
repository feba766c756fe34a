use std::collections::HashSet;

use reqwest::Url;

use crate::providers::SearchResult;

/// Per-tier relevance weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierWeights {
    pub official: u32,
    pub academic: u32,
    pub other: u32,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self { official: 3, academic: 2, other: 1 }
    }
}

/// Domain allow/block lists applied to every provider response.
///
/// A pattern with a leading dot (".gov") matches any host under that
/// suffix; a bare domain matches itself and its subdomains.
#[derive(Debug, Clone, Default)]
pub struct ScoringPolicy {
    official: Vec<String>,
    academic: Vec<String>,
    blocked: Vec<String>,
    weights: TierWeights,
}

impl ScoringPolicy {
    pub fn new(official: Vec<String>, academic: Vec<String>, blocked: Vec<String>) -> Self {
        Self {
            official,
            academic,
            blocked,
            weights: TierWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: TierWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn official_domains(&self) -> &[String] {
        &self.official
    }

    pub fn academic_domains(&self) -> &[String] {
        &self.academic
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        host_of(url).is_some_and(|h| matches_any(&h, &self.blocked))
    }

    pub fn score(&self, url: &str) -> u32 {
        match host_of(url) {
            Some(h) if matches_any(&h, &self.official) => self.weights.official,
            Some(h) if matches_any(&h, &self.academic) => self.weights.academic,
            _ => self.weights.other,
        }
    }

    /// Drop blocked results, keep the first of each normalized URL, score,
    /// sort descending (stable on input order) and keep at most `limit`.
    pub fn rank(&self, results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
        let mut seen = HashSet::new();
        let mut kept: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| !self.is_blocked(&r.url))
            .filter(|r| seen.insert(normalize_url(&r.url)))
            .map(|mut r| {
                r.score = self.score(&r.url);
                r
            })
            .collect();
        kept.sort_by(|a, b| b.score.cmp(&a.score));
        kept.truncate(limit);
        kept
    }
}

/// Lower-case, fragment removed, trailing slash removed.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let s = match Url::parse(trimmed) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => trimmed.split('#').next().unwrap_or_default().to_string(),
    };
    s.to_lowercase().trim_end_matches('/').to_string()
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_lowercase()))
}

fn matches_any(host: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| domain_matches(host, p))
}

fn domain_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    if pattern.is_empty() {
        return false;
    }
    if let Some(suffix) = pattern.strip_prefix('.') {
        return host == suffix || host.ends_with(&pattern);
    }
    host == pattern || host.ends_with(&format!(".{pattern}"))
}
