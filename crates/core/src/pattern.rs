//! Pattern post-processing: wildcard rendering, support filtering and
//! deduplication of trie output into persistable templates.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::UrlTemplate;
use crate::normalize::{MULTI_WILDCARD, WILDCARD};
use crate::tenant::App;

/// Default minimum number of requests a pattern needs to be persisted.
pub const DEFAULT_MIN_PATTERN_SUPPORT: u64 = 100;

/// A generalized path as emitted by the trie. The first segment is the domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlPattern {
    pub segments: Vec<String>,
    pub frequency: u64,
}

/// A `(domain, path, count)` triple ready for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternResult {
    pub domain: String,
    pub path: String,
    pub count: u64,
}

impl PatternResult {
    /// Splits a trie emission into domain and `/`-joined path.
    ///
    /// A pattern with only the domain maps to path `/`. Returns `None` when
    /// there are no segments at all.
    pub fn from_url_pattern(pattern: &UrlPattern) -> Option<Self> {
        let (domain, rest) = pattern.segments.split_first()?;
        Some(Self {
            domain: domain.clone(),
            path: format!("/{}", rest.join("/")),
            count: pattern.frequency,
        })
    }

    fn dedupe_key(&self) -> String {
        format!("{}\x00{}", self.domain, self.path)
    }
}

/// Rewrites a trailing run of two or more `*` path segments into one `**`.
///
/// The domain (first segment) is never part of the run. A single trailing
/// `*` and wildcards followed by a literal are left alone.
pub fn collapse_trailing_wildcards(mut pattern: UrlPattern) -> UrlPattern {
    let path_len = pattern.segments.len().saturating_sub(1);
    let run = pattern
        .segments
        .iter()
        .skip(1)
        .rev()
        .take_while(|s| s.as_str() == WILDCARD)
        .count();

    if run >= 2 && path_len >= run {
        let keep = pattern.segments.len() - run;
        pattern.segments.truncate(keep);
        pattern.segments.push(MULTI_WILDCARD.to_string());
    }
    pattern
}

/// Applies trailing-wildcard rendering and converts to results.
pub fn to_patterns(patterns: Vec<UrlPattern>) -> Vec<PatternResult> {
    patterns
        .into_iter()
        .map(collapse_trailing_wildcards)
        .filter_map(|p| PatternResult::from_url_pattern(&p))
        .collect()
}

/// Drops results whose count is below `min_support`.
pub fn filter_min_support(patterns: Vec<PatternResult>, min_support: u64) -> Vec<PatternResult> {
    patterns
        .into_iter()
        .filter(|p| p.count >= min_support)
        .collect()
}

/// Removes duplicate `(domain, path)` entries keeping the first occurrence.
pub fn dedupe(patterns: Vec<PatternResult>) -> Vec<PatternResult> {
    let mut seen = HashSet::new();
    patterns
        .into_iter()
        .filter(|p| seen.insert(p.dedupe_key()))
        .collect()
}

/// Full post-processing: support filter then dedupe, stamped as templates
/// for `app` at `updated_at`.
pub fn select_templates(
    app: &App,
    patterns: Vec<PatternResult>,
    min_support: u64,
    updated_at: DateTime<Utc>,
) -> Vec<UrlTemplate> {
    dedupe(filter_min_support(patterns, min_support))
        .into_iter()
        .map(|p| UrlTemplate {
            team_id: app.team_id,
            app_id: app.id,
            domain: p.domain,
            path: p.path,
            last_updated_at: updated_at,
        })
        .collect()
}
