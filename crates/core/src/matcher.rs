//! Matches raw request paths against persisted templates.
//!
//! Each event is attributed to at most one template on the same domain.
//! When several match, the most specific wins:
//!
//! 1. exact literal template
//! 2. segment-wise `*` template with the fewest wildcards
//! 3. `**` prefix template with the longest prefix
//!
//! Remaining ties fall back to the template path's lexical order, so the
//! choice never depends on the order templates were loaded in.

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::events::UrlTemplate;
use crate::normalize::{split_segments, MULTI_WILDCARD, WILDCARD};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Exact,
    Wildcard,
    Prefix,
}

#[derive(Debug, Clone)]
struct CompiledTemplate {
    path: String,
    /// Segments excluding a trailing `**`.
    segments: Vec<String>,
    tier: Tier,
    wildcards: usize,
}

impl CompiledTemplate {
    fn compile(path: &str) -> Self {
        let mut segments: Vec<String> = split_segments(path).map(str::to_string).collect();
        let multi = segments.last().is_some_and(|s| s == MULTI_WILDCARD);
        if multi {
            segments.pop();
        }
        let wildcards = segments.iter().filter(|s| s.as_str() == WILDCARD).count();
        let tier = if multi {
            Tier::Prefix
        } else if wildcards > 0 {
            Tier::Wildcard
        } else {
            Tier::Exact
        };
        Self {
            path: path.to_string(),
            segments,
            tier,
            wildcards,
        }
    }

    fn sort_key(&self) -> (Tier, Reverse<usize>, usize, &str) {
        let prefix_len = match self.tier {
            Tier::Prefix => self.segments.len(),
            _ => 0,
        };
        (self.tier, Reverse(prefix_len), self.wildcards, &self.path)
    }

    fn matches(&self, path: &[&str]) -> bool {
        let fixed_len_ok = match self.tier {
            Tier::Prefix => path.len() >= self.segments.len(),
            _ => path.len() == self.segments.len(),
        };
        fixed_len_ok
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(t, p)| t == WILDCARD || t == p)
    }
}

/// Per-domain template index.
#[derive(Debug, Clone, Default)]
pub struct TemplateMatcher {
    by_domain: HashMap<String, Vec<CompiledTemplate>>,
}

impl TemplateMatcher {
    pub fn new<'a>(templates: impl IntoIterator<Item = &'a UrlTemplate>) -> Self {
        Self::from_pairs(
            templates
                .into_iter()
                .map(|t| (t.domain.as_str(), t.path.as_str())),
        )
    }

    /// Builds a matcher from `(domain, path)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut by_domain: HashMap<String, Vec<CompiledTemplate>> = HashMap::new();
        for (domain, path) in pairs {
            let entry = by_domain.entry(domain.to_string()).or_default();
            if entry.iter().all(|t| t.path != path) {
                entry.push(CompiledTemplate::compile(path));
            }
        }
        for templates in by_domain.values_mut() {
            templates.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        }
        Self { by_domain }
    }

    /// Returns the template path `path` is attributed to on `domain`.
    pub fn match_path(&self, domain: &str, path: &str) -> Option<&str> {
        let templates = self.by_domain.get(domain)?;
        let segments: Vec<&str> = split_segments(path).collect();
        templates
            .iter()
            .find(|t| t.matches(&segments))
            .map(|t| t.path.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_domain.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_domain.is_empty()
    }
}
