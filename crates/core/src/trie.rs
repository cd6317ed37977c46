//! Pattern trie with cardinality collapse.
//!
//! Paths are inserted segment by segment with the domain as the first
//! segment. A node that keeps receiving new distinct children past the
//! configured threshold collapses: its children are merged into a single
//! `*` child and every later insertion through it is absorbed there.
//!
//! ```text
//! root
//!  └─ api.example.com          depth 1 (never collapses by default)
//!      └─ users                depth 2
//!          └─ *                collapsed: 1, 2, 3, ... merged
//!              └─ orders
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::normalize::{split_segments, WILDCARD};
use crate::pattern::{collapse_trailing_wildcards, PatternResult, UrlPattern};

/// Default number of distinct children at which a node collapses.
pub const DEFAULT_HIGH_CARDINALITY_THRESHOLD: usize = 10;

/// Default shallowest depth allowed to collapse.
///
/// Root is depth 0 (children are domains) and the domain node is depth 1
/// (children are first-level path segments); both stay literal.
pub const DEFAULT_MIN_COLLAPSE_DEPTH: usize = 2;

/// Collapse policy for a trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrieConfig {
    /// Distinct-children count at which inserting a new label collapses the node.
    pub high_cardinality_threshold: usize,
    /// Nodes shallower than this never collapse.
    pub min_collapse_depth: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        Self {
            high_cardinality_threshold: DEFAULT_HIGH_CARDINALITY_THRESHOLD,
            min_collapse_depth: DEFAULT_MIN_COLLAPSE_DEPTH,
        }
    }
}

impl TrieConfig {
    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            high_cardinality_threshold: threshold,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    children: HashMap<String, Node>,
    /// Weight of requests whose path ended exactly here.
    count: u64,
    /// Weight absorbed by this node after it collapsed.
    absorbed: u64,
    /// A complete path was observed at this prefix.
    is_pattern: bool,
    /// Invariant: collapsed implies exactly one child, labelled `*`.
    is_collapsed: bool,
    depth: usize,
}

impl Node {
    fn at_depth(depth: usize) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    /// Merges `other` into `self`, unioning children by label.
    fn merge(&mut self, other: Node) {
        self.count += other.count;
        self.absorbed += other.absorbed;
        self.is_pattern |= other.is_pattern;
        let collapsed = self.is_collapsed || other.is_collapsed;

        for (label, child) in other.children {
            match self.children.get_mut(&label) {
                Some(existing) => existing.merge(child),
                None => {
                    self.children.insert(label, child);
                }
            }
        }

        if collapsed {
            self.collapse();
        }
    }

    /// Folds every child into a single `*` child and marks the node collapsed.
    fn collapse(&mut self) {
        let mut wildcard = Node::at_depth(self.depth + 1);
        for (_, child) in self.children.drain() {
            wildcard.merge(child);
        }
        self.children.insert(WILDCARD.to_string(), wildcard);
        self.is_collapsed = true;
    }

    fn subtree_weight(&self) -> u64 {
        self.count
            + self.absorbed
            + self
                .children
                .values()
                .map(Node::subtree_weight)
                .sum::<u64>()
    }

    fn subtree_nodes(&self) -> usize {
        1 + self.children.values().map(Node::subtree_nodes).sum::<usize>()
    }
}

/// A trie of path segments that generalizes high-cardinality positions.
///
/// One instance is built per (team, app) and dropped afterwards.
#[derive(Debug, Clone)]
pub struct PatternTrie {
    root: Node,
    config: TrieConfig,
}

impl PatternTrie {
    /// Creates an empty trie with the given collapse threshold.
    pub fn new(high_cardinality_threshold: usize) -> Self {
        Self::with_config(TrieConfig::with_threshold(high_cardinality_threshold))
    }

    pub fn with_config(config: TrieConfig) -> Self {
        Self {
            root: Node::at_depth(0),
            config,
        }
    }

    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Inserts `weight` requests for `path` under `domain`.
    ///
    /// The path is split on `/` and empty segments are dropped, so `/` and
    /// `` both record a request for the bare domain.
    pub fn insert(&mut self, domain: &str, path: &str, weight: u64) {
        let segments: Vec<&str> = std::iter::once(domain)
            .filter(|d| !d.is_empty())
            .chain(split_segments(path))
            .collect();
        self.insert_segments(&segments, weight);
    }

    /// Inserts a pre-split segment list whose first element is the domain.
    pub fn insert_segments(&mut self, segments: &[&str], weight: u64) {
        if segments.is_empty() || weight == 0 {
            return;
        }

        let threshold = self.config.high_cardinality_threshold;
        let min_depth = self.config.min_collapse_depth;
        let mut node = &mut self.root;

        for segment in segments {
            if node.is_collapsed {
                node.absorbed += weight;
                return;
            }

            let label = if node.children.contains_key(*segment) {
                (*segment).to_string()
            } else if node.depth >= min_depth && node.children.len() >= threshold {
                node.collapse();
                WILDCARD.to_string()
            } else {
                (*segment).to_string()
            };

            let depth = node.depth + 1;
            node = node
                .children
                .entry(label)
                .or_insert_with(|| Node::at_depth(depth));
        }

        node.count += weight;
        node.is_pattern = true;
    }

    /// Folds `other` into this trie, unioning children by label.
    pub fn merge(&mut self, other: PatternTrie) {
        self.root.merge(other.root);
    }

    /// Raw emissions: one per pattern node and one per collapsed node that
    /// absorbed traffic. Segments include the domain first.
    pub fn url_patterns(&self) -> Vec<UrlPattern> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        for (label, child) in &self.root.children {
            prefix.push(label.clone());
            collect(child, &mut prefix, &mut out);
            prefix.pop();
        }
        out
    }

    /// Extracts `(domain, path, count)` patterns.
    ///
    /// Trailing runs of two or more `*` are rendered as `**`. Emissions that
    /// land on the same `(domain, path)` are summed. Output is sorted by
    /// domain then path.
    pub fn extract_patterns(&self) -> Vec<PatternResult> {
        let mut totals: BTreeMap<(String, String), u64> = BTreeMap::new();
        for pattern in self.url_patterns() {
            let pattern = collapse_trailing_wildcards(pattern);
            if let Some(result) = PatternResult::from_url_pattern(&pattern) {
                *totals.entry((result.domain, result.path)).or_default() += result.count;
            }
        }
        totals
            .into_iter()
            .map(|((domain, path), count)| PatternResult {
                domain,
                path,
                count,
            })
            .collect()
    }

    /// Total weight inserted, including absorbed weight.
    pub fn total_count(&self) -> u64 {
        self.root.subtree_weight()
    }

    /// Number of nodes excluding the root.
    pub fn node_count(&self) -> usize {
        self.root.subtree_nodes() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}

fn collect(node: &Node, prefix: &mut Vec<String>, out: &mut Vec<UrlPattern>) {
    if node.is_pattern {
        out.push(UrlPattern {
            segments: prefix.clone(),
            frequency: node.count,
        });
    }

    if node.is_collapsed && node.absorbed > 0 {
        let mut segments = prefix.clone();
        segments.push(WILDCARD.to_string());
        out.push(UrlPattern {
            segments,
            frequency: node.absorbed,
        });
    }

    for (label, child) in &node.children {
        prefix.push(label.clone());
        collect(child, prefix, out);
        prefix.pop();
    }
}
