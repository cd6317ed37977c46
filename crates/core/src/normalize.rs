//! Path normalization.
//!
//! Rewrites path segments with a known dynamic shape (ids, hashes, dates)
//! to the single-segment wildcard before they reach the trie, so requests
//! that differ only by identifier bucket together from the start.

use regex::Regex;
use std::sync::LazyLock;

/// Matches exactly one path segment.
pub const WILDCARD: &str = "*";

/// Matches zero or more trailing path segments. Only valid as the last token.
pub const MULTI_WILDCARD: &str = "**";

/// Shapes recognized as dynamic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicKind {
    Uuid,
    Sha1,
    Md5,
    IsoDate,
    Hex,
    Integer,
}

static RULES: LazyLock<Vec<(DynamicKind, Regex)>> = LazyLock::new(|| {
    [
        (
            DynamicKind::Uuid,
            r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
        ),
        (DynamicKind::Sha1, r"(?i)^[0-9a-f]{40}$"),
        (DynamicKind::Md5, r"(?i)^[0-9a-f]{32}$"),
        (DynamicKind::IsoDate, r"(?i)^[0-9]{4}-[01][0-9]-[0-3][0-9]T"),
        (DynamicKind::Hex, r"(?i)^0x[0-9a-f]+$"),
        (DynamicKind::Integer, r"^[0-9]{2,}$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| {
        (
            kind,
            Regex::new(pattern).expect("invalid dynamic segment pattern"),
        )
    })
    .collect()
});

/// Returns the dynamic shape of a segment, if any.
pub fn classify_segment(segment: &str) -> Option<DynamicKind> {
    if segment.is_empty() {
        return None;
    }
    RULES
        .iter()
        .find(|(_, re)| re.is_match(segment))
        .map(|(kind, _)| *kind)
}

/// Normalizes a single segment: `*` for dynamic shapes, unchanged otherwise.
pub fn normalize_segment(segment: &str) -> &str {
    if classify_segment(segment).is_some() {
        WILDCARD
    } else {
        segment
    }
}

/// Normalizes every non-empty segment of a path.
///
/// Empty segments keep their position so the slash structure is preserved.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(normalize_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Splits a path into its non-empty segments.
pub fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
