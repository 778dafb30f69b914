//! Normalized scan target input.

use serde::{Deserialize, Serialize};

/// Normalized input describing one host to be scanned.
///
/// Immutable after creation: the address is non-empty, trimmed and carries
/// no scheme prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetSpec {
    pub address: String,
    pub description: String,
}

impl TargetSpec {
    /// Build a spec from one raw line of user or asset input.
    ///
    /// Returns `None` when nothing is left after normalization.
    pub fn parse(raw: &str, description: &str) -> Option<Self> {
        let address = normalize_address(raw)?;
        Some(Self {
            address,
            description: description.to_string(),
        })
    }

    /// Normalize a raw multi-line target list: trim, drop empties, strip
    /// scheme prefixes and path suffixes, de-duplicate preserving
    /// first-occurrence order.
    pub fn parse_lines(input: &str, description: &str) -> Vec<Self> {
        let mut seen = std::collections::HashSet::new();
        input
            .lines()
            .filter_map(|line| Self::parse(line, description))
            .filter(|spec| seen.insert(spec.address.clone()))
            .collect()
    }
}

/// Strip scheme prefix and any path, returning the bare host[:port].
fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .trim();
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
