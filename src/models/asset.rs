//! Discovered web asset model, the Selection Engine's input.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A live web server discovered by the upstream reconnaissance pipeline.
///
/// Read-only to the core; the Selection Engine filters and sorts these and
/// the selected subset is turned into [`TargetSpec`]s.
///
/// [`TargetSpec`]: crate::models::target::TargetSpec
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredAsset {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub scheme: String,
    #[serde(default)]
    pub technologies: BTreeSet<String>,
    #[serde(default)]
    pub content_length: u64,
}
