//! Target selection engine: pure, synchronous filter/sort/quick-select over
//! discovered assets. No I/O, no hidden session state — callers pass the
//! asset list in and get a new list (or id set) back.

use serde::{Deserialize, Serialize};

use crate::models::asset::DiscoveredAsset;

/// Status code class used by the filter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    #[default]
    All,
    /// 2xx
    Success,
    /// 3xx
    Redirect,
    /// 4xx and above
    Error,
}

impl StatusClass {
    fn matches(&self, status_code: u16) -> bool {
        match self {
            Self::All => true,
            Self::Success => (200..300).contains(&status_code),
            Self::Redirect => (300..400).contains(&status_code),
            Self::Error => status_code >= 400,
        }
    }
}

/// Field to sort the filtered subset on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Url,
    Host,
    Port,
    StatusCode,
    Title,
    Server,
    ContentLength,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Named quick-select predicate groups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuickSelect {
    SuccessOnly,
    HttpsOnly,
    AdminLike,
    ApiLike,
}

/// Filter assets by free-text query and status class.
///
/// The text query matches case-insensitively against url, title and server
/// (substring, any field sufficient). Input order is preserved; an empty
/// query with `StatusClass::All` returns the input unchanged.
pub fn filter(
    assets: &[DiscoveredAsset],
    text_query: &str,
    status_class: StatusClass,
) -> Vec<DiscoveredAsset> {
    let query = text_query.trim().to_lowercase();
    assets
        .iter()
        .filter(|asset| {
            let matches_text = query.is_empty()
                || asset.url.to_lowercase().contains(&query)
                || asset.title.to_lowercase().contains(&query)
                || asset.server.to_lowercase().contains(&query);
            matches_text && status_class.matches(asset.status_code)
        })
        .cloned()
        .collect()
}

/// Stable sort on the chosen field's string representation; ties retain
/// their prior relative order.
pub fn sort(
    mut subset: Vec<DiscoveredAsset>,
    key: SortKey,
    direction: SortDirection,
) -> Vec<DiscoveredAsset> {
    subset.sort_by(|a, b| {
        let ordering = key_string(a, key).cmp(&key_string(b, key));
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    subset
}

fn key_string(asset: &DiscoveredAsset, key: SortKey) -> String {
    match key {
        SortKey::Url => asset.url.clone(),
        SortKey::Host => asset.host.clone(),
        SortKey::Port => asset.port.to_string(),
        SortKey::StatusCode => asset.status_code.to_string(),
        SortKey::Title => asset.title.clone(),
        SortKey::Server => asset.server.clone(),
        SortKey::ContentLength => asset.content_length.to_string(),
    }
}

/// Ids of the subset's assets matching a named predicate group.
pub fn quick_select(subset: &[DiscoveredAsset], which: QuickSelect) -> Vec<u64> {
    let predicate: fn(&DiscoveredAsset) -> bool = match which {
        QuickSelect::SuccessOnly => success_only,
        QuickSelect::HttpsOnly => https_only,
        QuickSelect::AdminLike => admin_like,
        QuickSelect::ApiLike => api_like,
    };
    subset
        .iter()
        .filter(|asset| predicate(asset))
        .map(|asset| asset.id)
        .collect()
}

/// "Select all" over the currently filtered subset only, never the full
/// unfiltered collection.
pub fn select_all(subset: &[DiscoveredAsset]) -> Vec<u64> {
    subset.iter().map(|asset| asset.id).collect()
}

pub fn success_only(asset: &DiscoveredAsset) -> bool {
    (200..300).contains(&asset.status_code)
}

pub fn https_only(asset: &DiscoveredAsset) -> bool {
    asset.scheme.eq_ignore_ascii_case("https")
}

pub fn admin_like(asset: &DiscoveredAsset) -> bool {
    contains_ci(&asset.url, "admin")
        || contains_ci(&asset.title, "admin")
        || contains_ci(&asset.url, "panel")
        || contains_ci(&asset.title, "panel")
}

pub fn api_like(asset: &DiscoveredAsset) -> bool {
    contains_ci(&asset.url, "api") || contains_ci(&asset.url, "v1") || contains_ci(&asset.url, "v2")
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
