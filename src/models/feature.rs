//! Canonical in-memory feature model
//!
//! Every field that an older snapshot schema might lack is wrapped in
//! [`OptionallySet`]. The feature id is always present.

use crate::optional::OptionallySet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A snapshot: feature id -> feature
pub type FeatureMap = BTreeMap<String, Feature>;

/// A single web-platform feature as seen in one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub name: OptionallySet<String>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub baseline_status: OptionallySet<BaselineState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub browser_impls: OptionallySet<BrowserImplementations>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub docs: OptionallySet<Docs>,
}

impl Feature {
    /// A feature with only id and name set
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: OptionallySet::set(name.into()),
            baseline_status: OptionallySet::unset(),
            browser_impls: OptionallySet::unset(),
            docs: OptionallySet::unset(),
        }
    }

    pub fn with_baseline_status(mut self, status: BaselineInfoStatus) -> Self {
        let mut baseline = self.baseline_status.value_or_default();
        baseline.status = OptionallySet::set(status);
        self.baseline_status = OptionallySet::set(baseline);
        self
    }

    pub fn with_baseline(mut self, baseline: BaselineState) -> Self {
        self.baseline_status = OptionallySet::set(baseline);
        self
    }

    /// Set one browser slot, materializing the implementations record if needed
    pub fn with_browser(mut self, key: BrowserKey, state: BrowserState) -> Self {
        let mut impls = self.browser_impls.value_or_default();
        *impls.slot_mut(key) = OptionallySet::set(state);
        self.browser_impls = OptionallySet::set(impls);
        self
    }

    pub fn with_browser_impls(mut self, impls: BrowserImplementations) -> Self {
        self.browser_impls = OptionallySet::set(impls);
        self
    }

    /// Set the MDN docs from bare URLs
    pub fn with_mdn_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.docs = OptionallySet::set(Docs::from_urls(urls));
        self
    }

    /// Display name, falling back to the id when the name is unset
    pub fn display_name(&self) -> String {
        self.name.value().cloned().unwrap_or_else(|| self.id.clone())
    }
}

/// Baseline interoperability classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineInfoStatus {
    Limited,
    Newly,
    Widely,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineState {
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub status: OptionallySet<BaselineInfoStatus>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub low_date: OptionallySet<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub high_date: OptionallySet<Option<NaiveDate>>,
}

/// The fixed set of tracked browsers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserKey {
    Chrome,
    ChromeAndroid,
    Edge,
    Firefox,
    FirefoxAndroid,
    Safari,
    SafariIos,
}

impl BrowserKey {
    pub const ALL: [BrowserKey; 7] = [
        BrowserKey::Chrome,
        BrowserKey::ChromeAndroid,
        BrowserKey::Edge,
        BrowserKey::Firefox,
        BrowserKey::FirefoxAndroid,
        BrowserKey::Safari,
        BrowserKey::SafariIos,
    ];
}

/// Per-browser implementation record, exactly one slot per [`BrowserKey`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserImplementations {
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub chrome: OptionallySet<BrowserState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub chrome_android: OptionallySet<BrowserState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub edge: OptionallySet<BrowserState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub firefox: OptionallySet<BrowserState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub firefox_android: OptionallySet<BrowserState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub safari: OptionallySet<BrowserState>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub safari_ios: OptionallySet<BrowserState>,
}

impl BrowserImplementations {
    pub fn slot(&self, key: BrowserKey) -> &OptionallySet<BrowserState> {
        match key {
            BrowserKey::Chrome => &self.chrome,
            BrowserKey::ChromeAndroid => &self.chrome_android,
            BrowserKey::Edge => &self.edge,
            BrowserKey::Firefox => &self.firefox,
            BrowserKey::FirefoxAndroid => &self.firefox_android,
            BrowserKey::Safari => &self.safari,
            BrowserKey::SafariIos => &self.safari_ios,
        }
    }

    pub fn slot_mut(&mut self, key: BrowserKey) -> &mut OptionallySet<BrowserState> {
        match key {
            BrowserKey::Chrome => &mut self.chrome,
            BrowserKey::ChromeAndroid => &mut self.chrome_android,
            BrowserKey::Edge => &mut self.edge,
            BrowserKey::Firefox => &mut self.firefox,
            BrowserKey::FirefoxAndroid => &mut self.firefox_android,
            BrowserKey::Safari => &mut self.safari,
            BrowserKey::SafariIos => &mut self.safari_ios,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserStatus {
    Available,
    Unavailable,
}

/// Implementation state of a feature in one browser
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserState {
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub status: OptionallySet<BrowserStatus>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub version: OptionallySet<Option<String>>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub date: OptionallySet<Option<NaiveDate>>,
}

impl BrowserState {
    pub fn available(version: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            status: OptionallySet::set(BrowserStatus::Available),
            version: OptionallySet::set(Some(version.into())),
            date: OptionallySet::set(date),
        }
    }

    /// Unavailable with no version or date attached
    pub fn unavailable() -> Self {
        Self {
            status: OptionallySet::set(BrowserStatus::Unavailable),
            version: OptionallySet::unset(),
            date: OptionallySet::unset(),
        }
    }

    /// Unavailable and carrying no version or date detail.
    ///
    /// A slot appearing with exactly this content is a schema backfill,
    /// not news.
    pub fn is_bare_unavailable(&self) -> bool {
        let no_version = self.version.value().map_or(true, |v| v.is_none());
        let no_date = self.date.value().map_or(true, |d| d.is_none());
        self.status.value() == Some(&BrowserStatus::Unavailable) && no_version && no_date
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docs {
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub mdn_docs: OptionallySet<Vec<MdnDoc>>,
}

impl Docs {
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mdn_docs: OptionallySet::set(urls.into_iter().map(MdnDoc::new).collect()),
        }
    }

    /// MDN URLs sorted ascending; the identity used for comparison
    pub fn sorted_urls(&self) -> Vec<&str> {
        let mut urls: Vec<&str> = self
            .mdn_docs
            .value()
            .map(|docs| docs.iter().map(|d| d.url.as_str()).collect())
            .unwrap_or_default();
        urls.sort_unstable();
        urls
    }
}

/// A single MDN page. Identity is the URL alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdnDoc {
    pub url: String,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub title: OptionallySet<Option<String>>,
    #[serde(default, skip_serializing_if = "OptionallySet::is_unset")]
    pub slug: OptionallySet<Option<String>>,
}

impl MdnDoc {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: OptionallySet::unset(),
            slug: OptionallySet::unset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_v1_feature_without_docs_or_browsers() {
        let json = r#"{"id": "grid", "name": "Grid", "baselineStatus": {"status": "widely"}}"#;
        let feature: Feature = serde_json::from_str(json).unwrap();

        assert_eq!(feature.display_name(), "Grid");
        assert!(feature.docs.is_unset());
        assert!(feature.browser_impls.is_unset());
        let baseline = feature.baseline_status.value().unwrap();
        assert_eq!(baseline.status.value(), Some(&BaselineInfoStatus::Widely));
        assert!(baseline.low_date.is_unset());
    }

    #[test]
    fn test_browser_slot_round_trip_keeps_null_version() {
        let json = r#"{"status": "unavailable", "version": null}"#;
        let state: BrowserState = serde_json::from_str(json).unwrap();

        assert_eq!(state.version, OptionallySet::set(None));
        assert!(state.date.is_unset());
        assert!(state.is_bare_unavailable());
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"status":"unavailable","version":null}"#
        );
    }

    #[test]
    fn test_bare_unavailable_requires_no_details() {
        let mut state = BrowserState::unavailable();
        assert!(state.is_bare_unavailable());

        state.version = OptionallySet::set(Some("120".to_string()));
        assert!(!state.is_bare_unavailable());
        assert!(!BrowserState::available("120", None).is_bare_unavailable());
        assert!(!BrowserState::default().is_bare_unavailable());
    }

    #[test]
    fn test_with_browser_materializes_record() {
        let feature = Feature::new("grid", "Grid")
            .with_browser(BrowserKey::Safari, BrowserState::unavailable());
        let impls = feature.browser_impls.value().unwrap();

        assert!(impls.slot(BrowserKey::Safari).is_set());
        assert!(impls.slot(BrowserKey::Chrome).is_unset());
    }

    #[test]
    fn test_sorted_urls() {
        let docs = Docs::from_urls(["https://mdn/b", "https://mdn/a"]);
        assert_eq!(docs.sorted_urls(), vec!["https://mdn/a", "https://mdn/b"]);
        assert!(Docs::default().sorted_urls().is_empty());
    }
}
