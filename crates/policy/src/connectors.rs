//! Provider to connector mapping.

use std::collections::{BTreeSet, HashMap};
use toolgate_providers::ProviderCatalog;

/// Maps a tool's provider to the connector whose grant governs it.
///
/// Built from the provider catalog (every non-system provider maps to its
/// connector key) plus optional overrides. A provider with no entry is an
/// unmapped connector: evaluation falls back to the global tier.
#[derive(Debug, Clone, Default)]
pub struct ConnectorMap {
    by_provider: HashMap<String, String>,
    labels: HashMap<String, String>,
}

impl ConnectorMap {
    pub fn from_catalog(catalog: &ProviderCatalog) -> Self {
        let mut map = Self::default();
        for provider in catalog.providers() {
            map.by_provider
                .insert(provider.id.clone(), provider.connector_key.clone());
            map.labels
                .entry(provider.connector_key.clone())
                .or_insert_with(|| provider.display_name.clone());
        }
        map
    }

    pub fn with_connector(
        mut self,
        provider: impl Into<String>,
        connector: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        let connector = connector.into();
        self.labels.insert(connector.clone(), label.into());
        self.by_provider.insert(provider.into(), connector);
        self
    }

    pub fn without_provider(mut self, provider: &str) -> Self {
        self.by_provider.remove(provider);
        self
    }

    pub fn connector_for(&self, provider: &str) -> Option<&str> {
        self.by_provider.get(provider).map(String::as_str)
    }

    pub fn is_known_connector(&self, connector: &str) -> bool {
        self.by_provider.values().any(|c| c == connector)
    }

    /// Human-readable connector name, falling back to the key.
    pub fn label<'a>(&'a self, connector: &'a str) -> &'a str {
        self.labels.get(connector).map(String::as_str).unwrap_or(connector)
    }

    /// Distinct connector keys, sorted.
    pub fn connectors(&self) -> Vec<&str> {
        self.by_provider
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_from_catalog() {
        let map = ConnectorMap::from_catalog(&ProviderCatalog::builtin());
        assert_eq!(map.connector_for("xero"), Some("xero"));
        assert_eq!(map.connector_for("google_sheets"), Some("google_sheets"));
        assert_eq!(map.connector_for("system"), None);
        assert_eq!(map.label("google_sheets"), "Google Sheets");
    }

    #[test]
    fn test_overrides() {
        let map = ConnectorMap::from_catalog(&ProviderCatalog::builtin())
            .with_connector("gmail", "google", "Google Workspace")
            .with_connector("google_sheets", "google", "Google Workspace")
            .without_provider("myob");

        assert_eq!(map.connector_for("gmail"), Some("google"));
        assert_eq!(map.connector_for("myob"), None);
        assert_eq!(map.label("google"), "Google Workspace");
        assert!(map.is_known_connector("google"));
        assert!(!map.is_known_connector("myob"));
        assert_eq!(map.label("unknown"), "unknown");
    }

    #[test]
    fn test_connectors_distinct_sorted() {
        let map = ConnectorMap::default()
            .with_connector("b", "beta", "Beta")
            .with_connector("a", "alpha", "Alpha")
            .with_connector("c", "alpha", "Alpha");
        assert_eq!(map.connectors(), vec!["alpha", "beta"]);
    }
}
