//! Immutable table of known providers.

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use toolgate_core::{Provider, ProviderKind, SYSTEM_PROVIDER};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate provider id: {0}")]
    DuplicateProvider(String),
    #[error("Provider id '{0}' is reserved")]
    ReservedId(String),
    #[error("Invalid provider id: '{0}'")]
    InvalidId(String),
    #[error("Provider '{0}' has an empty connector key")]
    EmptyConnectorKey(String),
}

/// Provider table, built once at startup and shared behind an `Arc`.
///
/// The synthetic `system` provider is not part of the table; it is answered
/// separately by [`ProviderCatalog::get`] and is always treated as connected.
#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    providers: Vec<Provider>,
    by_id: HashMap<String, usize>,
    system: Provider,
}

impl ProviderCatalog {
    pub fn new(providers: Vec<Provider>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(providers.len());

        for (i, provider) in providers.iter().enumerate() {
            if provider.id == SYSTEM_PROVIDER {
                return Err(CatalogError::ReservedId(provider.id.clone()));
            }
            if provider.id.is_empty()
                || !provider
                    .id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(CatalogError::InvalidId(provider.id.clone()));
            }
            if provider.connector_key.trim().is_empty() {
                return Err(CatalogError::EmptyConnectorKey(provider.id.clone()));
            }
            if by_id.insert(provider.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateProvider(provider.id.clone()));
            }
        }

        Ok(Self {
            providers,
            by_id,
            system: Self::system_provider(),
        })
    }

    /// The providers toolgate ships with.
    pub fn builtin() -> Self {
        let providers = vec![
            Provider::new("xero", ProviderKind::Accounting, "Xero", "xero", true),
            Provider::new("myob", ProviderKind::Accounting, "MYOB", "myob", true),
            Provider::new(
                "quickbooks",
                ProviderKind::Accounting,
                "QuickBooks",
                "quickbooks",
                false,
            ),
            Provider::new("gmail", ProviderKind::Email, "Gmail", "gmail", true),
            Provider::new("outlook", ProviderKind::Email, "Outlook", "outlook", false),
            Provider::new(
                "google_sheets",
                ProviderKind::Spreadsheet,
                "Google Sheets",
                "google_sheets",
                true,
            ),
            Provider::new("todoist", ProviderKind::Tasks, "Todoist", "todoist", false),
        ];

        let by_id = providers
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();

        Self {
            providers,
            by_id,
            system: Self::system_provider(),
        }
    }

    fn system_provider() -> Provider {
        Provider::new(SYSTEM_PROVIDER, ProviderKind::System, "Toolgate", SYSTEM_PROVIDER, true)
    }

    /// Look up a provider; `"system"` yields the synthetic provider.
    pub fn get(&self, id: &str) -> Option<&Provider> {
        if id == SYSTEM_PROVIDER {
            return Some(&self.system);
        }
        self.by_id.get(id).map(|&i| &self.providers[i])
    }

    /// Display name for a provider id, falling back to the id itself.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|p| p.display_name.as_str()).unwrap_or(id)
    }

    pub fn implemented(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter().filter(|p| p.implemented)
    }

    /// All table entries in declaration order, excluding `system`.
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Provider entry as written in a YAML provider file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub display_name: String,
    #[serde(default)]
    pub connector_key: Option<String>,
    #[serde(default = "default_implemented")]
    pub implemented: bool,
}

fn default_implemented() -> bool {
    true
}

impl From<ProviderSpec> for Provider {
    fn from(spec: ProviderSpec) -> Self {
        let connector_key = spec.connector_key.unwrap_or_else(|| spec.id.clone());
        Provider::new(spec.id, spec.kind, spec.display_name, connector_key, spec.implemented)
    }
}
