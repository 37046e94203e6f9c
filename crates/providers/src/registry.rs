//! Per-user connection probing over the provider catalog.

use crate::catalog::ProviderCatalog;
use std::collections::HashSet;
use std::sync::Arc;
use toolgate_core::{CredentialLookup, Provider, StoreError, SYSTEM_PROVIDER};
use tracing::debug;

/// Answers "which providers can this user use right now?".
///
/// A provider counts as connected when it is implemented and a credential
/// record exists for `(user, connector_key)`. Expiry is not checked.
#[derive(Clone)]
pub struct ProviderRegistry {
    catalog: Arc<ProviderCatalog>,
    credentials: Arc<dyn CredentialLookup>,
}

impl ProviderRegistry {
    pub fn new(catalog: Arc<ProviderCatalog>, credentials: Arc<dyn CredentialLookup>) -> Self {
        Self {
            catalog,
            credentials,
        }
    }

    pub fn catalog(&self) -> &Arc<ProviderCatalog> {
        &self.catalog
    }

    pub fn implemented_providers(&self) -> Vec<&Provider> {
        self.catalog.implemented().collect()
    }

    pub fn provider_info(&self, provider_id: &str) -> Option<&Provider> {
        self.catalog.get(provider_id)
    }

    /// Ids of implemented providers holding a credential for `user_id`, in
    /// catalog order. `system` is not listed; it is implicitly connected.
    pub async fn connected_providers(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
        let mut connected = Vec::new();
        for provider in self.catalog.implemented() {
            if self
                .credentials
                .has_credential(user_id, &provider.connector_key)
                .await?
            {
                connected.push(provider.id.clone());
            }
        }
        debug!(user_id, connected = ?connected, "Probed provider connections");
        Ok(connected)
    }

    /// Connected provider ids as a set, for name resolution.
    pub async fn connected_set(&self, user_id: &str) -> Result<HashSet<String>, StoreError> {
        Ok(self.connected_providers(user_id).await?.into_iter().collect())
    }

    /// Implemented providers the user has not connected yet.
    pub async fn disconnected_providers(
        &self,
        user_id: &str,
    ) -> Result<Vec<&Provider>, StoreError> {
        let connected = self.connected_set(user_id).await?;
        Ok(self
            .catalog
            .implemented()
            .filter(|p| !connected.contains(&p.id))
            .collect())
    }

    pub async fn is_provider_connected(
        &self,
        user_id: &str,
        provider_id: &str,
    ) -> Result<bool, StoreError> {
        if provider_id == SYSTEM_PROVIDER {
            return Ok(true);
        }

        let Some(provider) = self.catalog.get(provider_id) else {
            return Ok(false);
        };
        if !provider.implemented {
            return Ok(false);
        }

        self.credentials
            .has_credential(user_id, &provider.connector_key)
            .await
    }
}
