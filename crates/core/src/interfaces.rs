//! Contracts for the external settings and credential stores.

use crate::error::StoreError;
use crate::types::{ConnectorPermission, SettingsPatch, Tier, UserSettings};
use async_trait::async_trait;

/// Durable per-user settings and per-connector grants.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read the settings row without creating it.
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>, StoreError>;

    /// Create the row with defaults if missing, then apply `patch`.
    async fn upsert_user_settings(
        &self,
        user_id: &str,
        patch: SettingsPatch,
    ) -> Result<UserSettings, StoreError>;

    /// Read the grant row without creating it.
    async fn get_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
    ) -> Result<Option<ConnectorPermission>, StoreError>;

    async fn upsert_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
        tier: Tier,
    ) -> Result<ConnectorPermission, StoreError>;

    async fn list_connector_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectorPermission>, StoreError>;
}

/// Existence check over stored provider credentials. Token freshness is the
/// connector client's concern, not this one.
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    async fn has_credential(&self, user_id: &str, connector_key: &str) -> Result<bool, StoreError>;
}
