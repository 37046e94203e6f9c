//! In-process stores for tests and single-shot tooling.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use toolgate_core::{
    ConnectorPermission, CredentialLookup, SettingsPatch, SettingsStore, StoreError, Tier,
    UserSettings,
};

#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<HashMap<String, UserSettings>>,
    grants: Mutex<HashMap<(String, String), ConnectorPermission>>,
    unavailable: AtomicBool,
    connector_reads: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `get_connector_permission` calls served so far.
    pub fn connector_reads(&self) -> usize {
        self.connector_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("settings store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_user_settings(&self, user_id: &str) -> Result<Option<UserSettings>, StoreError> {
        self.check()?;
        Ok(self.settings.lock().get(user_id).cloned())
    }

    async fn upsert_user_settings(
        &self,
        user_id: &str,
        patch: SettingsPatch,
    ) -> Result<UserSettings, StoreError> {
        self.check()?;
        let mut settings = self.settings.lock();
        let row = settings
            .entry(user_id.to_string())
            .or_insert_with(|| UserSettings::defaults(user_id));
        row.apply(&patch);
        Ok(row.clone())
    }

    async fn get_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
    ) -> Result<Option<ConnectorPermission>, StoreError> {
        self.check()?;
        self.connector_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .grants
            .lock()
            .get(&(user_id.to_string(), connector.to_string()))
            .cloned())
    }

    async fn upsert_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
        tier: Tier,
    ) -> Result<ConnectorPermission, StoreError> {
        self.check()?;
        let row = ConnectorPermission::new(user_id, connector, tier);
        self.grants
            .lock()
            .insert((user_id.to_string(), connector.to_string()), row.clone());
        Ok(row)
    }

    async fn list_connector_permissions(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectorPermission>, StoreError> {
        self.check()?;
        let mut rows: Vec<ConnectorPermission> = self
            .grants
            .lock()
            .values()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.connector.cmp(&b.connector));
        Ok(rows)
    }
}

/// Credential presence keyed by `(user, connector_key)`.
#[derive(Default)]
pub struct MemoryCredentials {
    present: Mutex<HashSet<(String, String)>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, user_id: &str, connector_key: &str) {
        self.present
            .lock()
            .insert((user_id.to_string(), connector_key.to_string()));
    }

    pub fn remove(&self, user_id: &str, connector_key: &str) {
        self.present
            .lock()
            .remove(&(user_id.to_string(), connector_key.to_string()));
    }
}

#[async_trait]
impl CredentialLookup for MemoryCredentials {
    async fn has_credential(&self, user_id: &str, connector_key: &str) -> Result<bool, StoreError> {
        Ok(self
            .present
            .lock()
            .contains(&(user_id.to_string(), connector_key.to_string())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_creates_defaults_then_patches() {
        let store = MemorySettingsStore::new();
        let row = store
            .upsert_user_settings(
                "u1",
                SettingsPatch {
                    permission_level: Some(Tier::Create),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(row.permission_level, Tier::Create);
        assert!(row.require_confirmation);

        let row = store
            .upsert_user_settings(
                "u1",
                SettingsPatch {
                    require_confirmation: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(row.permission_level, Tier::Create);
        assert!(!row.require_confirmation);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemorySettingsStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.get_user_settings("u1").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.list_connector_permissions("u1").await.is_err());

        store.set_unavailable(false);
        assert!(store.get_user_settings("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credentials_add_remove() {
        let creds = MemoryCredentials::new();
        creds.add("u1", "xero");
        assert!(creds.has_credential("u1", "xero").await.unwrap());
        assert!(!creds.has_credential("u2", "xero").await.unwrap());

        creds.remove("u1", "xero");
        assert!(!creds.has_credential("u1", "xero").await.unwrap());
    }
}
