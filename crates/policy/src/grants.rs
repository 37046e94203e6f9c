//! Grant administration: explicit get-or-create of default rows and the
//! user-initiated changes to tiers, confirmation and vacation mode.

use crate::connectors::ConnectorMap;
use crate::evaluator::{global_fallback, EffectiveTier, TierSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use toolgate_core::{
    ConnectorPermission, SettingsPatch, SettingsStore, StoreError, Tier, UserSettings,
};
use tracing::info;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GrantError {
    #[error("Unknown connector: {0}")]
    UnknownConnector(String),

    #[error("Vacation end {0} is not in the future")]
    VacationInPast(DateTime<Utc>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VacationStatus {
    pub active: bool,
    pub until: Option<DateTime<Utc>>,
}

/// One line of a user's permission overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectorGrant {
    pub connector: String,
    pub label: String,
    pub tier: Tier,
    pub tier_label: &'static str,
    pub source: TierSource,
}

pub struct GrantManager {
    store: Arc<dyn SettingsStore>,
    connectors: Arc<ConnectorMap>,
}

impl GrantManager {
    pub fn new(store: Arc<dyn SettingsStore>, connectors: Arc<ConnectorMap>) -> Self {
        Self { store, connectors }
    }

    /// Return the settings row, creating it with defaults if absent.
    /// Idempotent: concurrent callers converge on the same defaults.
    pub async fn get_or_create_settings(&self, user_id: &str) -> Result<UserSettings, StoreError> {
        if let Some(settings) = self.store.get_user_settings(user_id).await? {
            return Ok(settings);
        }
        info!(user_id, "Creating default user settings");
        self.store
            .upsert_user_settings(user_id, SettingsPatch::default())
            .await
    }

    /// Return the grant row, creating it at read-only if absent.
    ///
    /// Once created the row shadows the legacy global tier for this
    /// connector, so evaluation never calls this.
    pub async fn get_or_create_connector_permission(
        &self,
        user_id: &str,
        connector: &str,
    ) -> Result<ConnectorPermission, GrantError> {
        self.ensure_known(connector)?;
        if let Some(row) = self.store.get_connector_permission(user_id, connector).await? {
            return Ok(row);
        }
        info!(user_id, connector, "Creating default connector permission");
        Ok(self
            .store
            .upsert_connector_permission(user_id, connector, Tier::ReadOnly)
            .await?)
    }

    pub async fn set_connector_tier(
        &self,
        user_id: &str,
        connector: &str,
        tier: Tier,
    ) -> Result<ConnectorPermission, GrantError> {
        self.ensure_known(connector)?;
        let row = self
            .store
            .upsert_connector_permission(user_id, connector, tier)
            .await?;
        info!(user_id, connector, tier = tier.level(), "Updated connector permission");
        Ok(row)
    }

    pub async fn set_global_tier(
        &self,
        user_id: &str,
        tier: Tier,
    ) -> Result<UserSettings, StoreError> {
        let settings = self
            .store
            .upsert_user_settings(
                user_id,
                SettingsPatch {
                    permission_level: Some(tier),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id, tier = tier.level(), "Updated global permission level");
        Ok(settings)
    }

    pub async fn set_require_confirmation(
        &self,
        user_id: &str,
        require: bool,
    ) -> Result<UserSettings, StoreError> {
        self.store
            .upsert_user_settings(
                user_id,
                SettingsPatch {
                    require_confirmation: Some(require),
                    ..Default::default()
                },
            )
            .await
    }

    pub async fn enable_vacation_mode(
        &self,
        user_id: &str,
        until: DateTime<Utc>,
    ) -> Result<UserSettings, GrantError> {
        if until <= Utc::now() {
            return Err(GrantError::VacationInPast(until));
        }
        let settings = self
            .store
            .upsert_user_settings(
                user_id,
                SettingsPatch {
                    vacation_mode_until: Some(Some(until)),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id, %until, "Vacation mode enabled");
        Ok(settings)
    }

    pub async fn disable_vacation_mode(&self, user_id: &str) -> Result<UserSettings, StoreError> {
        let settings = self
            .store
            .upsert_user_settings(
                user_id,
                SettingsPatch {
                    vacation_mode_until: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        info!(user_id, "Vacation mode disabled");
        Ok(settings)
    }

    pub async fn vacation_status(&self, user_id: &str) -> Result<VacationStatus, StoreError> {
        let until = self
            .store
            .get_user_settings(user_id)
            .await?
            .and_then(|s| s.vacation_until(Utc::now()));
        Ok(VacationStatus {
            active: until.is_some(),
            until,
        })
    }

    /// Effective tier and its source for every mapped connector.
    pub async fn connector_summary(
        &self,
        user_id: &str,
    ) -> Result<Vec<ConnectorGrant>, StoreError> {
        let settings = self.store.get_user_settings(user_id).await?;
        let rows: HashMap<String, Tier> = self
            .store
            .list_connector_permissions(user_id)
            .await?
            .into_iter()
            .map(|row| (row.connector, row.tier))
            .collect();

        Ok(self
            .connectors
            .connectors()
            .into_iter()
            .map(|connector| {
                let effective = match rows.get(connector) {
                    Some(&tier) => EffectiveTier {
                        tier,
                        source: TierSource::Connector,
                    },
                    None => global_fallback(settings.as_ref()),
                };
                ConnectorGrant {
                    connector: connector.to_string(),
                    label: self.connectors.label(connector).to_string(),
                    tier: effective.tier,
                    tier_label: effective.tier.label(),
                    source: effective.source,
                }
            })
            .collect())
    }

    fn ensure_known(&self, connector: &str) -> Result<(), GrantError> {
        if self.connectors.is_known_connector(connector) {
            Ok(())
        } else {
            Err(GrantError::UnknownConnector(connector.to_string()))
        }
    }
}
