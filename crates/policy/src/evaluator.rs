//! Tiered permission evaluation with the legacy global fallback and the
//! vacation-mode override.

use crate::connectors::ConnectorMap;
use crate::metrics;
use crate::tiers::TierMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use toolgate_core::{AccessError, SettingsStore, StoreError, Tier, UserSettings};
use tracing::{debug, warn};

/// Which layer of the fallback chain produced a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierSource {
    /// A per-connector grant row exists.
    Connector,
    /// No grant row; the legacy global `permission_level` answered.
    LegacyGlobal,
    /// Neither row exists.
    Default,
    /// The tool's provider has no connector mapping; the global tier was used.
    Unmapped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveTier {
    pub tier: Tier,
    pub source: TierSource,
}

/// Wire payload of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResult {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_level: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_level: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_vacation_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_source: Option<TierSource>,
}

impl PermissionResult {
    /// Result for tools without a required tier.
    pub fn unrestricted() -> Self {
        Self {
            allowed: true,
            reason: None,
            required_level: None,
            current_level: None,
            connector: None,
            is_vacation_mode: false,
            tier_source: None,
        }
    }

    /// Denial for a bare short name that only names a provider tool once
    /// resolved.
    pub fn unresolved(tool_name: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(format!(
                "Tool '{}' must be resolved to a qualified name before it can be checked.",
                tool_name
            )),
            ..Self::unrestricted()
        }
    }

    pub fn into_result(self) -> Result<Self, AccessError> {
        if self.allowed {
            return Ok(self);
        }
        let reason = self.reason.unwrap_or_else(|| "Permission denied".to_string());
        if self.is_vacation_mode {
            Err(AccessError::VacationModeActive(reason))
        } else {
            Err(AccessError::PermissionDenied(reason))
        }
    }
}

/// Label used in denial reasons when no connector answers for a tool.
const GLOBAL_LABEL: &str = "Global";

/// Read the effective tier for `(user_id, connector)`: the connector grant if
/// a row exists, else the legacy global tier, else read-only.
pub async fn effective_tier(
    store: &dyn SettingsStore,
    user_id: &str,
    connector: &str,
) -> Result<EffectiveTier, StoreError> {
    if let Some(row) = store.get_connector_permission(user_id, connector).await? {
        return Ok(EffectiveTier {
            tier: row.tier,
            source: TierSource::Connector,
        });
    }
    let settings = store.get_user_settings(user_id).await?;
    Ok(global_fallback(settings.as_ref()))
}

/// Tier for a tool whose provider has no connector mapping: the global
/// level, reported as [`TierSource::Unmapped`].
pub(crate) fn unmapped_tier(
    settings: Option<&UserSettings>,
    tool_name: &str,
    provider: &str,
) -> EffectiveTier {
    metrics::record_unmapped_connector();
    warn!(
        tool = tool_name,
        provider,
        "No connector mapping for provider; evaluating against global tier"
    );
    EffectiveTier {
        tier: settings.map(|s| s.permission_level).unwrap_or_default(),
        source: TierSource::Unmapped,
    }
}

pub(crate) fn global_fallback(settings: Option<&UserSettings>) -> EffectiveTier {
    match settings {
        Some(settings) => EffectiveTier {
            tier: settings.permission_level,
            source: TierSource::LegacyGlobal,
        },
        None => EffectiveTier {
            tier: Tier::ReadOnly,
            source: TierSource::Default,
        },
    }
}

/// Decides allow/deny for a tool and a user.
#[derive(Clone)]
pub struct PermissionEvaluator {
    pub(crate) store: Arc<dyn SettingsStore>,
    pub(crate) connectors: Arc<ConnectorMap>,
    pub(crate) tiers: Arc<TierMap>,
}

impl PermissionEvaluator {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        connectors: Arc<ConnectorMap>,
        tiers: Arc<TierMap>,
    ) -> Self {
        Self {
            store,
            connectors,
            tiers,
        }
    }

    /// Same store and connectors over a new tier table.
    pub fn with_tiers(&self, tiers: Arc<TierMap>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            connectors: Arc::clone(&self.connectors),
            tiers,
        }
    }

    pub fn tiers(&self) -> &TierMap {
        &self.tiers
    }

    pub fn connectors(&self) -> &ConnectorMap {
        &self.connectors
    }

    pub async fn effective_tier(
        &self,
        user_id: &str,
        connector: &str,
    ) -> Result<EffectiveTier, StoreError> {
        effective_tier(self.store.as_ref(), user_id, connector).await
    }

    /// Like [`effective_tier`](Self::effective_tier) but reuses a settings
    /// row already read by the caller.
    pub(crate) async fn effective_tier_with(
        &self,
        user_id: &str,
        connector: &str,
        settings: Option<&UserSettings>,
    ) -> Result<EffectiveTier, StoreError> {
        match self.store.get_connector_permission(user_id, connector).await? {
            Some(row) => Ok(EffectiveTier {
                tier: row.tier,
                source: TierSource::Connector,
            }),
            None => Ok(global_fallback(settings)),
        }
    }

    pub async fn check_tool_permission(
        &self,
        user_id: &str,
        tool_name: &str,
    ) -> Result<PermissionResult, StoreError> {
        self.check_tool_permission_at(user_id, tool_name, Utc::now()).await
    }

    /// Evaluate against an explicit clock reading.
    pub async fn check_tool_permission_at(
        &self,
        user_id: &str,
        tool_name: &str,
        now: DateTime<Utc>,
    ) -> Result<PermissionResult, StoreError> {
        let Some(required) = self.tiers.get(tool_name) else {
            if self.tiers.is_unqualified_alias(tool_name) {
                metrics::record_denied();
                warn!(user_id, tool = tool_name, "Denied unresolved shorthand tool name");
                return Ok(PermissionResult::unresolved(tool_name));
            }
            return Ok(PermissionResult::unrestricted());
        };
        let required_tier = required.tier;
        let connector = self.connectors.connector_for(&required.provider);
        let settings = self.store.get_user_settings(user_id).await?;

        if required_tier > Tier::ReadOnly {
            if let Some(until) = settings.as_ref().and_then(|s| s.vacation_until(now)) {
                metrics::record_vacation_denied();
                warn!(user_id, tool = tool_name, %until, "Denied by vacation mode");
                return Ok(PermissionResult {
                    allowed: false,
                    reason: Some(format!(
                        "Vacation mode is active until {}. \
                         Actions that change data are paused until then.",
                        until.format("%Y-%m-%d %H:%M UTC")
                    )),
                    required_level: Some(required_tier),
                    current_level: Some(Tier::ReadOnly),
                    connector: connector.map(str::to_string),
                    is_vacation_mode: true,
                    tier_source: None,
                });
            }
        }

        let effective = match connector {
            Some(connector) => {
                self.effective_tier_with(user_id, connector, settings.as_ref())
                    .await?
            }
            None => unmapped_tier(settings.as_ref(), tool_name, &required.provider),
        };

        if !effective.tier.permits(required_tier) {
            let label = connector
                .map(|c| self.connectors.label(c))
                .unwrap_or(GLOBAL_LABEL);
            metrics::record_denied();
            warn!(
                user_id,
                tool = tool_name,
                required = required_tier.level(),
                current = effective.tier.level(),
                "Permission denied"
            );
            return Ok(PermissionResult {
                allowed: false,
                reason: Some(format!(
                    "{} permission is {}, but this action requires {}.",
                    label, effective.tier, required_tier
                )),
                required_level: Some(required_tier),
                current_level: Some(effective.tier),
                connector: connector.map(str::to_string),
                is_vacation_mode: false,
                tier_source: Some(effective.source),
            });
        }

        metrics::record_allowed();
        debug!(user_id, tool = tool_name, source = ?effective.source, "Permission allowed");
        Ok(PermissionResult {
            allowed: true,
            reason: None,
            required_level: Some(required_tier),
            current_level: Some(effective.tier),
            connector: connector.map(str::to_string),
            is_vacation_mode: false,
            tier_source: Some(effective.source),
        })
    }

    /// Whether the agent must ask the user before running `tool_name`: the
    /// tool is tier 2 or above and the user has confirmations enabled.
    pub async fn needs_confirmation(
        &self,
        user_id: &str,
        tool_name: &str,
    ) -> Result<bool, StoreError> {
        if !self.tiers.requires_confirmation(tool_name) {
            return Ok(false);
        }
        let settings = self.store.get_user_settings(user_id).await?;
        Ok(settings
            .map(|s| s.require_confirmation)
            .unwrap_or_else(|| UserSettings::defaults(user_id).require_confirmation))
    }
}
