//! Which tools a user may currently attempt.

use crate::evaluator::{unmapped_tier, EffectiveTier, PermissionEvaluator};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use toolgate_core::{StoreError, Tier};
use tracing::debug;

impl PermissionEvaluator {
    /// Filter `candidates` down to the tools `user_id` may attempt now.
    ///
    /// The output keeps input order and is always a subset of the input. Any
    /// name excluded here is also denied by
    /// [`check_tool_permission`](Self::check_tool_permission).
    pub async fn visible_tools<S>(
        &self,
        user_id: &str,
        candidates: &[S],
    ) -> Result<Vec<String>, StoreError>
    where
        S: AsRef<str> + Sync,
    {
        self.visible_tools_at(user_id, candidates, Utc::now()).await
    }

    pub async fn visible_tools_at<S>(
        &self,
        user_id: &str,
        candidates: &[S],
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError>
    where
        S: AsRef<str> + Sync,
    {
        let settings = self.store.get_user_settings(user_id).await?;
        let vacation = settings.as_ref().and_then(|s| s.vacation_until(now)).is_some();

        // Lives for this call only; grants may change between turns.
        let mut tier_cache: HashMap<String, EffectiveTier> = HashMap::new();
        let mut visible = Vec::with_capacity(candidates.len());

        for name in candidates {
            let name = name.as_ref();
            let Some(required) = self.tiers.get(name) else {
                if !self.tiers.is_unqualified_alias(name) {
                    visible.push(name.to_string());
                }
                continue;
            };

            if vacation && required.tier > Tier::ReadOnly {
                continue;
            }

            let effective = match self.connectors.connector_for(&required.provider) {
                Some(connector) => match tier_cache.get(connector) {
                    Some(cached) => *cached,
                    None => {
                        let tier = self
                            .effective_tier_with(user_id, connector, settings.as_ref())
                            .await?;
                        tier_cache.insert(connector.to_string(), tier);
                        tier
                    }
                },
                None => unmapped_tier(settings.as_ref(), name, &required.provider),
            };

            if effective.tier.permits(required.tier) {
                visible.push(name.to_string());
            }
        }

        debug!(
            user_id,
            candidates = candidates.len(),
            visible = visible.len(),
            vacation,
            "Computed visible tools"
        );
        Ok(visible)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use crate::connectors::ConnectorMap;
    use crate::evaluator::PermissionEvaluator;
    use crate::tiers::TierMap;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use toolgate_core::{SettingsPatch, SettingsStore, Tier, ToolDefinition};
    use toolgate_infra::infra::memory::MemorySettingsStore;
    use toolgate_providers::ProviderCatalog;

    fn scenario_tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new("xero", "invoices", "get_invoices", "", Some(Tier::ReadOnly)),
            ToolDefinition::new("xero", "invoices", "approve_invoice", "", Some(Tier::Update)),
            ToolDefinition::new(
                "google_sheets",
                "sheets",
                "write_sheet_range",
                "",
                Some(Tier::Create),
            ),
            ToolDefinition::system("guides", "get_pip_guide", "", None),
        ]
    }

    fn evaluator(store: Arc<MemorySettingsStore>) -> PermissionEvaluator {
        let tools = scenario_tools();
        PermissionEvaluator::new(
            store,
            Arc::new(ConnectorMap::from_catalog(&ProviderCatalog::builtin())),
            Arc::new(TierMap::from_tools(tools.iter())),
        )
    }

    fn names() -> Vec<String> {
        scenario_tools().into_iter().map(|t| t.qualified_name).collect()
    }

    #[tokio::test]
    async fn test_scenario_a_visible_set() {
        let store = Arc::new(MemorySettingsStore::new());
        store.upsert_connector_permission("u1", "google_sheets", Tier::Create).await.unwrap();
        store.upsert_connector_permission("u1", "xero", Tier::ReadOnly).await.unwrap();
        let eval = evaluator(store);

        let visible = eval.visible_tools("u1", &names()).await.unwrap();
        assert_eq!(
            visible,
            vec!["xero:get_invoices", "google_sheets:write_sheet_range", "get_pip_guide"]
        );

        let denied = eval.check_tool_permission("u1", "xero:approve_invoice").await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.required_level, Some(Tier::Update));
        assert_eq!(denied.current_level, Some(Tier::ReadOnly));
    }

    #[tokio::test]
    async fn test_vacation_hides_write_tools() {
        let store = Arc::new(MemorySettingsStore::new());
        let now = Utc::now();
        store.upsert_connector_permission("u1", "xero", Tier::Destructive).await.unwrap();
        store.upsert_connector_permission("u1", "google_sheets", Tier::Destructive).await.unwrap();
        store
            .upsert_user_settings(
                "u1",
                SettingsPatch {
                    vacation_mode_until: Some(Some(now + Duration::days(2))),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let eval = evaluator(store);

        let visible = eval.visible_tools_at("u1", &names(), now).await.unwrap();
        assert_eq!(visible, vec!["xero:get_invoices", "get_pip_guide"]);
    }

    #[tokio::test]
    async fn test_unknown_names_pass_through() {
        let store = Arc::new(MemorySettingsStore::new());
        let eval = evaluator(store);
        let visible = eval
            .visible_tools("u1", &["list_tools", "xero:approve_invoice"])
            .await
            .unwrap();
        assert_eq!(visible, vec!["list_tools"]);
    }

    #[tokio::test]
    async fn test_bare_short_names_of_gated_tools_are_hidden() {
        let store = Arc::new(MemorySettingsStore::new());
        store
            .upsert_connector_permission("u1", "xero", Tier::Destructive)
            .await
            .unwrap();
        let eval = evaluator(store);

        let visible = eval
            .visible_tools("u1", &["approve_invoice", "get_invoices", "get_pip_guide"])
            .await
            .unwrap();
        assert_eq!(visible, vec!["get_pip_guide"]);

        let denied = eval.check_tool_permission("u1", "approve_invoice").await.unwrap();
        assert!(!denied.allowed);
    }

    #[tokio::test]
    async fn test_unmapped_provider_follows_global_tier() {
        let store = Arc::new(MemorySettingsStore::new());
        let tools = vec![ToolDefinition::new(
            "dropbox",
            "files",
            "delete_file",
            "",
            Some(Tier::Destructive),
        )];
        let eval = PermissionEvaluator::new(
            store.clone(),
            Arc::new(ConnectorMap::from_catalog(&ProviderCatalog::builtin())),
            Arc::new(TierMap::from_tools(tools.iter())),
        );

        let visible = eval.visible_tools("u1", &["dropbox:delete_file"]).await.unwrap();
        assert!(visible.is_empty());

        store
            .upsert_user_settings(
                "u1",
                SettingsPatch {
                    permission_level: Some(Tier::Destructive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let visible = eval.visible_tools("u1", &["dropbox:delete_file"]).await.unwrap();
        assert_eq!(visible, vec!["dropbox:delete_file"]);
    }

    #[tokio::test]
    async fn test_legacy_global_tier_applies_without_rows() {
        let store = Arc::new(MemorySettingsStore::new());
        store
            .upsert_user_settings(
                "u1",
                SettingsPatch {
                    permission_level: Some(Tier::Update),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let eval = evaluator(store);
        let visible = eval.visible_tools("u1", &names()).await.unwrap();
        assert_eq!(visible.len(), 4);
    }

    #[tokio::test]
    async fn test_cache_does_not_outlive_call() {
        let store = Arc::new(MemorySettingsStore::new());
        store.upsert_connector_permission("u1", "xero", Tier::ReadOnly).await.unwrap();
        let eval = evaluator(store.clone());

        let before = eval.visible_tools("u1", &names()).await.unwrap();
        assert!(!before.contains(&"xero:approve_invoice".to_string()));

        store.upsert_connector_permission("u1", "xero", Tier::Update).await.unwrap();
        let after = eval.visible_tools("u1", &names()).await.unwrap();
        assert!(after.contains(&"xero:approve_invoice".to_string()));
    }

    #[tokio::test]
    async fn test_connector_rows_read_once_per_call() {
        let store = Arc::new(MemorySettingsStore::new());
        store.upsert_connector_permission("u1", "xero", Tier::Update).await.unwrap();
        let eval = evaluator(store.clone());

        let reads_before = store.connector_reads();
        eval.visible_tools("u1", &names()).await.unwrap();
        // xero and google_sheets, once each
        assert_eq!(store.connector_reads() - reads_before, 2);
    }
}
