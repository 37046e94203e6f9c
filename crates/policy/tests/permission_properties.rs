#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use toolgate_core::{SettingsPatch, SettingsStore, Tier, ToolDefinition};
use toolgate_infra::infra::memory::MemorySettingsStore;
use toolgate_policy::{ConnectorMap, PermissionEvaluator, TierMap};
use toolgate_providers::ProviderCatalog;

const PROVIDERS: [&str; 3] = ["xero", "gmail", "google_sheets"];

fn tier_strategy() -> impl Strategy<Value = Tier> {
    (0u8..=3).prop_map(|level| Tier::from_level(level).unwrap())
}

fn tools_strategy() -> impl Strategy<Value = Vec<ToolDefinition>> {
    prop::collection::vec((0usize..3, prop::option::of(tier_strategy())), 1..12).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (p, tier))| {
                ToolDefinition::new(PROVIDERS[p], "misc", format!("tool_{}", i), "", tier)
            })
            .collect()
    })
}

fn evaluator(store: Arc<MemorySettingsStore>, tools: &[ToolDefinition]) -> PermissionEvaluator {
    PermissionEvaluator::new(
        store,
        Arc::new(ConnectorMap::from_catalog(&ProviderCatalog::builtin())),
        Arc::new(TierMap::from_tools(tools.iter())),
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

proptest! {
    #[test]
    fn prop_visible_is_ordered_subset_and_consistent(
        tools in tools_strategy(),
        grants in prop::collection::vec(tier_strategy(), 3),
        global in prop::option::of(tier_strategy()),
        vacation in any::<bool>(),
    ) {
        runtime().block_on(async {
            let store = Arc::new(MemorySettingsStore::new());
            for (provider, tier) in PROVIDERS.iter().zip(&grants).take(2) {
                store.upsert_connector_permission("u1", provider, *tier).await.unwrap();
            }
            if global.is_some() || vacation {
                let until = vacation.then(|| Utc::now() + Duration::days(1));
                store.upsert_user_settings("u1", SettingsPatch {
                    permission_level: global,
                    vacation_mode_until: Some(until),
                    ..Default::default()
                }).await.unwrap();
            }
            let eval = evaluator(store, &tools);
            // Bare short names ride along; they must agree with the checker too.
            let names: Vec<String> = tools
                .iter()
                .map(|t| t.qualified_name.clone())
                .chain(tools.iter().map(|t| t.short_name.clone()))
                .collect();

            let visible = eval.visible_tools("u1", &names).await.unwrap();

            let mut cursor = names.iter();
            for name in &visible {
                assert!(cursor.any(|n| n == name), "{} out of order or not in input", name);
            }

            for name in &names {
                let allowed = eval.check_tool_permission("u1", name).await.unwrap().allowed;
                assert_eq!(visible.contains(name), allowed, "disagreement on {}", name);
            }
        });
    }

    #[test]
    fn prop_raising_a_grant_never_hides_tools(
        tools in tools_strategy(),
        provider in 0usize..3,
        low in tier_strategy(),
        high in tier_strategy(),
    ) {
        prop_assume!(low <= high);
        runtime().block_on(async {
            let names: Vec<String> = tools.iter().map(|t| t.qualified_name.clone()).collect();

            let store = Arc::new(MemorySettingsStore::new());
            store.upsert_connector_permission("u1", PROVIDERS[provider], low).await.unwrap();
            let before = evaluator(store.clone(), &tools)
                .visible_tools("u1", &names)
                .await
                .unwrap();

            store.upsert_connector_permission("u1", PROVIDERS[provider], high).await.unwrap();
            let after = evaluator(store, &tools).visible_tools("u1", &names).await.unwrap();

            for name in &before {
                assert!(after.contains(name), "{} hidden after raising grant", name);
            }
        });
    }

    #[test]
    fn prop_vacation_allows_only_read_tools(
        tools in tools_strategy(),
        tier in tier_strategy(),
    ) {
        runtime().block_on(async {
            let store = Arc::new(MemorySettingsStore::new());
            for provider in PROVIDERS {
                store.upsert_connector_permission("u1", provider, tier).await.unwrap();
            }
            store.upsert_user_settings("u1", SettingsPatch {
                vacation_mode_until: Some(Some(Utc::now() + Duration::hours(2))),
                ..Default::default()
            }).await.unwrap();
            let eval = evaluator(store, &tools);

            for tool in &tools {
                let result = eval.check_tool_permission("u1", &tool.qualified_name).await.unwrap();
                match tool.required_tier {
                    Some(required) if required > Tier::ReadOnly => {
                        assert!(!result.allowed);
                        assert!(result.is_vacation_mode);
                    }
                    _ => assert!(result.allowed),
                }
            }
        });
    }
}
