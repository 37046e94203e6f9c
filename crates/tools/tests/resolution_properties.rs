#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use toolgate_core::{Tier, ToolDefinition};
use toolgate_providers::ProviderCatalog;
use toolgate_tools::{resolve, Resolution, ToolIndex};

const PROVIDERS: [&str; 4] = ["xero", "myob", "gmail", "google_sheets"];
const SHORT_NAMES: [&str; 4] = ["get_invoices", "send_email", "list_contacts", "approve_invoice"];

fn catalog_strategy() -> impl Strategy<Value = BTreeSet<(usize, usize)>> {
    prop::collection::btree_set((0..PROVIDERS.len(), 0..SHORT_NAMES.len()), 1..12)
}

fn build(pairs: &BTreeSet<(usize, usize)>) -> ToolIndex {
    let tools = pairs
        .iter()
        .map(|&(p, s)| {
            ToolDefinition::new(
                PROVIDERS[p],
                "general",
                SHORT_NAMES[s],
                "generated",
                Some(Tier::ReadOnly),
            )
        })
        .collect();
    ToolIndex::build(tools).unwrap()
}

fn connected_from(mask: &[bool]) -> HashSet<String> {
    PROVIDERS
        .iter()
        .zip(mask)
        .filter(|(_, on)| **on)
        .map(|(p, _)| p.to_string())
        .collect()
}

proptest! {
    #[test]
    fn qualified_names_resolve_to_themselves(pairs in catalog_strategy()) {
        let index = build(&pairs);
        let catalog = ProviderCatalog::builtin();
        let all: HashSet<String> = PROVIDERS.iter().map(|p| p.to_string()).collect();

        for name in index.names() {
            let resolution = resolve(&name, &index, &all, &catalog);
            prop_assert_eq!(resolution.tool().map(|t| t.qualified_name.clone()), Some(name));
        }
    }

    #[test]
    fn shorthand_never_guesses(
        pairs in catalog_strategy(),
        mask in prop::collection::vec(any::<bool>(), PROVIDERS.len()),
        short in 0..SHORT_NAMES.len(),
    ) {
        let index = build(&pairs);
        let catalog = ProviderCatalog::builtin();
        let connected = connected_from(&mask);
        let short_name = SHORT_NAMES[short];

        let owners: Vec<&str> = pairs
            .iter()
            .filter(|(_, s)| *s == short)
            .map(|(p, _)| PROVIDERS[*p])
            .collect();
        let connected_owners: Vec<&str> = owners
            .iter()
            .copied()
            .filter(|p| connected.contains(*p))
            .collect();

        match resolve(short_name, &index, &connected, &catalog) {
            Resolution::Resolved(tool) => {
                prop_assert_eq!(connected_owners.len(), 1);
                prop_assert_eq!(tool.provider.as_str(), connected_owners[0]);
            }
            Resolution::Ambiguous { candidates, .. } => {
                prop_assert!(connected_owners.len() >= 2);
                let got: BTreeSet<&str> = candidates.iter().map(|t| t.provider.as_str()).collect();
                let want: BTreeSet<&str> = connected_owners.iter().copied().collect();
                prop_assert_eq!(got, want);
            }
            Resolution::NotConnected { providers, .. } => {
                prop_assert!(connected_owners.is_empty());
                let got: BTreeSet<&str> = providers.iter().map(|p| p.id.as_str()).collect();
                let want: BTreeSet<&str> = owners.iter().copied().collect();
                prop_assert_eq!(got, want);
            }
            Resolution::NotFound { .. } => {
                prop_assert!(owners.is_empty());
            }
        }
    }
}

#[test]
fn scenario_c_two_connected_providers_are_ambiguous() {
    let index = ToolIndex::build(vec![
        ToolDefinition::new("xero", "invoices", "get_invoices", "Xero", Some(Tier::ReadOnly)),
        ToolDefinition::new("myob", "invoices", "get_invoices", "MYOB", Some(Tier::ReadOnly)),
    ])
    .unwrap();
    let connected: HashSet<String> = ["xero", "myob"].iter().map(|s| s.to_string()).collect();

    let payload = resolve("get_invoices", &index, &connected, &ProviderCatalog::builtin())
        .failure_payload()
        .unwrap();
    assert!(!payload.resolved);
    assert_eq!(payload.candidates.unwrap().len(), 2);
}

#[test]
fn scenario_d_disconnected_candidate_is_excluded() {
    let index = ToolIndex::build(vec![
        ToolDefinition::new("xero", "invoices", "get_invoices", "Xero", Some(Tier::ReadOnly)),
        ToolDefinition::new("myob", "invoices", "get_invoices", "MYOB", Some(Tier::ReadOnly)),
    ])
    .unwrap();
    let connected: HashSet<String> = ["xero".to_string()].into_iter().collect();

    let resolution = resolve("get_invoices", &index, &connected, &ProviderCatalog::builtin());
    assert_eq!(resolution.tool().unwrap().qualified_name, "xero:get_invoices");
}
