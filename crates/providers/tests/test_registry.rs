use std::sync::Arc;
use toolgate_infra::infra::memory::MemoryCredentials;
use toolgate_providers::{ProviderCatalog, ProviderRegistry};

fn registry() -> (Arc<MemoryCredentials>, ProviderRegistry) {
    let credentials = Arc::new(MemoryCredentials::new());
    let registry = ProviderRegistry::new(Arc::new(ProviderCatalog::builtin()), credentials.clone());
    (credentials, registry)
}

#[tokio::test]
async fn test_connection_follows_credentials() {
    let (credentials, registry) = registry();
    assert!(registry.connected_providers("u1").await.unwrap().is_empty());

    credentials.add("u1", "xero");
    credentials.add("u1", "gmail");
    assert_eq!(
        registry.connected_providers("u1").await.unwrap(),
        vec!["xero".to_string(), "gmail".to_string()]
    );
    assert!(registry.connected_providers("u2").await.unwrap().is_empty());

    credentials.remove("u1", "gmail");
    assert!(!registry.is_provider_connected("u1", "gmail").await.unwrap());
}

#[tokio::test]
async fn test_unimplemented_provider_never_connected() {
    let (credentials, registry) = registry();
    credentials.add("u1", "quickbooks");

    assert!(!registry.is_provider_connected("u1", "quickbooks").await.unwrap());
    assert!(!registry
        .connected_providers("u1")
        .await
        .unwrap()
        .contains(&"quickbooks".to_string()));
}

#[tokio::test]
async fn test_system_always_connected() {
    let (_, registry) = registry();
    assert!(registry.is_provider_connected("nobody", "system").await.unwrap());
    assert!(!registry.is_provider_connected("nobody", "dropbox").await.unwrap());
}

#[tokio::test]
async fn test_disconnected_lists_implemented_only() {
    let (credentials, registry) = registry();
    credentials.add("u1", "xero");

    let ids: Vec<String> = registry
        .disconnected_providers("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id.clone())
        .collect();
    assert!(!ids.contains(&"xero".to_string()));
    assert!(ids.contains(&"myob".to_string()));
    assert!(!ids.contains(&"outlook".to_string()));
}
