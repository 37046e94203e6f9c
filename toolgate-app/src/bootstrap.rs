//! Wires config into the concrete stores and the gatekeeper.

use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use toolgate_infra::infra::credential_vault::{parse_master_key, CredentialVault};
use toolgate_infra::infra::settings_store::SqliteSettingsStore;
use toolgate_policy::{Gatekeeper, GrantManager, PermissionEvaluator, TierMap};
use toolgate_providers::{ProviderCatalog, ProviderRegistry};
use toolgate_tools::ToolIndex;
use tracing::info;

pub struct Services {
    pub gatekeeper: Gatekeeper,
    pub grants: GrantManager,
    pub vault: Arc<CredentialVault>,
    pub catalog: Arc<ProviderCatalog>,
}

pub fn master_key_from_env(config: &Config) -> Result<[u8; 32]> {
    let encoded = std::env::var(&config.master_key_env)
        .with_context(|| format!("Environment variable {} is not set", config.master_key_env))?;
    parse_master_key(&encoded).context("Invalid vault master key")
}

pub fn build(config: &Config, master_key: &[u8; 32]) -> Result<Services> {
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = Arc::new(
        SqliteSettingsStore::open(&config.database)
            .with_context(|| format!("Failed to open {}", config.database.display()))?,
    );
    let vault = Arc::new(
        CredentialVault::new(&config.credentials_dir, master_key)
            .context("Failed to open credential vault")?,
    );

    let catalog = Arc::new(config.provider_catalog()?);
    let connectors = Arc::new(config.connector_map(&catalog)?);
    let index = Arc::new(ToolIndex::build(config.load_tools()?).context("Invalid tool catalog")?);

    let registry = ProviderRegistry::new(catalog.clone(), vault.clone());
    let evaluator = PermissionEvaluator::new(
        store.clone(),
        connectors.clone(),
        Arc::new(TierMap::default()),
    );
    let gatekeeper = Gatekeeper::new(registry, evaluator, index.clone());
    let grants = GrantManager::new(store, connectors);

    info!(
        providers = catalog.len(),
        tools = index.len(),
        database = %config.database.display(),
        "Toolgate services ready"
    );

    Ok(Services {
        gatekeeper,
        grants,
        vault,
        catalog,
    })
}
