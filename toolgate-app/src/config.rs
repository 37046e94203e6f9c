//! YAML configuration and tool catalog loading.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toolgate_core::{Provider, Tier, ToolDefinition};
use toolgate_policy::ConnectorMap;
use toolgate_providers::{ProviderCatalog, ProviderSpec};

pub const DEFAULT_CONFIG_PATH: &str = "toolgate.yaml";
pub const DEFAULT_MASTER_KEY_ENV: &str = "TOOLGATE_MASTER_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// SQLite file holding settings and connector grants.
    pub database: PathBuf,
    pub credentials_dir: PathBuf,
    /// Name of the env var carrying the base64 vault key.
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
    /// YAML list of tool definitions.
    pub tools: PathBuf,
    /// Replaces the builtin provider table when present.
    #[serde(default)]
    pub providers: Option<Vec<ProviderSpec>>,
    /// `provider -> connector` overrides.
    #[serde(default)]
    pub connectors: BTreeMap<String, String>,
}

fn default_master_key_env() -> String {
    DEFAULT_MASTER_KEY_ENV.to_string()
}

/// Tool entry as written in the catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    pub provider: String,
    pub category: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required_tier: Option<Tier>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

impl From<ToolSpec> for ToolDefinition {
    fn from(spec: ToolSpec) -> Self {
        let tool = ToolDefinition::new(
            spec.provider,
            spec.category,
            spec.name,
            spec.description,
            spec.required_tier,
        );
        match spec.parameters {
            Some(parameters) => tool.with_parameters(parameters),
            None => tool,
        }
    }
}

impl Config {
    /// Read, resolve relative paths against the config file's directory, and
    /// validate.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Config file not found: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let config = Self::from_yaml(&content, base_dir)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str, base_dir: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            bail!("Config file is empty");
        }

        let mut config: Config = serde_yaml::from_str(content).context("Invalid YAML")?;
        config.database = resolve_path(base_dir, &config.database);
        config.credentials_dir = resolve_path(base_dir, &config.credentials_dir);
        config.tools = resolve_path(base_dir, &config.tools);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.as_os_str().is_empty() {
            bail!("Config missing required field: database");
        }
        if self.credentials_dir.as_os_str().is_empty() {
            bail!("Config missing required field: credentials_dir");
        }
        if self.master_key_env.trim().is_empty() {
            bail!("Config field master_key_env is empty");
        }
        if !self.tools.exists() {
            bail!("Tool catalog not found: {}", self.tools.display());
        }
        Ok(())
    }

    pub fn provider_catalog(&self) -> Result<ProviderCatalog> {
        match &self.providers {
            None => Ok(ProviderCatalog::builtin()),
            Some(specs) => {
                let providers: Vec<Provider> = specs.iter().cloned().map(Provider::from).collect();
                ProviderCatalog::new(providers).context("Invalid provider table")
            }
        }
    }

    pub fn connector_map(&self, catalog: &ProviderCatalog) -> Result<ConnectorMap> {
        let mut map = ConnectorMap::from_catalog(catalog);
        for (provider, connector) in &self.connectors {
            if catalog.get(provider).is_none() {
                bail!("Connector override names unknown provider '{}'", provider);
            }
            if connector.trim().is_empty() {
                bail!("Connector override for '{}' is empty", provider);
            }
            let label = catalog.display_name(provider).to_string();
            map = map.with_connector(provider.clone(), connector.clone(), label);
        }
        Ok(map)
    }

    pub fn load_tools(&self) -> Result<Vec<ToolDefinition>> {
        load_tool_catalog(&self.tools)
    }
}

pub fn load_tool_catalog(path: &Path) -> Result<Vec<ToolDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tool catalog {}", path.display()))?;
    parse_tool_catalog(&content)
}

pub fn parse_tool_catalog(content: &str) -> Result<Vec<ToolDefinition>> {
    let specs: Vec<ToolSpec> =
        serde_yaml::from_str(content).context("Invalid tool catalog YAML")?;
    Ok(specs.into_iter().map(ToolDefinition::from).collect())
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() || path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let config = Config::from_yaml(
            "database: data/settings.db\ncredentials_dir: /var/lib/creds\ntools: tools.yaml\n",
            Path::new("/etc/toolgate"),
        )
        .unwrap();
        assert_eq!(config.database, PathBuf::from("/etc/toolgate/data/settings.db"));
        assert_eq!(config.credentials_dir, PathBuf::from("/var/lib/creds"));
        assert_eq!(config.master_key_env, DEFAULT_MASTER_KEY_ENV);
    }

    #[test]
    fn test_empty_config_rejected() {
        assert!(Config::from_yaml("  \n", Path::new(".")).is_err());
    }

    #[test]
    fn test_tool_spec_qualifies_names() {
        let tools = parse_tool_catalog(
            r#"
- provider: xero
  category: invoices
  name: approve_invoice
  required_tier: 2
- provider: system
  category: guides
  name: get_pip_guide
"#,
        )
        .unwrap();
        assert_eq!(tools[0].qualified_name, "xero:approve_invoice");
        assert_eq!(tools[0].required_tier, Some(Tier::Update));
        assert_eq!(tools[1].qualified_name, "get_pip_guide");
        assert_eq!(tools[1].required_tier, None);
    }

    #[test]
    fn test_out_of_range_tier_rejected() {
        let result = parse_tool_catalog(
            "- provider: xero\n  category: invoices\n  name: nuke\n  required_tier: 7\n",
        );
        assert!(result.is_err());
    }
}
