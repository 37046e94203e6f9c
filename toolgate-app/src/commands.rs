//! Subcommand bodies. Each returns the JSON document the CLI prints.

use crate::bootstrap::Services;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use toolgate_core::Tier;
use toolgate_policy::Authorization;
use toolgate_tools::Resolution;

pub async fn providers(services: &Services, user_id: &str) -> Result<Value> {
    let registry = services.gatekeeper.registry();
    let connected = registry.connected_set(user_id).await?;

    let providers: Vec<Value> = services
        .catalog
        .providers()
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "type": p.kind,
                "displayName": p.display_name,
                "implemented": p.implemented,
                "connected": connected.contains(&p.id),
            })
        })
        .collect();

    Ok(json!({ "userId": user_id, "providers": providers }))
}

pub async fn tools(services: &Services, user_id: &str) -> Result<Value> {
    let schemas = services.gatekeeper.tool_schemas(user_id).await?;
    let disconnected: Vec<&str> = services
        .gatekeeper
        .registry()
        .disconnected_providers(user_id)
        .await?
        .into_iter()
        .map(|p| p.display_name.as_str())
        .collect();

    Ok(json!({
        "userId": user_id,
        "tools": schemas,
        "disconnectedProviders": disconnected,
    }))
}

pub async fn resolve(services: &Services, user_id: &str, name: &str) -> Result<Value> {
    let resolution = services.gatekeeper.resolve(user_id, name).await?;
    resolution_json(&resolution)
}

pub async fn check(services: &Services, user_id: &str, name: &str) -> Result<Value> {
    match services.gatekeeper.authorize(user_id, name).await? {
        Authorization::Allowed { tool, permission }
        | Authorization::Denied { tool, permission } => {
            let needs_confirmation = permission.allowed
                && services
                    .gatekeeper
                    .needs_confirmation(user_id, &tool.qualified_name)
                    .await?;
            Ok(json!({
                "tool": tool.qualified_name,
                "permission": permission,
                "needsConfirmation": needs_confirmation,
            }))
        }
        Authorization::Unresolved(resolution) => resolution_json(&resolution),
    }
}

pub async fn grant(
    services: &Services,
    user_id: &str,
    connector: &str,
    level: u8,
) -> Result<Value> {
    let tier = parse_tier(level)?;
    let row = services
        .grants
        .set_connector_tier(user_id, connector, tier)
        .await?;
    Ok(json!({
        "userId": row.user_id,
        "connector": row.connector,
        "tier": row.tier,
        "tierLabel": row.tier.label(),
    }))
}

pub async fn global(services: &Services, user_id: &str, level: u8) -> Result<Value> {
    let tier = parse_tier(level)?;
    let settings = services.grants.set_global_tier(user_id, tier).await?;
    Ok(serde_json::to_value(settings)?)
}

/// `days` is a positive day count or `off`.
pub async fn vacation(services: &Services, user_id: &str, days: &str) -> Result<Value> {
    let settings = if days.eq_ignore_ascii_case("off") {
        services.grants.disable_vacation_mode(user_id).await?
    } else {
        let days: i64 = days
            .parse()
            .with_context(|| format!("Expected a number of days or 'off', got '{}'", days))?;
        if days <= 0 {
            bail!("Vacation length must be at least one day");
        }
        let Some(until) = Duration::try_days(days).and_then(|d| Utc::now().checked_add_signed(d))
        else {
            bail!("Vacation length of {} days is out of range", days);
        };
        services.grants.enable_vacation_mode(user_id, until).await?
    };
    let status = services.grants.vacation_status(user_id).await?;
    Ok(json!({ "settings": settings, "vacation": status }))
}

pub fn connect(
    services: &Services,
    user_id: &str,
    provider_id: &str,
    secret: &str,
) -> Result<Value> {
    let provider = services
        .catalog
        .get(provider_id)
        .filter(|p| !p.is_system())
        .ok_or_else(|| anyhow!("Unknown provider '{}'", provider_id))?;
    if !provider.implemented {
        bail!("{} is not available yet", provider.display_name);
    }
    if secret.trim().is_empty() {
        bail!("Refusing to store an empty credential");
    }

    services
        .vault
        .store_credential(user_id, &provider.connector_key, secret.trim())?;
    Ok(json!({ "userId": user_id, "provider": provider.id, "connected": true }))
}

pub fn disconnect(services: &Services, user_id: &str, provider_id: &str) -> Result<Value> {
    let provider = services
        .catalog
        .get(provider_id)
        .filter(|p| !p.is_system())
        .ok_or_else(|| anyhow!("Unknown provider '{}'", provider_id))?;
    services
        .vault
        .delete_credential(user_id, &provider.connector_key)?;
    Ok(json!({ "userId": user_id, "provider": provider.id, "connected": false }))
}

pub async fn summary(services: &Services, user_id: &str) -> Result<Value> {
    let settings = services.grants.get_or_create_settings(user_id).await?;
    let connectors = services.grants.connector_summary(user_id).await?;
    let vacation = services.grants.vacation_status(user_id).await?;
    Ok(json!({
        "settings": settings,
        "connectors": connectors,
        "vacation": vacation,
    }))
}

fn parse_tier(level: u8) -> Result<Tier> {
    Tier::from_level(level).ok_or_else(|| anyhow!("Tier must be 0-3, got {}", level))
}

fn resolution_json(resolution: &Resolution) -> Result<Value> {
    match resolution {
        Resolution::Resolved(tool) => Ok(json!({ "resolved": true, "tool": tool.as_ref() })),
        other => match other.failure_payload() {
            Some(payload) => Ok(serde_json::to_value(payload)?),
            None => Ok(json!({ "resolved": false })),
        },
    }
}
