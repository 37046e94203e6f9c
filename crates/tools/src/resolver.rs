//! Turns a possibly-unqualified tool name into exactly one tool, an explicit
//! choice between candidates, or a typed failure.

use crate::index::ToolIndex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use toolgate_core::{AccessError, ToolDefinition, NAME_SEPARATOR, SYSTEM_PROVIDER};
use toolgate_providers::ProviderCatalog;
use tracing::debug;

/// A provider that would satisfy a name if the user connected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingProvider {
    pub id: String,
    pub display_name: String,
}

/// Outcome of resolving a tool name. Every call site handles all four cases;
/// an ambiguous name never resolves to a default.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(Arc<ToolDefinition>),
    Ambiguous {
        name: String,
        candidates: Vec<Arc<ToolDefinition>>,
    },
    NotFound {
        name: String,
    },
    NotConnected {
        name: String,
        providers: Vec<MissingProvider>,
    },
}

/// Wire payload for a failed resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionFailure {
    pub resolved: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<ToolDefinition>>,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn tool(&self) -> Option<&Arc<ToolDefinition>> {
        match self {
            Resolution::Resolved(tool) => Some(tool),
            _ => None,
        }
    }

    /// Short reason text for the agent, `None` when resolved.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::NotFound { name } => Some(format!("Tool '{}' not found", name)),
            Resolution::NotConnected { name, providers } => Some(format!(
                "Tool '{}' requires {} to be connected",
                name,
                display_names(providers).join(" or ")
            )),
            Resolution::Ambiguous { name, candidates } => Some(format!(
                "Tool name '{}' matches several connected providers: {}. \
                 Retry with a qualified name",
                name,
                qualified_names(candidates).join(", ")
            )),
        }
    }

    pub fn failure_payload(&self) -> Option<ResolutionFailure> {
        let error = self.error_message()?;
        let candidates = match self {
            Resolution::Ambiguous { candidates, .. } => {
                Some(candidates.iter().map(|t| ToolDefinition::clone(t)).collect())
            }
            _ => None,
        };
        Some(ResolutionFailure {
            resolved: false,
            error,
            candidates,
        })
    }

    pub fn into_result(self) -> Result<Arc<ToolDefinition>, AccessError> {
        match self {
            Resolution::Resolved(tool) => Ok(tool),
            Resolution::NotFound { name } => Err(AccessError::ToolNotFound(name)),
            Resolution::NotConnected { name, providers } => Err(AccessError::ProviderNotConnected {
                name,
                providers: display_names(&providers),
            }),
            Resolution::Ambiguous { name, candidates } => Err(AccessError::AmbiguousToolName {
                name,
                candidates: qualified_names(&candidates),
            }),
        }
    }
}

fn display_names(providers: &[MissingProvider]) -> Vec<String> {
    providers.iter().map(|p| p.display_name.clone()).collect()
}

fn qualified_names(tools: &[Arc<ToolDefinition>]) -> Vec<String> {
    tools.iter().map(|t| t.qualified_name.clone()).collect()
}

/// Split a wire name on its first `:` into `(provider, short_name)`.
pub fn parse_tool_name(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(NAME_SEPARATOR) {
        Some((provider, short_name)) => (Some(provider), short_name),
        None => (None, raw),
    }
}

/// Resolve `raw` against `index` for a caller whose connected providers are
/// `connected`. The system provider is always treated as connected.
pub fn resolve(
    raw: &str,
    index: &ToolIndex,
    connected: &HashSet<String>,
    catalog: &ProviderCatalog,
) -> Resolution {
    let resolution = resolve_inner(raw, index, connected, catalog);

    match &resolution {
        Resolution::Resolved(tool) => {
            debug!(name = raw, tool = %tool.qualified_name, "Resolved tool name");
        }
        Resolution::Ambiguous { candidates, .. } => {
            metrics::counter!("tool_resolution_ambiguous", 1);
            debug!(name = raw, candidates = candidates.len(), "Ambiguous tool name");
        }
        Resolution::NotConnected { providers, .. } => {
            metrics::counter!("tool_resolution_not_connected", 1);
            debug!(name = raw, providers = ?providers, "Tool provider not connected");
        }
        Resolution::NotFound { .. } => {
            debug!(name = raw, "Tool name not found");
        }
    }

    resolution
}

fn resolve_inner(
    raw: &str,
    index: &ToolIndex,
    connected: &HashSet<String>,
    catalog: &ProviderCatalog,
) -> Resolution {
    let not_found = || Resolution::NotFound {
        name: raw.to_string(),
    };

    match parse_tool_name(raw) {
        (Some(provider), _) => {
            let Some(tool) = index.get(raw) else {
                return not_found();
            };
            if provider != SYSTEM_PROVIDER && !connected.contains(provider) {
                return Resolution::NotConnected {
                    name: raw.to_string(),
                    providers: vec![missing(catalog, provider)],
                };
            }
            Resolution::Resolved(Arc::clone(tool))
        }
        (None, short_name) => {
            if let Some(tool) = index.get(short_name).filter(|t| t.is_system()) {
                return Resolution::Resolved(Arc::clone(tool));
            }

            let all = index.by_short_name(short_name);
            let candidates: Vec<Arc<ToolDefinition>> = all
                .iter()
                .filter(|t| t.is_system() || connected.contains(&t.provider))
                .cloned()
                .collect();

            match candidates.len() {
                0 if all.is_empty() => not_found(),
                0 => {
                    let mut seen = HashSet::new();
                    let providers = all
                        .iter()
                        .filter(|t| seen.insert(t.provider.as_str()))
                        .map(|t| missing(catalog, &t.provider))
                        .collect();
                    Resolution::NotConnected {
                        name: raw.to_string(),
                        providers,
                    }
                }
                1 => Resolution::Resolved(Arc::clone(&candidates[0])),
                _ => Resolution::Ambiguous {
                    name: raw.to_string(),
                    candidates,
                },
            }
        }
    }
}

fn missing(catalog: &ProviderCatalog, provider: &str) -> MissingProvider {
    MissingProvider {
        id: provider.to_string(),
        display_name: catalog.display_name(provider).to_string(),
    }
}
