//! Turn-level entry point: what the agent sees, and whether a named tool may
//! run.

use crate::evaluator::{PermissionEvaluator, PermissionResult};
use crate::tiers::TierMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use toolgate_core::{AccessError, StoreError, ToolDefinition};
use toolgate_providers::ProviderRegistry;
use toolgate_tools::{function_schemas, resolve, Resolution, ToolIndex};
use tracing::info;

/// Outcome of [`Gatekeeper::authorize`].
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    Allowed {
        tool: Arc<ToolDefinition>,
        permission: PermissionResult,
    },
    Denied {
        tool: Arc<ToolDefinition>,
        permission: PermissionResult,
    },
    Unresolved(Resolution),
}

impl Authorization {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Authorization::Allowed { .. })
    }

    pub fn into_result(self) -> Result<Arc<ToolDefinition>, AccessError> {
        match self {
            Authorization::Allowed { tool, .. } => Ok(tool),
            Authorization::Denied { permission, .. } => {
                Err(permission.into_result().err().unwrap_or_else(|| {
                    AccessError::PermissionDenied("Permission denied".to_string())
                }))
            }
            Authorization::Unresolved(resolution) => resolution.into_result(),
        }
    }
}

struct Snapshot {
    index: Arc<ToolIndex>,
    evaluator: PermissionEvaluator,
}

/// Ties the provider registry, tool index and permission evaluator together.
///
/// The index is an immutable snapshot. [`replace_index`](Self::replace_index)
/// swaps in a rebuilt one; in-flight calls keep the snapshot they started
/// with.
pub struct Gatekeeper {
    registry: ProviderRegistry,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Gatekeeper {
    /// `evaluator`'s tier table is replaced with one derived from `index`.
    pub fn new(
        registry: ProviderRegistry,
        evaluator: PermissionEvaluator,
        index: Arc<ToolIndex>,
    ) -> Self {
        let evaluator = evaluator.with_tiers(Arc::new(TierMap::from_index(&index)));
        Self {
            registry,
            snapshot: RwLock::new(Arc::new(Snapshot { index, evaluator })),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn index(&self) -> Arc<ToolIndex> {
        Arc::clone(&self.current().index)
    }

    pub fn evaluator(&self) -> PermissionEvaluator {
        self.current().evaluator.clone()
    }

    pub fn replace_index(&self, index: Arc<ToolIndex>) {
        let mut guard = self.snapshot.write();
        let evaluator = guard
            .evaluator
            .with_tiers(Arc::new(TierMap::from_index(&index)));
        info!(tools = index.len(), "Replaced tool index");
        *guard = Arc::new(Snapshot { index, evaluator });
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Tools to present to the agent this turn: owned by `system` or a
    /// connected provider, and permitted by the user's current grants.
    pub async fn turn_tools(
        &self,
        user_id: &str,
    ) -> Result<Vec<Arc<ToolDefinition>>, StoreError> {
        let snapshot = self.current();
        let connected = self.registry.connected_set(user_id).await?;

        let reachable: Vec<&Arc<ToolDefinition>> = snapshot
            .index
            .tools()
            .iter()
            .filter(|t| t.is_system() || connected.contains(&t.provider))
            .collect();
        let names: Vec<&str> = reachable.iter().map(|t| t.qualified_name.as_str()).collect();

        let visible = snapshot.evaluator.visible_tools(user_id, &names).await?;

        Ok(visible
            .iter()
            .filter_map(|name| snapshot.index.get(name).cloned())
            .collect())
    }

    pub async fn tool_schemas(&self, user_id: &str) -> Result<Vec<Value>, StoreError> {
        let tools = self.turn_tools(user_id).await?;
        Ok(function_schemas(tools.iter().map(|t| t.as_ref())))
    }

    pub async fn resolve(&self, user_id: &str, raw_name: &str) -> Result<Resolution, StoreError> {
        let snapshot = self.current();
        let connected = self.registry.connected_set(user_id).await?;
        Ok(resolve(raw_name, &snapshot.index, &connected, self.registry.catalog()))
    }

    /// Resolve `raw_name` and re-check permission on the resolved tool, as
    /// done before every dispatch.
    pub async fn authorize(
        &self,
        user_id: &str,
        raw_name: &str,
    ) -> Result<Authorization, StoreError> {
        let snapshot = self.current();
        let connected = self.registry.connected_set(user_id).await?;

        let tool = match resolve(raw_name, &snapshot.index, &connected, self.registry.catalog()) {
            Resolution::Resolved(tool) => tool,
            other => return Ok(Authorization::Unresolved(other)),
        };

        let permission = snapshot
            .evaluator
            .check_tool_permission(user_id, &tool.qualified_name)
            .await?;

        Ok(if permission.allowed {
            Authorization::Allowed { tool, permission }
        } else {
            Authorization::Denied { tool, permission }
        })
    }

    /// Permission for `raw_name` after resolving it against the user's
    /// connected providers. A shorthand that cannot be resolved is denied
    /// with the resolution error as the reason.
    pub async fn check_tool_permission(
        &self,
        user_id: &str,
        raw_name: &str,
    ) -> Result<PermissionResult, StoreError> {
        let snapshot = self.current();
        let connected = self.registry.connected_set(user_id).await?;

        match resolve(raw_name, &snapshot.index, &connected, self.registry.catalog()) {
            Resolution::Resolved(tool) => {
                snapshot
                    .evaluator
                    .check_tool_permission(user_id, &tool.qualified_name)
                    .await
            }
            // Outside the catalog; the evaluator decides.
            Resolution::NotFound { .. } => {
                snapshot
                    .evaluator
                    .check_tool_permission(user_id, raw_name)
                    .await
            }
            other => Ok(PermissionResult {
                allowed: false,
                reason: other.error_message(),
                ..PermissionResult::unrestricted()
            }),
        }
    }

    pub async fn needs_confirmation(
        &self,
        user_id: &str,
        raw_name: &str,
    ) -> Result<bool, StoreError> {
        let snapshot = self.current();
        let connected = self.registry.connected_set(user_id).await?;

        match resolve(raw_name, &snapshot.index, &connected, self.registry.catalog()) {
            Resolution::Resolved(tool) => {
                snapshot
                    .evaluator
                    .needs_confirmation(user_id, &tool.qualified_name)
                    .await
            }
            _ => snapshot.evaluator.needs_confirmation(user_id, raw_name).await,
        }
    }
}
