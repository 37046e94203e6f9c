//! Tiered permission enforcement for provider tools.

pub mod connectors;
pub mod evaluator;
pub mod gatekeeper;
pub mod grants;
pub mod metrics;
pub mod tiers;
pub mod visibility;

pub use connectors::ConnectorMap;
pub use evaluator::{
    effective_tier, EffectiveTier, PermissionEvaluator, PermissionResult, TierSource,
};
pub use gatekeeper::{Authorization, Gatekeeper};
pub use grants::{ConnectorGrant, GrantError, GrantManager, VacationStatus};
pub use tiers::{is_destructive, is_write, needs_confirmation, RequiredTier, TierMap};
