//! Toolgate core
//!
//! Shared types, collaborator contracts and the error taxonomy used by the
//! provider registry, tool index, resolver and permission evaluator.

pub mod error;
pub mod interfaces;
pub mod types;

pub use error::{AccessError, StoreError};
pub use interfaces::{CredentialLookup, SettingsStore};
pub use types::{
    qualify, ConnectorPermission, Provider, ProviderKind, SettingsPatch, Tier, ToolDefinition,
    UserSettings, NAME_SEPARATOR, SYSTEM_PROVIDER,
};
