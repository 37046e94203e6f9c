//! Core type definitions shared by every toolgate crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider id of the built-in synthetic provider. System tools are never
/// namespaced and the provider is always treated as connected.
pub const SYSTEM_PROVIDER: &str = "system";

/// Separator between provider and short name in a qualified tool name.
pub const NAME_SEPARATOR: char = ':';

/// Ordinal capability ceiling. A user granted tier `T` may perform any
/// operation whose required tier is `<= T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    #[default]
    ReadOnly = 0,
    Create = 1,
    Update = 2,
    Destructive = 3,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::ReadOnly, Tier::Create, Tier::Update, Tier::Destructive];

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Tier::ReadOnly),
            1 => Some(Tier::Create),
            2 => Some(Tier::Update),
            3 => Some(Tier::Destructive),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    /// Human-readable name used in denial reasons and settings screens.
    pub fn label(self) -> &'static str {
        match self {
            Tier::ReadOnly => "Read Only",
            Tier::Create => "Create",
            Tier::Update => "Edit & Approve",
            Tier::Destructive => "Full Access",
        }
    }

    pub fn permits(self, required: Tier) -> bool {
        self >= required
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Tier::from_level(level).ok_or_else(|| format!("Invalid tier {}: expected 0-3", level))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.level()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (level {})", self.label(), self.level())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Accounting,
    Spreadsheet,
    Email,
    Tasks,
    System,
}

/// A known external service. Provider tables are built once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub display_name: String,
    /// Key under which the user's credential is stored.
    pub connector_key: String,
    pub implemented: bool,
}

impl Provider {
    pub fn new(
        id: impl Into<String>,
        kind: ProviderKind,
        display_name: impl Into<String>,
        connector_key: impl Into<String>,
        implemented: bool,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: display_name.into(),
            connector_key: connector_key.into(),
            implemented,
        }
    }

    pub fn is_system(&self) -> bool {
        self.id == SYSTEM_PROVIDER
    }
}

/// A tool exposed to the agent by one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub provider: String,
    pub category: String,
    pub qualified_name: String,
    pub short_name: String,
    pub description: String,
    /// `None` for meta-tools that are never permission-gated.
    #[serde(default)]
    pub required_tier: Option<Tier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

impl ToolDefinition {
    pub fn new(
        provider: impl Into<String>,
        category: impl Into<String>,
        short_name: impl Into<String>,
        description: impl Into<String>,
        required_tier: Option<Tier>,
    ) -> Self {
        let provider = provider.into();
        let short_name = short_name.into();
        Self {
            qualified_name: qualify(&provider, &short_name),
            provider,
            category: category.into(),
            short_name,
            description: description.into(),
            required_tier,
            parameters: None,
        }
    }

    /// Builtin tool owned by the synthetic system provider.
    pub fn system(
        category: impl Into<String>,
        short_name: impl Into<String>,
        description: impl Into<String>,
        required_tier: Option<Tier>,
    ) -> Self {
        Self::new(SYSTEM_PROVIDER, category, short_name, description, required_tier)
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn is_system(&self) -> bool {
        self.provider == SYSTEM_PROVIDER
    }
}

/// Build the wire name for a tool: `provider:short_name`, or the bare short
/// name for system tools.
pub fn qualify(provider: &str, short_name: &str) -> String {
    if provider == SYSTEM_PROVIDER {
        short_name.to_string()
    } else {
        format!("{}{}{}", provider, NAME_SEPARATOR, short_name)
    }
}

/// Per-user settings row owned by the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    /// Legacy global tier, consulted when no per-connector row exists.
    pub permission_level: Tier,
    pub vacation_mode_until: Option<DateTime<Utc>>,
    pub require_confirmation: bool,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    pub fn defaults(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            permission_level: Tier::ReadOnly,
            vacation_mode_until: None,
            require_confirmation: true,
            updated_at: Utc::now(),
        }
    }

    /// End of the active vacation window, if one is running at `now`.
    pub fn vacation_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.vacation_mode_until.filter(|until| *until > now)
    }

    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(level) = patch.permission_level {
            self.permission_level = level;
        }
        if let Some(until) = patch.vacation_mode_until {
            self.vacation_mode_until = until;
        }
        if let Some(require) = patch.require_confirmation {
            self.require_confirmation = require;
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update for [`UserSettings`]. `None` leaves a field untouched;
/// `vacation_mode_until: Some(None)` clears the vacation window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub permission_level: Option<Tier>,
    pub vacation_mode_until: Option<Option<DateTime<Utc>>>,
    pub require_confirmation: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.permission_level.is_none()
            && self.vacation_mode_until.is_none()
            && self.require_confirmation.is_none()
    }
}

/// Per-(user, connector) tier grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorPermission {
    pub user_id: String,
    pub connector: String,
    pub tier: Tier,
    pub updated_at: DateTime<Utc>,
}

impl ConnectorPermission {
    pub fn new(user_id: impl Into<String>, connector: impl Into<String>, tier: Tier) -> Self {
        Self {
            user_id: user_id.into(),
            connector: connector.into(),
            tier,
            updated_at: Utc::now(),
        }
    }
}
