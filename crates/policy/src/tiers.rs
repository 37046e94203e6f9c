//! Static required-tier table derived from the tool catalog.

use std::collections::{HashMap, HashSet};
use toolgate_core::{Tier, ToolDefinition};
use toolgate_tools::ToolIndex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredTier {
    pub provider: String,
    pub tier: Tier,
}

/// Qualified tool name to required tier. Tools without a tier (meta-tools)
/// are absent and never permission-gated.
///
/// Short names of gated provider tools are kept too, so a shorthand name is
/// never mistaken for an ungated one.
#[derive(Debug, Clone, Default)]
pub struct TierMap {
    entries: HashMap<String, RequiredTier>,
    gated_short_names: HashSet<String>,
}

impl TierMap {
    pub fn from_index(index: &ToolIndex) -> Self {
        Self::from_tools(index.tools().iter().map(|t| t.as_ref()))
    }

    pub fn from_tools<'a, I>(tools: I) -> Self
    where
        I: IntoIterator<Item = &'a ToolDefinition>,
    {
        let mut map = Self::default();
        for tool in tools {
            let Some(tier) = tool.required_tier else {
                continue;
            };
            if !tool.is_system() {
                map.gated_short_names.insert(tool.short_name.clone());
            }
            map.entries.insert(
                tool.qualified_name.clone(),
                RequiredTier {
                    provider: tool.provider.clone(),
                    tier,
                },
            );
        }
        map
    }

    pub fn get(&self, tool_name: &str) -> Option<&RequiredTier> {
        self.entries.get(tool_name)
    }

    /// True for a bare name that is not itself a tool but is the short name
    /// of a gated provider tool. Such a name must be resolved before it can
    /// be evaluated.
    pub fn is_unqualified_alias(&self, tool_name: &str) -> bool {
        !self.entries.contains_key(tool_name) && self.gated_short_names.contains(tool_name)
    }

    pub fn required_tier(&self, tool_name: &str) -> Option<Tier> {
        self.get(tool_name).map(|r| r.tier)
    }

    pub fn is_write_operation(&self, tool_name: &str) -> bool {
        self.required_tier(tool_name).is_some_and(is_write)
    }

    pub fn requires_confirmation(&self, tool_name: &str) -> bool {
        self.required_tier(tool_name).is_some_and(needs_confirmation)
    }

    pub fn is_destructive_operation(&self, tool_name: &str) -> bool {
        self.required_tier(tool_name).is_some_and(is_destructive)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn is_write(tier: Tier) -> bool {
    tier > Tier::ReadOnly
}

pub fn needs_confirmation(tier: Tier) -> bool {
    tier >= Tier::Update
}

pub fn is_destructive(tier: Tier) -> bool {
    tier >= Tier::Destructive
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn map() -> TierMap {
        let tools = [
            ToolDefinition::new("xero", "invoices", "get_invoices", "", Some(Tier::ReadOnly)),
            ToolDefinition::new("xero", "invoices", "create_invoice", "", Some(Tier::Create)),
            ToolDefinition::new("xero", "invoices", "approve_invoice", "", Some(Tier::Update)),
            ToolDefinition::new("xero", "invoices", "void_invoice", "", Some(Tier::Destructive)),
            ToolDefinition::system("meta", "list_tools", "", None),
        ];
        TierMap::from_tools(tools.iter())
    }

    #[test]
    fn test_meta_tools_absent() {
        let map = map();
        assert_eq!(map.len(), 4);
        assert_eq!(map.required_tier("list_tools"), None);
        assert!(!map.is_write_operation("list_tools"));
    }

    #[test]
    fn test_predicates() {
        let map = map();
        assert!(!map.is_write_operation("xero:get_invoices"));
        assert!(map.is_write_operation("xero:create_invoice"));
        assert!(!map.requires_confirmation("xero:create_invoice"));
        assert!(map.requires_confirmation("xero:approve_invoice"));
        assert!(!map.is_destructive_operation("xero:approve_invoice"));
        assert!(map.is_destructive_operation("xero:void_invoice"));
        assert!(map.requires_confirmation("xero:void_invoice"));
    }

    #[test]
    fn test_short_names_are_aliases_not_tools() {
        let map = map();
        assert!(map.is_unqualified_alias("void_invoice"));
        assert!(!map.is_unqualified_alias("xero:void_invoice"));
        assert!(!map.is_unqualified_alias("list_tools"));
        assert!(!map.is_unqualified_alias("nope"));
    }

    #[test]
    fn test_unknown_tool_predicates_false() {
        let map = map();
        assert!(!map.is_write_operation("nope"));
        assert!(!map.requires_confirmation("nope"));
        assert!(!map.is_destructive_operation("nope"));
    }
}
