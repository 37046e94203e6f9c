//! Typed lookup structures over a flat tool list.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use toolgate_core::{qualify, ToolDefinition, NAME_SEPARATOR};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("Duplicate qualified tool name: {0}")]
    DuplicateQualifiedName(String),
    #[error("Invalid tool name '{0}': {1}")]
    InvalidName(String, &'static str),
    #[error(
        "Qualified name '{actual}' does not match provider and short name \
         (expected '{expected}')"
    )]
    QualifiedNameMismatch { actual: String, expected: String },
}

/// Immutable snapshot of the tool catalog.
///
/// Built in one pass; rebuilt wholesale when the upstream tool list changes.
/// Category keys are namespaced as `provider:category`, except for system
/// tools which use the bare category.
#[derive(Debug, Default)]
pub struct ToolIndex {
    tools: Vec<Arc<ToolDefinition>>,
    by_qualified_name: HashMap<String, Arc<ToolDefinition>>,
    by_short_name: HashMap<String, Vec<Arc<ToolDefinition>>>,
    by_provider: HashMap<String, Vec<Arc<ToolDefinition>>>,
    by_category: HashMap<String, Vec<Arc<ToolDefinition>>>,
}

impl ToolIndex {
    pub fn build(definitions: Vec<ToolDefinition>) -> Result<Self, IndexError> {
        let mut index = ToolIndex::default();

        for definition in definitions {
            validate(&definition)?;

            let tool = Arc::new(definition);
            if index
                .by_qualified_name
                .insert(tool.qualified_name.clone(), Arc::clone(&tool))
                .is_some()
            {
                return Err(IndexError::DuplicateQualifiedName(tool.qualified_name.clone()));
            }

            index
                .by_short_name
                .entry(tool.short_name.clone())
                .or_default()
                .push(Arc::clone(&tool));
            index
                .by_provider
                .entry(tool.provider.clone())
                .or_default()
                .push(Arc::clone(&tool));
            index
                .by_category
                .entry(category_key(&tool))
                .or_default()
                .push(Arc::clone(&tool));
            index.tools.push(tool);
        }

        Ok(index)
    }

    pub fn get(&self, qualified_name: &str) -> Option<&Arc<ToolDefinition>> {
        self.by_qualified_name.get(qualified_name)
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.by_qualified_name.contains_key(qualified_name)
    }

    pub fn by_short_name(&self, short_name: &str) -> &[Arc<ToolDefinition>] {
        self.by_short_name
            .get(short_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn by_provider(&self, provider: &str) -> &[Arc<ToolDefinition>] {
        self.by_provider
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Tools under a namespaced category key such as `xero:invoices`.
    pub fn by_category(&self, key: &str) -> &[Arc<ToolDefinition>] {
        self.by_category
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.by_category.keys().map(String::as_str)
    }

    /// All tools in catalog order.
    pub fn tools(&self) -> &[Arc<ToolDefinition>] {
        &self.tools
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.qualified_name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Category key for a tool: `provider:category`, or bare for system tools.
pub fn category_key(tool: &ToolDefinition) -> String {
    qualify(&tool.provider, &tool.category)
}

fn validate(tool: &ToolDefinition) -> Result<(), IndexError> {
    for value in [&tool.provider, &tool.short_name] {
        if value.is_empty() {
            return Err(IndexError::InvalidName(
                tool.qualified_name.clone(),
                "empty provider or short name",
            ));
        }
        if value.contains(NAME_SEPARATOR) {
            return Err(IndexError::InvalidName(value.clone(), "contains ':'"));
        }
        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(IndexError::InvalidName(
                value.clone(),
                "must be printable ASCII without whitespace",
            ));
        }
    }

    let expected = qualify(&tool.provider, &tool.short_name);
    if tool.qualified_name != expected {
        return Err(IndexError::QualifiedNameMismatch {
            actual: tool.qualified_name.clone(),
            expected,
        });
    }

    Ok(())
}
