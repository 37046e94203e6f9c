//! Tool schemas in the function-calling format handed to the agent.

use serde_json::{json, Value};
use toolgate_core::ToolDefinition;

pub fn function_schema(tool: &ToolDefinition) -> Value {
    let parameters = tool
        .parameters
        .clone()
        .unwrap_or_else(|| json!({"type": "object", "properties": {}}));

    json!({
        "type": "function",
        "function": {
            "name": tool.qualified_name,
            "description": tool.description,
            "parameters": parameters
        }
    })
}

pub fn function_schemas<'a, I>(tools: I) -> Vec<Value>
where
    I: IntoIterator<Item = &'a ToolDefinition>,
{
    tools.into_iter().map(function_schema).collect()
}
