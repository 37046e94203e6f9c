pub mod index;
pub mod resolver;
pub mod schema;

pub use index::{category_key, IndexError, ToolIndex};
pub use resolver::{parse_tool_name, resolve, MissingProvider, Resolution, ResolutionFailure};
pub use schema::{function_schema, function_schemas};
