pub mod catalog;
pub mod registry;

pub use catalog::{CatalogError, ProviderCatalog, ProviderSpec};
pub use registry::ProviderRegistry;
