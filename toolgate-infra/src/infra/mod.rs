pub mod credential_vault;
pub mod memory;
pub mod settings_store;
