//! Configuration module for Caserpa.
//!
//! This module wires together the data models, the loading/validation helpers and
//! the collaborator impls that let the engine read commands and settings straight
//! from a `Config`.
//!
//! Example:
//! use caserpa::config::{Config, load_from_path};
//!
//! let cfg = load_from_path("config/default.json")?;

pub mod loader;
pub mod models;
pub mod store;

// Re-export core data models
pub use models::{CommandMap, Config, EngineConfig, SettingsMap, TriggerConfig};

// Re-export loader utilities
pub use loader::{
    generate_schema, load_from_path, load_from_path_async, load_from_reader, load_from_str,
    validate_config, write_schema_to_writer,
};

pub use store::ENGINE_KEYS;
