use anyhow::{Context, Result, bail};
use schemars::{Schema, schema_for};
use serde_valid::Validate;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, trace};

use super::models::{Config, TriggerConfig};
use crate::macros::{ValidationOutcome, parse, validate};

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Config> {
    let cfg: Config =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!(target: "caserpa::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    use tokio::fs;
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!(target: "caserpa::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Generate the JSON Schema for the Config model (for external validation or tooling).
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Write the JSON Schema for the Config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Field bounds, trigger sanity and stored-command validity.
/// - Engine values must satisfy their declared bounds.
/// - File and directory triggers need a path.
/// - Every stored command must pass macro validation against this config.
pub fn validate_config(cfg: &Config) -> Result<()> {
    if let Err(errors) = cfg.validate() {
        bail!("Invalid engine configuration: {errors}");
    }

    for (idx, trigger) in cfg.triggers.iter().enumerate() {
        match trigger {
            TriggerConfig::File { path, .. } | TriggerConfig::Directory { path, .. } => {
                if path.trim().is_empty() {
                    bail!("Trigger {idx} has an empty path");
                }
            }
            TriggerConfig::Clipboard { .. } | TriggerConfig::Stdin => {}
        }
    }

    for (name, code) in &cfg.commands {
        trace!(target: "caserpa::config", command = %name, "Validating stored command");
        if let outcome @ ValidationOutcome::Invalid { .. } = validate(&parse(code), cfg, cfg) {
            bail!("Stored command '{name}' is invalid: {outcome}");
        }
    }

    Ok(())
}
