//! `Config` as the command and settings collaborator of the engine.

use crate::config::Config;
use crate::executor::services::{CommandResolver, SettingsStore};

/// Engine settings exposed under their well-known names.
pub const ENGINE_KEYS: [&str; 5] = [
    "CommandDelay",
    "PollInterval",
    "MatchThreshold",
    "ImageStorageDirectory",
    "MaxCallDepth",
];

impl CommandResolver for Config {
    fn lookup(&self, name: &str) -> Option<String> {
        self.commands.get(name).cloned()
    }
}

impl SettingsStore for Config {
    fn get(&self, key: &str) -> Option<String> {
        let engine = &self.engine;
        match key {
            "CommandDelay" => Some(engine.command_delay_ms.to_string()),
            "PollInterval" => Some(engine.poll_interval_ms.to_string()),
            "MatchThreshold" => Some(engine.match_threshold.to_string()),
            "ImageStorageDirectory" => Some(engine.image_directory.clone()),
            "MaxCallDepth" => Some(engine.max_call_depth.to_string()),
            _ => self.settings.get(key).cloned(),
        }
    }
}
