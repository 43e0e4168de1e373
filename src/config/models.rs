use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::collections::BTreeMap;

/// Root configuration for Caserpa.
///
/// This structure is intended to be deserialized from a JSON configuration file.
/// It captures all the building blocks the runtime needs:
/// - `engine` timings and locate tuning
/// - free-form `settings` readable (and checkable) by the `u` opcode
/// - stored `commands`, macros callable by name through the `z` opcode
/// - `triggers` that feed macros in while watching
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default)]
pub struct Config {
    #[serde(default)]
    #[validate]
    pub engine: EngineConfig,

    /// Extra read-only settings for collaborators. `uKey:value` only
    /// validates for the engine's well-known keys.
    #[serde(default)]
    pub settings: SettingsMap,

    /// Stored macros by name.
    #[serde(default)]
    pub commands: CommandMap,

    /// Trigger sources used by `--watch`.
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

/// Free-form settings.
pub type SettingsMap = BTreeMap<String, String>;

/// Command name -> macro text.
pub type CommandMap = BTreeMap<String, String>;

/// Engine tuning. Every field has a default, so `{}` is a valid engine block.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Pause after every instruction, in milliseconds.
    pub command_delay_ms: u64,

    /// Delay between screen polls while waiting for an image.
    #[validate(minimum = 1)]
    pub poll_interval_ms: u64,

    /// Minimum similarity score (0..=1) for a template match to count.
    #[validate(minimum = 0.0)]
    #[validate(maximum = 1.0)]
    pub match_threshold: f64,

    /// Directory image references are resolved against.
    #[validate(min_length = 1)]
    pub image_directory: String,

    /// Maximum nesting of stored-command calls.
    #[validate(minimum = 1)]
    pub max_call_depth: usize,

    pub pre_double_click_ms: u64,
    pub double_click_gap_ms: u64,
    pub last_instance_delay_ms: u64,
    pub drag_hold_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_delay_ms: 500,
            poll_interval_ms: 1000,
            match_threshold: 0.9,
            image_directory: "find".into(),
            max_call_depth: 16,
            pre_double_click_ms: 250,
            double_click_gap_ms: 75,
            last_instance_delay_ms: 100,
            drag_hold_ms: 500,
        }
    }
}

/// Trigger source configuration.
/// Use `type` to select a variant:
/// - "file": poll a single file for a trigger request
/// - "directory": watch a directory for new request files
/// - "stdin": read one request per line from standard input
///
/// A request is either JSON (`{"type":"execute","macro":"e;t100"}`,
/// `{"type":"command","name":"open_notepad"}`) or a bare command name.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Poll a single file.
    File {
        /// Absolute or relative path to the file.
        path: String,
        /// Poll interval in milliseconds (default: 100).
        #[serde(default)]
        poll_ms: Option<u64>,
        /// Delete the file after a successful read (default: false).
        #[serde(default)]
        delete_on_success: Option<bool>,
    },

    /// Watch a directory; each new matching file is one request and is
    /// removed once read.
    Directory {
        /// Directory to watch.
        path: String,
        /// Optional file name pattern (e.g., "trigger_*" or "*.json").
        #[serde(default)]
        pattern: Option<String>,
        /// Whether to watch subdirectories (default: false).
        #[serde(default)]
        recursive: Option<bool>,
    },

    /// Poll the clipboard; new text is a request (usually a command name).
    Clipboard {
        /// Poll interval in milliseconds (default: 500).
        #[serde(default)]
        poll_ms: Option<u64>,
    },

    /// Read requests from standard input, one per line.
    Stdin,
}
