//! Mutable per-execution state.
//!
//! The inter-instruction delay and the call-depth cap can be changed mid-macro
//! with `u<key>:<value>`, so they live here rather than in the read-only config.
//! Locate parameters set the same way are handed on to the screen locator.
//! A `Session` is owned by one runtime; executions never share one concurrently.

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;
use crate::locator::LocatorTuning;

/// Settings key that updates the inter-instruction delay.
pub const COMMAND_DELAY_KEY: &str = "CommandDelay";

/// Default cap on nested `z` invocations.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

/// Why a `key:value` pair cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("setting '{0}' cannot be changed by a macro")]
    NotSettable(String),
    #[error("setting '{key}' {expected} (got '{value}')")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// A parsed run-time setting change.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingUpdate {
    CommandDelay(Duration),
    MaxCallDepth(usize),
    Locator(LocatorTuning),
}

impl SettingUpdate {
    /// Parse one of the engine keys and its value.
    pub fn parse(key: &str, value: &str) -> Result<Self, SettingError> {
        let value = value.trim();
        let invalid = |expected| SettingError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected,
        };
        let millis = |v: &str| v.parse::<u64>().map(Duration::from_millis);

        match key {
            COMMAND_DELAY_KEY => millis(value)
                .map(Self::CommandDelay)
                .map_err(|_| invalid("expects milliseconds")),
            "PollInterval" => match millis(value) {
                Ok(d) if !d.is_zero() => Ok(Self::Locator(LocatorTuning::PollInterval(d))),
                _ => Err(invalid("expects a positive number of milliseconds")),
            },
            "MatchThreshold" => match value.parse::<f64>() {
                Ok(t) if (0.0..=1.0).contains(&t) => Ok(Self::Locator(LocatorTuning::Threshold(t))),
                _ => Err(invalid("expects a number between 0 and 1")),
            },
            "ImageStorageDirectory" if !value.is_empty() => {
                Ok(Self::Locator(LocatorTuning::ImageDirectory(value.into())))
            }
            "ImageStorageDirectory" => Err(invalid("expects a directory")),
            "MaxCallDepth" => match value.parse::<usize>() {
                Ok(depth) if depth >= 1 => Ok(Self::MaxCallDepth(depth)),
                _ => Err(invalid("expects a positive integer")),
            },
            other => Err(SettingError::NotSettable(other.to_string())),
        }
    }
}

/// Fixed pauses inside compound actions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Before the first click of a located double click.
    pub pre_double_click: Duration,
    /// Between the two clicks of a double click.
    pub double_click_gap: Duration,
    /// Before acting on the last instance of a repeated image.
    pub last_instance_delay: Duration,
    /// Between press and release of a drag.
    pub drag_hold: Duration,
}

impl Timings {
    pub const fn zero() -> Self {
        Self {
            pre_double_click: Duration::ZERO,
            double_click_gap: Duration::ZERO,
            last_instance_delay: Duration::ZERO,
            drag_hold: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    command_delay: Duration,
    timings: Timings,
    max_call_depth: usize,
}

impl Session {
    pub fn new(engine: &EngineConfig) -> Self {
        Self {
            command_delay: Duration::from_millis(engine.command_delay_ms),
            timings: Timings {
                pre_double_click: Duration::from_millis(engine.pre_double_click_ms),
                double_click_gap: Duration::from_millis(engine.double_click_gap_ms),
                last_instance_delay: Duration::from_millis(engine.last_instance_delay_ms),
                drag_hold: Duration::from_millis(engine.drag_hold_ms),
            },
            max_call_depth: engine.max_call_depth,
        }
    }

    /// A session with every delay set to zero.
    pub fn immediate() -> Self {
        Self {
            command_delay: Duration::ZERO,
            timings: Timings::zero(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn command_delay(&self) -> Duration {
        self.command_delay
    }

    pub fn set_command_delay(&mut self, delay: Duration) {
        self.command_delay = delay;
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Block the calling thread for `duration`; zero returns immediately.
    pub fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    /// Apply an update. Locator tunings are handed back to the caller.
    pub fn apply(&mut self, update: SettingUpdate) -> Option<LocatorTuning> {
        match update {
            SettingUpdate::CommandDelay(delay) => {
                debug!(target: "caserpa::session", ms = delay.as_millis() as u64, "Command delay updated");
                self.command_delay = delay;
                None
            }
            SettingUpdate::MaxCallDepth(depth) => {
                debug!(target: "caserpa::session", depth, "Max call depth updated");
                self.max_call_depth = depth;
                None
            }
            SettingUpdate::Locator(tuning) => Some(tuning),
        }
    }
}
