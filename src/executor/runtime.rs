use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::config::Config;
use crate::executor::actions::EnigoInjector;
use crate::executor::engine::{Outcome, execute};
use crate::executor::services::{InputInjector, Services};
use crate::executor::session::Session;
use crate::locator::{FixedMatcher, PollingLocator, ScreenLocator, UnavailableMatcher};
use crate::macros::{ValidationOutcome, describe, parse, to_short_code, validate};
use crate::sources::TriggerRequest;

/// Runtime is responsible for:
/// - validating and describing macro text against the loaded config
/// - resolving stored commands and trigger requests to macro text
/// - running macros through the engine with the configured injector and locator
///
/// The `Session` lives as long as the runtime: a `uCommandDelay` change made by
/// one run stays in effect for the runs after it.
pub struct Runtime {
    config: Config,
    session: Session,
    injector: Box<dyn InputInjector>,
    locator: Box<dyn ScreenLocator>,
}

impl Runtime {
    /// Create a runtime with the Enigo injector.
    ///
    /// In dry-run mode input is only logged and every image is "found" at a fixed
    /// point. Live mode has no pixel matcher, so image waits never succeed.
    pub fn new(config: Config, dry_run: bool) -> Self {
        let engine = &config.engine;
        let poll = Duration::from_millis(engine.poll_interval_ms);
        let locator: Box<dyn ScreenLocator> = if dry_run {
            Box::new(PollingLocator::new(
                FixedMatcher::default(),
                &engine.image_directory,
                poll,
                engine.match_threshold,
            ))
        } else {
            warn!(
                target: "caserpa::runtime",
                "No screen matcher available; image instructions will wait indefinitely"
            );
            Box::new(PollingLocator::new(
                UnavailableMatcher,
                &engine.image_directory,
                poll,
                engine.match_threshold,
            ))
        };
        Self::with_backends(config, Box::new(EnigoInjector::new(dry_run)), locator)
    }

    /// Create a runtime over caller-supplied backends.
    pub fn with_backends(
        config: Config,
        injector: Box<dyn InputInjector>,
        locator: Box<dyn ScreenLocator>,
    ) -> Self {
        let session = Session::new(&config.engine);
        Self {
            config,
            session,
            injector,
            locator,
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Session state shared by every run.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Validate macro text against this runtime's commands and settings.
    pub fn validate(&self, text: &str) -> ValidationOutcome {
        validate(&parse(text), &self.config, &self.config)
    }

    pub fn describe(&self, text: &str) -> String {
        describe(text)
    }

    /// Validate, then execute macro text.
    pub fn run_macro(&mut self, text: &str) -> Result<Outcome> {
        let outcome = self.validate(text);
        if !outcome.is_valid() {
            bail!("{outcome}");
        }
        info!(target: "caserpa::runtime", description = %describe(text), "Executing macro");

        let program = parse(text);
        let mut services = Services {
            locator: self.locator.as_mut(),
            injector: self.injector.as_mut(),
            commands: &self.config,
        };
        Ok(execute(&program, &mut services, &mut self.session))
    }

    /// Run a stored command by name.
    pub fn run_command(&mut self, name: &str) -> Result<Outcome> {
        let Some(code) = self.config.commands.get(name).cloned() else {
            bail!("Command '{name}' does not exist");
        };
        info!(target: "caserpa::runtime", command = %name, "Running stored command");
        self.run_macro(&code)
    }

    /// Dispatch a trigger request.
    pub fn run_trigger(&mut self, request: &TriggerRequest) -> Result<Outcome> {
        match request {
            TriggerRequest::Execute {
                macro_text,
                verbose,
            } => {
                let code = if *verbose {
                    to_short_code(macro_text)
                } else {
                    macro_text.clone()
                };
                self.run_macro(&code)
            }
            TriggerRequest::Command { name } => self.run_command(name),
        }
    }
}
