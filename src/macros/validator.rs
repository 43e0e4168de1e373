//! Static validation of a parsed macro.
//!
//! Walks instructions in order and stops at the first failure, reporting its
//! 1-based position. The only side effects are read-only lookups against the
//! command and settings collaborators.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use super::opcode::{ArgShape, OpcodeClass, lookup};
use super::parser::{Instruction, LoopHeader, Macro};
use crate::executor::services::{CommandResolver, SettingsStore};
use crate::executor::session::{SettingError, SettingUpdate};
use crate::locator::{ImageRef, Point};

/// Unsigned `x:y` coordinate group.
static COORDINATE_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:\d+$").expect("valid coordinate pattern"));

/// Everything the validator (and argument parsing at run time) can reject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    #[error("empty instruction")]
    EmptyInstruction,
    #[error("unknown opcode '{0}'")]
    UnknownOpcode(char),
    #[error("no-argument opcode '{code}' should not have parameters (got '{argument}')")]
    UnexpectedArgument { code: char, argument: String },
    #[error("coordinates must be in the form x:y (got '{0}')")]
    ExpectedPoint(String),
    #[error("'{code}' requires a non-negative integer (got '{argument}')")]
    ExpectedInteger { code: char, argument: String },
    #[error("'{0}' needs a setting to update and a value, e.g. CommandDelay:1000")]
    ExpectedSetting(char),
    #[error("setting '{0}' does not exist")]
    UnknownSetting(String),
    #[error(transparent)]
    Setting(#[from] SettingError),
    #[error("command '{0}' does not exist in command storage")]
    UnknownCommand(String),
    #[error("drag needs two endpoints 'a,b', each x:y or an image (got '{0}')")]
    ExpectedEndpoints(String),
    #[error("image detection requires a .png file as a parameter (got '{0}')")]
    ExpectedImage(String),
    #[error("invalid click parameter '{0}'")]
    InvalidAnchor(String),
    #[error("'v' requires 'image.png,<timeout ms>' (got '{0}')")]
    ExpectedTimeout(String),
    #[error("loop command missing closing bracket ']'")]
    UnclosedLoop,
    #[error("invalid loop syntax '[{0}]'")]
    InvalidLoop(String),
    #[error("loop header must be followed by an instruction")]
    EmptyLoopBody,
    #[error("loop block of {span} instructions runs past the end of the macro")]
    LoopPastEnd { span: usize },
}

/// Result of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid {
        /// 1-based instruction position.
        instruction_index: usize,
        message: String,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Valid => f.write_str("Valid"),
            ValidationOutcome::Invalid {
                instruction_index,
                message,
            } => write!(f, "Error at command {instruction_index}: {message}"),
        }
    }
}

/// Validate every instruction of `program`.
pub fn validate(
    program: &Macro,
    commands: &dyn CommandResolver,
    settings: &dyn SettingsStore,
) -> ValidationOutcome {
    let total = program.len();
    for (i, instruction) in program.instructions.iter().enumerate() {
        if let Err(e) = check_instruction(instruction, i, total, commands, settings) {
            return ValidationOutcome::Invalid {
                instruction_index: i + 1,
                message: e.to_string(),
            };
        }
    }
    ValidationOutcome::Valid
}

fn check_instruction(
    instruction: &Instruction,
    position: usize,
    total: usize,
    commands: &dyn CommandResolver,
    settings: &dyn SettingsStore,
) -> Result<(), MacroError> {
    if let Some(header) = &instruction.loop_header {
        match header {
            LoopHeader::Unclosed => return Err(MacroError::UnclosedLoop),
            LoopHeader::Invalid(body) => return Err(MacroError::InvalidLoop(body.clone())),
            LoopHeader::Valid(spec) => {
                if instruction.code.is_none() {
                    return Err(MacroError::EmptyLoopBody);
                }
                if position + spec.span() > total {
                    return Err(MacroError::LoopPastEnd { span: spec.span() });
                }
            }
        }
    }

    let code = instruction.code.ok_or(MacroError::EmptyInstruction)?;
    let info = lookup(code).ok_or(MacroError::UnknownOpcode(code))?;
    let argument = instruction.argument.as_str();

    match info.class {
        OpcodeClass::NoArg => {
            if !argument.is_empty() {
                return Err(MacroError::UnexpectedArgument {
                    code,
                    argument: argument.to_string(),
                });
            }
        }
        OpcodeClass::SingleArg => check_single(code, info.shape, argument, commands, settings)?,
        OpcodeClass::DoubleArg => check_endpoints(argument)?,
        OpcodeClass::ImageLocate | OpcodeClass::ImageLocateAll => {
            if info.shape == ArgShape::ImageWithTimeout {
                parse_timeout_argument(argument)?;
            } else {
                ImageRef::parse(argument)?;
            }
        }
        // A loop opcode only survives parsing when its header was malformed,
        // which is reported above.
        OpcodeClass::Loop => return Err(MacroError::UnclosedLoop),
    }
    Ok(())
}

fn check_single(
    code: char,
    shape: ArgShape,
    argument: &str,
    commands: &dyn CommandResolver,
    settings: &dyn SettingsStore,
) -> Result<(), MacroError> {
    let expected_integer = || MacroError::ExpectedInteger {
        code,
        argument: argument.to_string(),
    };
    match shape {
        ArgShape::Point => {
            argument.parse::<Point>()?;
        }
        ArgShape::Millis => {
            argument.parse::<u64>().map_err(|_| expected_integer())?;
        }
        ArgShape::Count => {
            if !argument.is_empty() {
                argument.parse::<u32>().map_err(|_| expected_integer())?;
            }
        }
        ArgShape::Setting => {
            let (key, value) = argument
                .split_once(':')
                .ok_or(MacroError::ExpectedSetting(code))?;
            if key.is_empty() {
                return Err(MacroError::ExpectedSetting(code));
            }
            if !settings.exists(key) {
                return Err(MacroError::UnknownSetting(key.to_string()));
            }
            SettingUpdate::parse(key, value)?;
        }
        ArgShape::CommandName => {
            let resolved = commands
                .lookup(argument)
                .filter(|code| !code.trim().is_empty());
            if resolved.is_none() {
                return Err(MacroError::UnknownCommand(argument.to_string()));
            }
        }
        // Free text.
        _ => {}
    }
    Ok(())
}

fn check_endpoints(argument: &str) -> Result<(), MacroError> {
    let invalid = || MacroError::ExpectedEndpoints(argument.to_string());
    let (from, to) = argument.split_once(',').ok_or_else(invalid)?;
    for side in [from, to] {
        if COORDINATE_PAIR.is_match(side) {
            continue;
        }
        if ImageRef::parse(side).is_err() {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Split `image.png[<anchor>],<ms>` into its image and timeout.
pub fn parse_timeout_argument(argument: &str) -> Result<(ImageRef, u64), MacroError> {
    let (image, timeout) = argument
        .rsplit_once(',')
        .ok_or_else(|| MacroError::ExpectedTimeout(argument.to_string()))?;
    let timeout = timeout
        .trim()
        .parse::<u64>()
        .map_err(|_| MacroError::ExpectedTimeout(argument.to_string()))?;
    Ok((ImageRef::parse(image)?, timeout))
}
