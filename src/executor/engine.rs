//! Macro execution.
//!
//! Instructions run strictly in order on the calling thread. A loop-bearing
//! instruction runs its block (itself plus the following `span - 1`
//! instructions) `repeat_count` times before execution moves past the block.
//! Loops inside a block are honoured but clamped to the enclosing block.
//!
//! After every instruction, including each pass inside loops, the session's
//! inter-instruction delay is applied.
//!
//! Failure policy:
//! - Image locates without a timeout block until found.
//! - A `TimedOut` locate stops the whole execution, nested frames included.
//! - Exceeding the call-depth limit for `z` stops the execution as `Aborted`.
//! - Injector failures, unreadable files, unknown commands and malformed
//!   arguments are logged and the instruction is skipped.

use std::fmt;
use std::fs;
use std::ops::ControlFlow;
use std::time::Duration;

use tracing::{debug, info, info_span, trace, warn};

use crate::executor::services::{MouseButton, Services};
use crate::executor::session::{Session, SettingUpdate};
use crate::locator::{ImageRef, LocateMode, LocateResult, Point};
use crate::macros::opcode::{Opcode, lookup};
use crate::macros::validator::parse_timeout_argument;
use crate::macros::{Instruction, Macro, parse, to_injection_form};

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every instruction ran; `executed` counts instruction runs including loop passes.
    Completed { executed: usize },
    /// A bounded image wait expired at 1-based `index` of the frame it ran in.
    TimedOut { index: usize, image: String },
    /// Execution stopped by a guard at 1-based `index`.
    Aborted { index: usize, reason: String },
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed { executed } => write!(f, "completed ({executed} instructions)"),
            Outcome::TimedOut { index, image } => {
                write!(f, "Not Found: timed out waiting for {image} at command {index}")
            }
            Outcome::Aborted { index, reason } => write!(f, "aborted at command {index}: {reason}"),
        }
    }
}

/// Execute `program` against `services`.
pub fn execute(program: &Macro, services: &mut Services<'_>, session: &mut Session) -> Outcome {
    let run_id: u32 = rand::random();
    let span = info_span!(target: "caserpa::engine", "macro", run_id);
    let _entered = span.enter();

    info!(
        target: "caserpa::engine",
        instructions = program.len(),
        delay_ms = session.command_delay().as_millis() as u64,
        "Starting macro"
    );

    let mut engine = Engine {
        services,
        session,
        executed: 0,
    };
    let outcome = match engine.run_frame(program, 0) {
        ControlFlow::Continue(()) => Outcome::Completed {
            executed: engine.executed,
        },
        ControlFlow::Break(outcome) => outcome,
    };

    info!(target: "caserpa::engine", %outcome, "Macro finished");
    outcome
}

struct Engine<'e, 'a> {
    services: &'e mut Services<'a>,
    session: &'e mut Session,
    executed: usize,
}

impl Engine<'_, '_> {
    fn run_frame(&mut self, program: &Macro, depth: usize) -> ControlFlow<Outcome> {
        self.run_range(program, 0, program.len(), depth)
    }

    fn run_range(
        &mut self,
        program: &Macro,
        start: usize,
        end: usize,
        depth: usize,
    ) -> ControlFlow<Outcome> {
        let mut i = start;
        while i < end {
            let instruction = &program.instructions[i];
            match instruction.loop_spec() {
                Some(spec) => {
                    let block_end = (i + spec.span()).min(end);
                    for pass in 0..spec.repeat_count {
                        trace!(
                            target: "caserpa::engine",
                            position = i + 1, block_len = block_end - i, pass, depth,
                            "Loop pass"
                        );
                        self.step(instruction, i + 1, depth)?;
                        self.run_range(program, i + 1, block_end, depth)?;
                    }
                    i = block_end;
                }
                None => {
                    self.step(instruction, i + 1, depth)?;
                    i += 1;
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn step(&mut self, instruction: &Instruction, position: usize, depth: usize) -> ControlFlow<Outcome> {
        self.dispatch(instruction, position, depth)?;
        self.executed += 1;
        self.session.pause(self.session.command_delay());
        ControlFlow::Continue(())
    }

    fn dispatch(
        &mut self,
        instruction: &Instruction,
        position: usize,
        depth: usize,
    ) -> ControlFlow<Outcome> {
        let Some(code) = instruction.code else {
            warn!(target: "caserpa::engine", position, "Empty instruction; skipping");
            return ControlFlow::Continue(());
        };
        let Some(info) = lookup(code) else {
            warn!(target: "caserpa::engine", position, %code, "Unknown opcode; skipping");
            return ControlFlow::Continue(());
        };
        let argument = instruction.argument.as_str();
        debug!(target: "caserpa::engine", position, depth, %code, argument, "Executing instruction");

        match info.opcode {
            Opcode::StartMenu => self.inject("^{ESC}"),
            Opcode::Maximize => self.inject("%( x)"),
            Opcode::Minimize => self.inject("%( n)"),
            Opcode::Copy => self.inject("^c"),
            Opcode::Paste => self.inject("^v"),
            Opcode::SelectAll => self.inject("^a"),
            Opcode::Screenshot => {
                if let Err(e) = self.services.injector.capture_screen() {
                    warn!(target: "caserpa::engine", error = %e, "Screen capture failed");
                }
            }
            Opcode::Type => self.type_text(argument),
            Opcode::LeftClick => self.click_literal(argument, MouseButton::Left),
            Opcode::RightClick => self.click_literal(argument, MouseButton::Right),
            Opcode::Sleep => match argument.parse::<u64>() {
                Ok(ms) => self.session.pause(Duration::from_millis(ms)),
                Err(_) => warn!(target: "caserpa::engine", argument, "Invalid sleep duration; skipping"),
            },
            Opcode::UpdateSetting => self.update_setting(argument),
            Opcode::RunCommand => return self.run_command(argument, position, depth),
            Opcode::AltTab => {
                if let Some(n) = repeat_count(argument) {
                    self.inject(&format!("%({})", "{TAB}".repeat(n)));
                }
            }
            Opcode::Tab if argument.is_empty() => self.inject("{TAB}"),
            Opcode::Tab => {
                if let Some(n) = repeat_count(argument) {
                    for _ in 0..n {
                        self.inject("{TAB}");
                        self.session.pause(self.session.command_delay());
                    }
                }
            }
            Opcode::Drag => return self.drag(argument, position),
            Opcode::FindAndClick
            | Opcode::DoubleClickImage
            | Opcode::FindAndRightClick
            | Opcode::DoubleRightClickImage
            | Opcode::WaitForImage => return self.locate_and_act(info.opcode, argument, position),
            Opcode::WaitForImageWithTimeout => return self.wait_with_timeout(argument, position),
            Opcode::ClickLastInstance => self.click_last_instance(argument),
            Opcode::Loop => {
                warn!(target: "caserpa::engine", position, "Malformed loop header; skipping");
            }
        }
        ControlFlow::Continue(())
    }

    fn inject(&mut self, text: &str) {
        if let Err(e) = self.services.injector.send_text(text) {
            warn!(target: "caserpa::engine", %text, error = %e, "Input injection failed");
        }
    }

    fn click(&mut self, at: Point, button: MouseButton) {
        if let Err(e) = self.services.injector.click(at, button) {
            warn!(target: "caserpa::engine", %at, ?button, error = %e, "Click failed");
        }
    }

    fn double_click(&mut self, at: Point, button: MouseButton) {
        let gap = self.session.timings().double_click_gap;
        if let Err(e) = self.services.injector.double_click(at, button, gap) {
            warn!(target: "caserpa::engine", %at, ?button, error = %e, "Double click failed");
        }
    }

    /// `s<text>` injects as-is; `s(<path>)` injects the escaped file contents.
    fn type_text(&mut self, argument: &str) {
        let file = argument
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'));
        match file {
            Some(path) => match fs::read_to_string(path) {
                Ok(text) => self.inject(&to_injection_form(&text)),
                Err(e) => warn!(
                    target: "caserpa::engine",
                    %path, error = %e,
                    "File does not exist; skipping text injection"
                ),
            },
            None => self.inject(argument),
        }
    }

    fn click_literal(&mut self, argument: &str, button: MouseButton) {
        match argument.parse::<Point>() {
            Ok(at) => self.click(at, button),
            Err(e) => warn!(target: "caserpa::engine", error = %e, "Invalid coordinates; skipping"),
        }
    }

    fn update_setting(&mut self, argument: &str) {
        let Some((key, value)) = argument.split_once(':') else {
            warn!(target: "caserpa::engine", argument, "Settings update needs key:value; skipping");
            return;
        };
        let update = match SettingUpdate::parse(key, value) {
            Ok(update) => update,
            Err(e) => {
                warn!(target: "caserpa::engine", %key, error = %e, "Settings update rejected");
                return;
            }
        };
        if let Some(tuning) = self.session.apply(update) {
            if !self.services.locator.tune(tuning) {
                warn!(target: "caserpa::engine", %key, "Screen locator does not support this setting");
            }
        }
    }

    fn run_command(&mut self, name: &str, position: usize, depth: usize) -> ControlFlow<Outcome> {
        let max = self.session.max_call_depth();
        if depth + 1 > max {
            warn!(target: "caserpa::engine", command = %name, max, "Maximum call depth exceeded");
            return ControlFlow::Break(Outcome::Aborted {
                index: position,
                reason: format!("maximum call depth ({max}) exceeded running '{name}' (possible cycle)"),
            });
        }

        let code = self
            .services
            .commands
            .lookup(name)
            .filter(|code| !code.trim().is_empty());
        let Some(code) = code else {
            warn!(
                target: "caserpa::engine",
                command = %name,
                "Command does not exist, not able to execute"
            );
            return ControlFlow::Continue(());
        };

        info!(target: "caserpa::engine", command = %name, depth = depth + 1, "Running stored command");
        let nested = parse(&code);
        self.run_frame(&nested, depth + 1)
    }

    fn locate(&mut self, image: &ImageRef, mode: LocateMode, position: usize) -> ControlFlow<Outcome, Point> {
        match self.services.locator.locate(image, mode) {
            LocateResult::Found(at) => ControlFlow::Continue(at),
            LocateResult::TimedOut => ControlFlow::Break(Outcome::TimedOut {
                index: position,
                image: image.file.clone(),
            }),
        }
    }

    fn locate_and_act(&mut self, opcode: Opcode, argument: &str, position: usize) -> ControlFlow<Outcome> {
        let image = match ImageRef::parse(argument) {
            Ok(image) => image,
            Err(e) => {
                warn!(target: "caserpa::engine", error = %e, "Invalid image reference; skipping");
                return ControlFlow::Continue(());
            }
        };
        let at = self.locate(&image, LocateMode::WaitForever, position)?;
        let timings = *self.session.timings();

        match opcode {
            Opcode::FindAndClick => self.click(at, MouseButton::Left),
            Opcode::FindAndRightClick => self.click(at, MouseButton::Right),
            Opcode::DoubleClickImage => {
                self.session.pause(timings.pre_double_click);
                self.double_click(at, MouseButton::Left);
            }
            Opcode::DoubleRightClickImage => {
                self.session.pause(timings.pre_double_click);
                self.double_click(at, MouseButton::Right);
            }
            _ => debug!(target: "caserpa::engine", image = %image, %at, "Image present"),
        }
        ControlFlow::Continue(())
    }

    fn wait_with_timeout(&mut self, argument: &str, position: usize) -> ControlFlow<Outcome> {
        let (image, timeout_ms) = match parse_timeout_argument(argument) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(target: "caserpa::engine", error = %e, "Invalid timed wait; skipping");
                return ControlFlow::Continue(());
            }
        };
        let mode = LocateMode::Timeout(Duration::from_millis(timeout_ms));
        let at = self.locate(&image, mode, position)?;
        debug!(target: "caserpa::engine", image = %image, %at, "Image appeared before timeout");
        ControlFlow::Continue(())
    }

    /// Double click on the last on-screen instance of an image.
    fn click_last_instance(&mut self, argument: &str) {
        let image = match ImageRef::parse(argument) {
            Ok(image) => image,
            Err(e) => {
                warn!(target: "caserpa::engine", error = %e, "Invalid image reference; skipping");
                return;
            }
        };
        let points = self.services.locator.locate_all(&image);
        let Some(&at) = points.last() else {
            warn!(target: "caserpa::engine", image = %image, "No instances found; skipping");
            return;
        };
        debug!(target: "caserpa::engine", image = %image, count = points.len(), %at, "Acting on last instance");
        self.session.pause(self.session.timings().last_instance_delay);
        self.double_click(at, MouseButton::Left);
    }

    fn drag(&mut self, argument: &str, position: usize) -> ControlFlow<Outcome> {
        let Some((from, to)) = argument.split_once(',') else {
            warn!(target: "caserpa::engine", argument, "Drag needs two endpoints; skipping");
            return ControlFlow::Continue(());
        };
        let (Some(start), Some(end)) = (self.endpoint(from, position)?, self.endpoint(to, position)?)
        else {
            return ControlFlow::Continue(());
        };

        if let Err(e) = self.services.injector.move_and_hold(start) {
            warn!(target: "caserpa::engine", at = %start, error = %e, "Drag press failed");
            return ControlFlow::Continue(());
        }
        self.session.pause(self.session.timings().drag_hold);
        if let Err(e) = self.services.injector.release(end) {
            warn!(target: "caserpa::engine", at = %end, error = %e, "Drag release failed");
        }
        ControlFlow::Continue(())
    }

    /// Literal `x:y`, or the located point of an image reference.
    fn endpoint(&mut self, side: &str, position: usize) -> ControlFlow<Outcome, Option<Point>> {
        if let Ok(at) = side.parse::<Point>() {
            return ControlFlow::Continue(Some(at));
        }
        match ImageRef::parse(side) {
            Ok(image) => {
                let at = self.locate(&image, LocateMode::WaitForever, position)?;
                ControlFlow::Continue(Some(at))
            }
            Err(e) => {
                warn!(target: "caserpa::engine", endpoint = side, error = %e, "Invalid drag endpoint; skipping");
                ControlFlow::Continue(None)
            }
        }
    }
}

/// Repeat count of `a`/`n`: empty means once.
fn repeat_count(argument: &str) -> Option<usize> {
    if argument.is_empty() {
        return Some(1);
    }
    match argument.parse::<usize>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(target: "caserpa::engine", argument, "Invalid repeat count; skipping");
            None
        }
    }
}
