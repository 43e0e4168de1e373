//! Readable renderings of a macro.
//!
//! - [`describe`] builds one comma-joined sentence for user confirmation.
//! - [`to_verbose`] / [`to_short_code`] swap each instruction's opcode for its
//!   verbose phrase and back. Loop headers and arguments are kept verbatim, so the
//!   translation never changes what the macro does.

use super::opcode::{OPCODES, OpcodeClass, OpcodeInfo, lookup};
use super::parser::{parse, split_instructions, split_loop_prefix};

/// Phrase used for opcodes without a description.
pub const CUSTOM_COMMAND: &str = "execute a custom command";

/// Describe a whole macro in one sentence.
pub fn describe(source: &str) -> String {
    let program = parse(source);
    let mut parts = Vec::with_capacity(program.len());

    for instruction in &program.instructions {
        let Some(code) = instruction.code else {
            continue;
        };
        let text = match lookup(code) {
            Some(info) if info.class != OpcodeClass::Loop => info.describe(&instruction.argument),
            _ => CUSTOM_COMMAND.to_string(),
        };
        let text = match instruction.loop_spec() {
            Some(spec) => match spec.span_length {
                Some(span) if span > 1 => format!(
                    "repeat the next {span} steps {} times starting with: {text}",
                    spec.repeat_count
                ),
                _ => format!("{text} ({} times)", spec.repeat_count),
            },
            None => text,
        };
        parts.push(text);
    }

    parts.join(", ")
}

/// Translate short codes to verbose phrases.
pub fn to_verbose(source: &str) -> String {
    map_segments(source, |body| {
        let mut chars = body.chars();
        let Some(code) = chars.next() else {
            return body.to_string();
        };
        match lookup(code) {
            Some(info) if info.class != OpcodeClass::Loop => {
                format!("{}{}", info.verbose, chars.as_str())
            }
            _ => body.to_string(),
        }
    })
}

/// Translate verbose phrases back to short codes.
pub fn to_short_code(source: &str) -> String {
    map_segments(source, |body| match longest_phrase(body) {
        Some(info) => format!("{}{}", info.code, &body[info.verbose.len()..]),
        None => body.to_string(),
    })
}

/// Rows of the command table: (short code, verbose phrase, example parameter).
pub fn command_table() -> impl Iterator<Item = (char, &'static str, &'static str)> {
    OPCODES
        .iter()
        .filter(|info| info.class != OpcodeClass::Loop)
        .map(|info| (info.code, info.verbose.trim_end(), info.example))
}

fn longest_phrase(body: &str) -> Option<&'static OpcodeInfo> {
    OPCODES
        .iter()
        .filter(|info| info.class != OpcodeClass::Loop && body.starts_with(info.verbose))
        .max_by_key(|info| info.verbose.len())
}

/// Apply `f` to each instruction body, keeping loop prefixes in place.
fn map_segments(source: &str, f: impl Fn(&str) -> String) -> String {
    split_instructions(source)
        .into_iter()
        .map(|segment| match split_loop_prefix(segment) {
            Some((prefix, body)) => format!("{prefix}{}", f(body)),
            None => f(segment),
        })
        .collect::<Vec<_>>()
        .join(";")
}
