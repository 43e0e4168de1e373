//! Macro tokenizer.
//!
//! Splits a macro string on `;`, strips one trailing separator, and separates each
//! segment into loop header, opcode and raw argument. Nothing is rejected here:
//! malformed loop headers are carried as [`LoopHeader::Unclosed`] or
//! [`LoopHeader::Invalid`] and reported by the validator.

use std::fmt;

/// Repeat instructions for a loop-bearing instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoopSpec {
    pub repeat_count: u32,
    /// Number of instructions in the block, counted from the loop-bearing one.
    pub span_length: Option<u32>,
}

impl LoopSpec {
    /// Block length, defaulting to the single loop-bearing instruction.
    pub fn span(&self) -> usize {
        self.span_length.unwrap_or(1) as usize
    }
}

impl fmt::Display for LoopSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span_length {
            Some(span) => write!(f, "[{span}:{}]", self.repeat_count),
            None => write!(f, "[{}]", self.repeat_count),
        }
    }
}

/// Loop header as written in the source segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopHeader {
    Valid(LoopSpec),
    /// `[` without a closing `]`.
    Unclosed,
    /// Bracket body that is neither `n` nor `span:n` (or has a zero).
    Invalid(String),
}

/// One `;`-delimited segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode character; `None` for an empty segment or a header with nothing after it.
    pub code: Option<char>,
    pub argument: String,
    pub loop_header: Option<LoopHeader>,
}

impl Instruction {
    pub fn loop_spec(&self) -> Option<LoopSpec> {
        match self.loop_header {
            Some(LoopHeader::Valid(spec)) => Some(spec),
            _ => None,
        }
    }
}

/// A parsed macro: instructions in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Macro {
    pub instructions: Vec<Instruction>,
}

impl Macro {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Parse a macro string.
pub fn parse(source: &str) -> Macro {
    let instructions = split_instructions(source)
        .into_iter()
        .map(parse_instruction)
        .collect();
    Macro { instructions }
}

/// Split on `;`, keeping the escaped form `{;}` intact and dropping one trailing `;`.
pub fn split_instructions(source: &str) -> Vec<&str> {
    if source.is_empty() {
        return Vec::new();
    }
    let source = source.strip_suffix(';').unwrap_or(source);
    let bytes = source.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b != b';' {
            continue;
        }
        let escaped = i > 0 && bytes[i - 1] == b'{' && bytes.get(i + 1) == Some(&b'}');
        if !escaped {
            out.push(&source[start..i]);
            start = i + 1;
        }
    }
    out.push(&source[start..]);
    out
}

/// Separate a leading `[...]` header from the rest of the segment.
///
/// Returns `None` when the segment does not start with `[`.
pub fn split_loop_prefix(segment: &str) -> Option<(&str, &str)> {
    if !segment.starts_with('[') {
        return None;
    }
    match segment.find(']') {
        Some(end) => Some((&segment[..=end], &segment[end + 1..])),
        None => Some((segment, "")),
    }
}

fn parse_instruction(segment: &str) -> Instruction {
    let Some(rest) = segment.strip_prefix('[') else {
        return plain_instruction(segment, None);
    };

    let Some(end) = rest.find(']') else {
        return Instruction {
            code: Some('['),
            argument: rest.to_string(),
            loop_header: Some(LoopHeader::Unclosed),
        };
    };

    let header = parse_loop_body(&rest[..end]);
    plain_instruction(&rest[end + 1..], Some(header))
}

fn plain_instruction(segment: &str, loop_header: Option<LoopHeader>) -> Instruction {
    let mut chars = segment.chars();
    let code = chars.next();
    Instruction {
        code,
        argument: chars.as_str().to_string(),
        loop_header,
    }
}

fn parse_loop_body(body: &str) -> LoopHeader {
    let invalid = || LoopHeader::Invalid(body.to_string());
    let positive = |s: &str| s.parse::<u32>().ok().filter(|n| *n >= 1);

    match body.split_once(':') {
        Some((span, count)) => match (positive(span), positive(count)) {
            (Some(span), Some(count)) => LoopHeader::Valid(LoopSpec {
                repeat_count: count,
                span_length: Some(span),
            }),
            _ => invalid(),
        },
        None => match positive(body) {
            Some(count) => LoopHeader::Valid(LoopSpec {
                repeat_count: count,
                span_length: None,
            }),
            None => invalid(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(m: &Macro) -> Vec<Option<char>> {
        m.instructions.iter().map(|i| i.code).collect()
    }

    #[test]
    fn splits_and_strips_one_trailing_separator() {
        let m = parse("e;sexplorer.exe{ENTER};t100;");
        assert_eq!(codes(&m), vec![Some('e'), Some('s'), Some('t')]);
        assert_eq!(m.instructions[1].argument, "explorer.exe{ENTER}");
        assert_eq!(m.instructions[2].argument, "100");
        assert!(m.instructions[0].argument.is_empty());
    }

    #[test]
    fn empty_source_is_empty_macro() {
        assert!(parse("").is_empty());
        // A lone separator leaves one empty segment for the validator to report.
        let m = parse("e;;x");
        assert_eq!(codes(&m), vec![Some('e'), None, Some('x')]);
    }

    #[test]
    fn escaped_separator_stays_inside_argument() {
        let m = parse("sa{;}b;e");
        assert_eq!(m.len(), 2);
        assert_eq!(m.instructions[0].argument, "a{;}b");
    }

    #[test]
    fn loop_header_is_fused_with_first_instruction() {
        let m = parse("[3]fbutton.png;[2:5]n;l1:2");
        let first = &m.instructions[0];
        assert_eq!(first.code, Some('f'));
        assert_eq!(first.argument, "button.png");
        assert_eq!(
            first.loop_spec(),
            Some(LoopSpec {
                repeat_count: 3,
                span_length: None
            })
        );
        let second = &m.instructions[1];
        assert_eq!(second.code, Some('n'));
        assert_eq!(second.loop_spec().map(|s| s.span()), Some(2));
        assert_eq!(second.loop_spec().map(|s| s.repeat_count), Some(5));
        assert!(m.instructions[2].loop_header.is_none());
    }

    #[test]
    fn malformed_loop_headers_are_preserved() {
        let m = parse("[3fbutton.png;[x]e;[0]e;[1:]e;[2]");
        assert_eq!(m.instructions[0].loop_header, Some(LoopHeader::Unclosed));
        assert_eq!(m.instructions[0].code, Some('['));
        assert_eq!(
            m.instructions[1].loop_header,
            Some(LoopHeader::Invalid("x".into()))
        );
        assert_eq!(
            m.instructions[2].loop_header,
            Some(LoopHeader::Invalid("0".into()))
        );
        assert_eq!(
            m.instructions[3].loop_header,
            Some(LoopHeader::Invalid("1:".into()))
        );
        assert_eq!(m.instructions[4].code, None);
        assert!(m.instructions[4].loop_spec().is_some());
    }

    #[test]
    fn loop_prefix_split() {
        assert_eq!(split_loop_prefix("[2:3]fa.png"), Some(("[2:3]", "fa.png")));
        assert_eq!(split_loop_prefix("[2"), Some(("[2", "")));
        assert_eq!(split_loop_prefix("fa.png"), None);
    }

    #[test]
    fn loop_spec_display() {
        let spec = LoopSpec {
            repeat_count: 3,
            span_length: Some(2),
        };
        assert_eq!(spec.to_string(), "[2:3]");
    }
}
