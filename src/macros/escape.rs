//! Text -> injection-form conversion.
//!
//! The injection form is the key syntax understood by `InputInjector::send_text`:
//! `{NAME}` named keys, `^ % +` modifiers, `~` for enter, and `( )` groups. Plain
//! text must have those characters escaped before it can be injected verbatim.

/// Token every newline (`\r\n`, `\r` or `\n`) collapses to.
pub const SUBMIT_TOKEN: &str = "{ENTER}";

/// Control tokens copied through unescaped.
pub const CONTROL_TOKENS: [&str; 31] = [
    "{ENTER}",
    "{UP}",
    "{DOWN}",
    "{LEFT}",
    "{RIGHT}",
    "{HOME}",
    "{END}",
    "{PGUP}",
    "{PGDN}",
    "{INSERT}",
    "{DELETE}",
    "{TAB}",
    "{ESC}",
    "{BACKSPACE}",
    "{BREAK}",
    "{CAPSLOCK}",
    "{CLEAR}",
    "{NUMLOCK}",
    "{SCROLLLOCK}",
    "{F1}",
    "{F2}",
    "{F3}",
    "{F4}",
    "{F5}",
    "{F6}",
    "{F7}",
    "{F8}",
    "{F9}",
    "{F10}",
    "{F11}",
    "{F12}",
];

/// Escaped form of a syntactically significant character, if it is one.
pub fn escape_char(c: char) -> Option<&'static str> {
    Some(match c {
        '{' => "{{}",
        '}' => "{}}",
        '(' => "{(}",
        ')' => "{)}",
        '+' => "{+}",
        '^' => "{^}",
        '%' => "{%}",
        '~' => "{~}",
        '[' => "{[}",
        ']' => "{]}",
        ';' => "{;}",
        _ => return None,
    })
}

/// Convert arbitrary text into injection form.
pub fn to_injection_form(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c == '{' {
            if let Some(token) = CONTROL_TOKENS.iter().find(|t| rest.starts_with(**t)) {
                out.push_str(token);
                rest = &rest[token.len()..];
                continue;
            }
        }

        if c == '\r' || c == '\n' {
            out.push_str(SUBMIT_TOKEN);
            let skip = if rest.starts_with("\r\n") { 2 } else { 1 };
            rest = &rest[skip..];
            continue;
        }

        match escape_char(c) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(c),
        }
        rest = &rest[c.len_utf8()..];
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_braces_are_escaped() {
        assert_eq!(to_injection_form("a{b}c"), "a{{}b{}}c");
    }

    #[test]
    fn control_tokens_pass_through() {
        assert_eq!(to_injection_form("go{ENTER}now"), "go{ENTER}now");
        assert_eq!(to_injection_form("{F12}{TAB}"), "{F12}{TAB}");
        // Not on the allow-list: braces get escaped.
        assert_eq!(to_injection_form("{enter}"), "{{}enter{}}");
    }

    #[test]
    fn newlines_collapse_to_one_submit_each() {
        assert_eq!(to_injection_form("a\r\nb"), "a{ENTER}b");
        assert_eq!(to_injection_form("a\rb\nc"), "a{ENTER}b{ENTER}c");
        assert_eq!(to_injection_form("\n\n"), "{ENTER}{ENTER}");
    }

    #[test]
    fn special_characters() {
        assert_eq!(to_injection_form("50% (1+1)^2~"), "50{%} {(}1{+}1{)}{^}2{~}");
        assert_eq!(to_injection_form("[a;b]"), "{[}a{;}b{]}");
        assert_eq!(to_injection_form("héllo"), "héllo");
    }

    #[test]
    fn idempotent_on_tokens_and_plain_text() {
        for x in ["hello {ENTER} world", "{TAB}{TAB}x", "line one\nline two", ""] {
            let once = to_injection_form(x);
            assert_eq!(to_injection_form(&once), once);
        }
    }
}
