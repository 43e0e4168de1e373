//! Static opcode registry.
//!
//! Every opcode of the macro language has exactly one entry in [`OPCODES`]. The
//! table is immutable and shared process-wide; dispatch in the executor matches on
//! [`Opcode`] so that adding a variant forces every consumer to handle it.

use super::IMAGE_EXTENSION;

/// Argument contract families.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OpcodeClass {
    NoArg,
    SingleArg,
    DoubleArg,
    ImageLocate,
    ImageLocateAll,
    Loop,
}

/// The concrete argument shape within a class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArgShape {
    /// No argument at all.
    Empty,
    /// Key-injection text, passed through (or `(path)` to inject a file's text).
    Text,
    /// `x:y` screen coordinate.
    Point,
    /// Non-negative integer of milliseconds.
    Millis,
    /// Optional non-negative repeat count; empty means once.
    Count,
    /// `key:value` settings update.
    Setting,
    /// Name of a stored command.
    CommandName,
    /// Two endpoints separated by `,`; each is `x:y` or an image reference.
    Endpoints,
    /// Image reference with optional `<anchor>`.
    Image,
    /// Image reference followed by `,<timeout ms>`.
    ImageWithTimeout,
    /// Loop header sentinel.
    LoopHeader,
}

/// Every operation the macro language knows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    StartMenu,
    Maximize,
    Minimize,
    Screenshot,
    Copy,
    Paste,
    SelectAll,
    Type,
    LeftClick,
    RightClick,
    Sleep,
    UpdateSetting,
    RunCommand,
    AltTab,
    Tab,
    Drag,
    FindAndClick,
    DoubleClickImage,
    FindAndRightClick,
    DoubleRightClickImage,
    WaitForImage,
    WaitForImageWithTimeout,
    ClickLastInstance,
    Loop,
}

/// One registry row.
#[derive(Debug)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub code: char,
    pub class: OpcodeClass,
    pub shape: ArgShape,
    /// Verbose phrase used by the short-code <-> verbose translation.
    pub verbose: &'static str,
    /// Example argument shown in the command table.
    pub example: &'static str,
    describe: fn(&str) -> String,
}

impl OpcodeInfo {
    /// Human-readable description of this opcode applied to `argument`.
    pub fn describe(&self, argument: &str) -> String {
        (self.describe)(argument)
    }
}

impl Opcode {
    /// Registry row for this opcode.
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODES[self.row()]
    }

    /// Position in [`OPCODES`].
    const fn row(self) -> usize {
        match self {
            Opcode::StartMenu => 0,
            Opcode::Maximize => 1,
            Opcode::Minimize => 2,
            Opcode::Screenshot => 3,
            Opcode::Copy => 4,
            Opcode::Paste => 5,
            Opcode::SelectAll => 6,
            Opcode::Type => 7,
            Opcode::LeftClick => 8,
            Opcode::RightClick => 9,
            Opcode::Sleep => 10,
            Opcode::UpdateSetting => 11,
            Opcode::RunCommand => 12,
            Opcode::AltTab => 13,
            Opcode::Tab => 14,
            Opcode::Drag => 15,
            Opcode::FindAndClick => 16,
            Opcode::DoubleClickImage => 17,
            Opcode::FindAndRightClick => 18,
            Opcode::DoubleRightClickImage => 19,
            Opcode::WaitForImage => 20,
            Opcode::WaitForImageWithTimeout => 21,
            Opcode::ClickLastInstance => 22,
            Opcode::Loop => 23,
        }
    }

    pub fn code(self) -> char {
        self.info().code
    }

    pub fn class(self) -> OpcodeClass {
        self.info().class
    }
}

/// Find the registry row for an opcode character.
pub fn lookup(code: char) -> Option<&'static OpcodeInfo> {
    OPCODES.iter().find(|info| info.code == code)
}

macro_rules! op {
    ($opcode:ident, $code:literal, $class:ident, $shape:ident, $verbose:literal, $example:literal, $describe:expr) => {
        OpcodeInfo {
            opcode: Opcode::$opcode,
            code: $code,
            class: OpcodeClass::$class,
            shape: ArgShape::$shape,
            verbose: $verbose,
            example: $example,
            describe: $describe,
        }
    };
}

/// The registry, in `Opcode` declaration order.
pub static OPCODES: [OpcodeInfo; 24] = [
    op!(StartMenu, 'e', NoArg, Empty, "Start Menu", "", describe_start_menu),
    op!(Maximize, 'x', NoArg, Empty, "Maximize", "", describe_maximize),
    op!(Minimize, 'y', NoArg, Empty, "Minimize", "", describe_minimize),
    op!(Screenshot, 'c', NoArg, Empty, "Screenshot", "", describe_screenshot),
    op!(Copy, 'p', NoArg, Empty, "Copy To Clipboard", "", describe_copy),
    op!(Paste, 'o', NoArg, Empty, "Paste From Clipboard", "", describe_paste),
    op!(SelectAll, 'i', NoArg, Empty, "Select All", "", describe_select_all),
    op!(Type, 's', SingleArg, Text, "Type: ", "Text to Type{ENTER}", describe_type),
    op!(LeftClick, 'l', SingleArg, Point, "Left Click: ", "100:100", describe_left_click),
    op!(RightClick, 'r', SingleArg, Point, "Right Click: ", "100:100", describe_right_click),
    op!(Sleep, 't', SingleArg, Millis, "Sleep: ", "1000", describe_sleep),
    op!(
        UpdateSetting,
        'u',
        SingleArg,
        Setting,
        "Update Command Timer: ",
        "CommandDelay:1000",
        describe_update_setting
    ),
    op!(
        RunCommand,
        'z',
        SingleArg,
        CommandName,
        "Run Command: ",
        "NameOfCommand",
        describe_run_command
    ),
    op!(AltTab, 'a', SingleArg, Count, "Alt+Tab: ", "2", describe_alt_tab),
    op!(Tab, 'n', SingleArg, Count, "Tab: ", "5", describe_tab),
    op!(
        Drag,
        'd',
        DoubleArg,
        Endpoints,
        "Click And Drag: ",
        "100:100,200:200",
        describe_drag
    ),
    op!(
        FindAndClick,
        'f',
        ImageLocate,
        Image,
        "Find And Click: ",
        "image.png",
        describe_find_and_click
    ),
    op!(
        DoubleClickImage,
        'g',
        ImageLocate,
        Image,
        "Double Click On Image: ",
        "image.png",
        describe_double_click_image
    ),
    op!(
        FindAndRightClick,
        'j',
        ImageLocate,
        Image,
        "Find And Right Click: ",
        "image.png",
        describe_find_and_right_click
    ),
    op!(
        DoubleRightClickImage,
        'k',
        ImageLocate,
        Image,
        "Double Right Click On Image: ",
        "image.png",
        describe_double_right_click_image
    ),
    op!(
        WaitForImage,
        'h',
        ImageLocate,
        Image,
        "Wait For Image: ",
        "image.png",
        describe_wait_for_image
    ),
    op!(
        WaitForImageWithTimeout,
        'v',
        ImageLocate,
        ImageWithTimeout,
        "Wait For Image With Timeout: ",
        "image.png,1000",
        describe_wait_with_timeout
    ),
    op!(
        ClickLastInstance,
        'q',
        ImageLocateAll,
        Image,
        "Find And Click Last Instance: ",
        "image.png",
        describe_click_last_instance
    ),
    op!(Loop, '[', Loop, LoopHeader, "", "[3] or [2:3]", describe_loop),
];

/// Strip the extension and any anchor/timeout suffix for display.
fn image_name(argument: &str) -> String {
    let base = argument
        .split(['<', ','])
        .next()
        .unwrap_or(argument);
    base.replace(IMAGE_EXTENSION, "")
}

/// Split `a:b` for display; a missing half renders as `?`.
fn coordinates(argument: &str) -> (&str, &str) {
    match argument.split_once(':') {
        Some((x, y)) => (x, y),
        None => (argument, "?"),
    }
}

fn times(argument: &str) -> String {
    let n = if argument.is_empty() { "1" } else { argument };
    if n == "1" {
        "once".to_string()
    } else {
        format!("{n} times")
    }
}

fn describe_start_menu(_: &str) -> String {
    "(hit the windows button)".to_string()
}

fn describe_maximize(_: &str) -> String {
    "maximize the window".to_string()
}

fn describe_minimize(_: &str) -> String {
    "minimize the window".to_string()
}

fn describe_screenshot(_: &str) -> String {
    "take a screenshot".to_string()
}

fn describe_copy(_: &str) -> String {
    "copy the selection to the clipboard".to_string()
}

fn describe_paste(_: &str) -> String {
    "paste from the clipboard".to_string()
}

fn describe_select_all(_: &str) -> String {
    "select all".to_string()
}

fn describe_type(argument: &str) -> String {
    match argument
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
    {
        Some(path) => format!("type the contents of \"{path}\""),
        None => format!("type \"{argument}\""),
    }
}

fn describe_left_click(argument: &str) -> String {
    let (x, y) = coordinates(argument);
    format!("click at coordinates ({x}, {y})")
}

fn describe_right_click(argument: &str) -> String {
    let (x, y) = coordinates(argument);
    format!("right-click at coordinates ({x}, {y})")
}

fn describe_sleep(argument: &str) -> String {
    format!("wait for {argument} milliseconds")
}

fn describe_update_setting(argument: &str) -> String {
    format!("update settings with value {argument}")
}

fn describe_run_command(argument: &str) -> String {
    format!("run the stored command \"{argument}\"")
}

fn describe_alt_tab(argument: &str) -> String {
    format!("switch windows with alt+tab {}", times(argument))
}

fn describe_tab(argument: &str) -> String {
    format!("press tab {}", times(argument))
}

fn describe_drag(argument: &str) -> String {
    match argument.split_once(',') {
        Some((from, to)) => format!("drag from ({from}) to ({to})"),
        None => format!("drag from ({argument})"),
    }
}

fn describe_find_and_click(argument: &str) -> String {
    format!("find and click on the {}", image_name(argument))
}

fn describe_double_click_image(argument: &str) -> String {
    format!("double-click on the {}", image_name(argument))
}

fn describe_find_and_right_click(argument: &str) -> String {
    format!("find and right click on the {}", image_name(argument))
}

fn describe_double_right_click_image(argument: &str) -> String {
    format!("find and double right click on the {}", image_name(argument))
}

fn describe_wait_for_image(argument: &str) -> String {
    format!("wait for image {} to appear", image_name(argument))
}

fn describe_wait_with_timeout(argument: &str) -> String {
    format!(
        "wait for image {} to appear, timeout if it doesn't show up",
        image_name(argument)
    )
}

fn describe_click_last_instance(argument: &str) -> String {
    format!("find and click the last instance of {}", image_name(argument))
}

fn describe_loop(argument: &str) -> String {
    format!("repeat {argument}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_and_verbose_phrases_are_unique() {
        let codes: HashSet<char> = OPCODES.iter().map(|i| i.code).collect();
        assert_eq!(codes.len(), OPCODES.len());

        let phrases: HashSet<&str> = OPCODES
            .iter()
            .filter(|i| i.class != OpcodeClass::Loop)
            .map(|i| i.verbose)
            .collect();
        assert_eq!(phrases.len(), OPCODES.len() - 1);
    }

    #[test]
    fn info_round_trips_through_code() {
        for info in &OPCODES {
            assert_eq!(lookup(info.code).map(|i| i.opcode), Some(info.opcode));
            assert_eq!(info.opcode.code(), info.code);
        }
        assert!(lookup('w').is_none());
    }

    #[test]
    fn every_opcode_owns_its_row() {
        for (row, info) in OPCODES.iter().enumerate() {
            assert_eq!(info.opcode.row(), row, "{:?}", info.opcode);
            assert!(std::ptr::eq(info.opcode.info(), info));
        }
    }

    #[test]
    fn classes_match_the_language() {
        assert_eq!(Opcode::StartMenu.class(), OpcodeClass::NoArg);
        assert_eq!(Opcode::Sleep.class(), OpcodeClass::SingleArg);
        assert_eq!(Opcode::Drag.class(), OpcodeClass::DoubleArg);
        assert_eq!(Opcode::FindAndClick.class(), OpcodeClass::ImageLocate);
        assert_eq!(Opcode::ClickLastInstance.class(), OpcodeClass::ImageLocateAll);
        assert_eq!(Opcode::Loop.class(), OpcodeClass::Loop);
    }

    #[test]
    fn descriptions_strip_image_extension_and_anchor() {
        let f = lookup('f').unwrap();
        assert_eq!(f.describe("save.png<tl>"), "find and click on the save");
        let v = lookup('v').unwrap();
        assert_eq!(
            v.describe("dialog.png,3000"),
            "wait for image dialog to appear, timeout if it doesn't show up"
        );
        let l = lookup('l').unwrap();
        assert_eq!(l.describe("10:20"), "click at coordinates (10, 20)");
        assert_eq!(l.describe("bogus"), "click at coordinates (bogus, ?)");
    }
}
