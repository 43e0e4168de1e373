/*!
Screen-locate protocol.

The executor never looks at pixels. It hands an [`ImageRef`] (file name plus an
optional click [`Anchor`]) to a [`ScreenLocator`] and gets back a point or a
timeout sentinel. Two policies exist, selected by [`LocateMode`]:

- `WaitForever`: retry at the poll interval until the image shows up.
- `Timeout(d)`: give up after `d` and report [`LocateResult::TimedOut`].

`polling` provides the generic retry/threshold/anchor implementation over a
pluggable single-shot [`polling::TemplateMatcher`].
*/

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::macros::{IMAGE_EXTENSION, MacroError};

pub mod polling;

pub use polling::{FixedMatcher, Match, PollingLocator, TemplateMatcher, UnavailableMatcher};

/// Screen coordinate in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl FromStr for Point {
    type Err = MacroError;

    /// Parse `x:y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(':')
            .ok_or_else(|| MacroError::ExpectedPoint(s.to_string()))?;
        match (x.trim().parse(), y.trim().parse()) {
            (Ok(x), Ok(y)) => Ok(Point { x, y }),
            _ => Err(MacroError::ExpectedPoint(s.to_string())),
        }
    }
}

/// Where inside a matched image box to click.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Anchor {
    TopLeft,
    TopMiddle,
    TopRight,
    MiddleLeft,
    MiddleRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
    /// Pixel offset from the top-left corner.
    Offset { dx: i32, dy: i32 },
}

impl Anchor {
    /// Short names accepted inside `<...>`.
    pub const NAMES: [&'static str; 8] = ["tl", "tm", "tr", "ml", "mr", "bl", "bm", "br"];

    /// Parse the text between `<` and `>`.
    pub fn parse(text: &str) -> Result<Self, MacroError> {
        let named = match text {
            "tl" => Some(Anchor::TopLeft),
            "tm" => Some(Anchor::TopMiddle),
            "tr" => Some(Anchor::TopRight),
            "ml" => Some(Anchor::MiddleLeft),
            "mr" => Some(Anchor::MiddleRight),
            "bl" => Some(Anchor::BottomLeft),
            "bm" => Some(Anchor::BottomMiddle),
            "br" => Some(Anchor::BottomRight),
            _ => None,
        };
        if let Some(anchor) = named {
            return Ok(anchor);
        }

        let invalid = || MacroError::InvalidAnchor(text.to_string());
        let (dx, dy) = text.split_once(':').ok_or_else(invalid)?;
        let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(dx) || !digits(dy) {
            return Err(invalid());
        }
        Ok(Anchor::Offset {
            dx: dx.parse().map_err(|_| invalid())?,
            dy: dy.parse().map_err(|_| invalid())?,
        })
    }

    /// Click point for a match box at `top_left` of `width` x `height`.
    pub fn resolve(self, top_left: Point, width: i32, height: i32) -> Point {
        let (left, top) = (top_left.x, top_left.y);
        let (right, bottom) = (left + width, top + height);
        let (mid_x, mid_y) = ((left + right) / 2, (top + bottom) / 2);
        let (x, y) = match self {
            Anchor::TopLeft => (left, top),
            Anchor::TopMiddle => (mid_x, top),
            Anchor::TopRight => (right, top),
            Anchor::MiddleLeft => (left, mid_y),
            Anchor::MiddleRight => (right, mid_y),
            Anchor::BottomLeft => (left, bottom),
            Anchor::BottomMiddle => (mid_x, bottom),
            Anchor::BottomRight => (right, bottom),
            Anchor::Offset { dx, dy } => (left + dx, top + dy),
        };
        Point { x, y }
    }
}

/// Center of a match box; the click point when no anchor is given.
pub fn center(top_left: Point, width: i32, height: i32) -> Point {
    Point {
        x: (2 * top_left.x + width) / 2,
        y: (2 * top_left.y + height) / 2,
    }
}

/// Reference to a template image plus an optional click anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub file: String,
    pub anchor: Option<Anchor>,
}

impl ImageRef {
    /// Parse `name.png` or `name.png<anchor>`.
    pub fn parse(argument: &str) -> Result<Self, MacroError> {
        let (file, anchor) = match argument.split_once('<') {
            Some((file, rest)) => {
                let text = rest.strip_suffix('>').unwrap_or(rest);
                (file, Some(Anchor::parse(text)?))
            }
            None => (argument, None),
        };
        if !file.ends_with(IMAGE_EXTENSION) || file.len() == IMAGE_EXTENSION.len() {
            return Err(MacroError::ExpectedImage(argument.to_string()));
        }
        Ok(ImageRef {
            file: file.to_string(),
            anchor,
        })
    }

    /// Click point for a match box, honouring the anchor.
    pub fn click_point(&self, top_left: Point, width: i32, height: i32) -> Point {
        match self.anchor {
            Some(anchor) => anchor.resolve(top_left, width, height),
            None => center(top_left, width, height),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file)
    }
}

/// Retry policy of a single locate call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocateMode {
    WaitForever,
    Timeout(Duration),
}

/// Result of one locate call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocateResult {
    Found(Point),
    TimedOut,
}

/// Locate parameters a macro may change at run time.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorTuning {
    PollInterval(Duration),
    Threshold(f64),
    ImageDirectory(PathBuf),
}

/// Resolves image references to screen points.
pub trait ScreenLocator {
    /// Locate `image`. Only `LocateMode::Timeout` may yield `TimedOut`.
    fn locate(&mut self, image: &ImageRef, mode: LocateMode) -> LocateResult;

    /// All on-screen instances of `image`, in scan order.
    fn locate_all(&mut self, image: &ImageRef) -> Vec<Point>;

    /// Apply a run-time parameter change. Returns `false` when unsupported.
    fn tune(&mut self, tuning: LocatorTuning) -> bool {
        let _ = tuning;
        false
    }
}
