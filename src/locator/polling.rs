//! Poll-until-found locator over a single-shot template matcher.
//!
//! Behavior:
//! - A match counts only when its score is at or above the configured threshold.
//! - Matcher errors are logged and treated as "not found"; the loop keeps going.
//! - `LocateMode::WaitForever` has no exit other than a match.
//! - `LocateMode::Timeout(d)` makes at least one attempt and reports `TimedOut`
//!   once `d` has elapsed.
//! - `locate_all` waits until at least one instance clears the threshold.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use tracing::{debug, trace, warn};

use super::{ImageRef, LocateMode, LocateResult, LocatorTuning, Point, ScreenLocator};

/// One candidate region reported by a matcher.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Match {
    pub top_left: Point,
    pub width: i32,
    pub height: i32,
    /// Normalized similarity in `[0, 1]`.
    pub score: f64,
}

/// Single-shot template matching against the current screen.
pub trait TemplateMatcher {
    /// Best-scoring region for the template at `image`, if any.
    fn best_match(&mut self, image: &Path) -> Result<Option<Match>>;

    /// Every region scoring at least `threshold`, in scan order.
    fn all_matches(&mut self, image: &Path, threshold: f64) -> Result<Vec<Match>>;
}

/// Matcher that always reports the same region. Used for dry runs.
#[derive(Debug, Clone)]
pub struct FixedMatcher {
    pub region: Match,
}

impl FixedMatcher {
    pub fn new(region: Match) -> Self {
        Self { region }
    }
}

impl Default for FixedMatcher {
    fn default() -> Self {
        Self::new(Match {
            top_left: Point::new(0, 0),
            width: 2,
            height: 2,
            score: 1.0,
        })
    }
}

impl TemplateMatcher for FixedMatcher {
    fn best_match(&mut self, image: &Path) -> Result<Option<Match>> {
        debug!(target: "caserpa::locator", image = %image.display(), "DRY-RUN best_match");
        Ok(Some(self.region))
    }

    fn all_matches(&mut self, image: &Path, _threshold: f64) -> Result<Vec<Match>> {
        debug!(target: "caserpa::locator", image = %image.display(), "DRY-RUN all_matches");
        Ok(vec![self.region])
    }
}

/// Matcher used when no pixel backend is linked in; every attempt fails.
#[derive(Debug, Clone, Default)]
pub struct UnavailableMatcher;

impl TemplateMatcher for UnavailableMatcher {
    fn best_match(&mut self, image: &Path) -> Result<Option<Match>> {
        bail!(
            "no template-matching backend configured (looking for {})",
            image.display()
        )
    }

    fn all_matches(&mut self, image: &Path, _threshold: f64) -> Result<Vec<Match>> {
        bail!(
            "no template-matching backend configured (looking for {})",
            image.display()
        )
    }
}

/// Retry/threshold/anchor policy around a [`TemplateMatcher`].
pub struct PollingLocator<M> {
    matcher: M,
    image_directory: PathBuf,
    poll_interval: Duration,
    threshold: f64,
}

impl<M: TemplateMatcher> PollingLocator<M> {
    pub fn new(
        matcher: M,
        image_directory: impl Into<PathBuf>,
        poll_interval: Duration,
        threshold: f64,
    ) -> Self {
        Self {
            matcher,
            image_directory: image_directory.into(),
            poll_interval,
            threshold,
        }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn image_directory(&self) -> &Path {
        &self.image_directory
    }

    fn path_for(&self, image: &ImageRef) -> PathBuf {
        self.image_directory.join(&image.file)
    }

    /// One attempt; errors and sub-threshold scores count as "not found".
    fn attempt(&mut self, path: &Path) -> Option<Match> {
        match self.matcher.best_match(path) {
            Ok(Some(m)) if m.score >= self.threshold => Some(m),
            Ok(Some(m)) => {
                trace!(
                    target: "caserpa::locator",
                    image = %path.display(), score = m.score, threshold = self.threshold,
                    "Best match below threshold"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    target: "caserpa::locator",
                    image = %path.display(), error = %e,
                    "Template match failed; treating as not found"
                );
                None
            }
        }
    }
}

impl<M: TemplateMatcher> ScreenLocator for PollingLocator<M> {
    fn locate(&mut self, image: &ImageRef, mode: LocateMode) -> LocateResult {
        let path = self.path_for(image);
        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            if let Some(m) = self.attempt(&path) {
                let point = image.click_point(m.top_left, m.width, m.height);
                debug!(
                    target: "caserpa::locator",
                    image = %image, %point, attempts, score = m.score,
                    "Image located"
                );
                return LocateResult::Found(point);
            }

            let wait = match mode {
                LocateMode::WaitForever => self.poll_interval,
                LocateMode::Timeout(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        warn!(
                            target: "caserpa::locator",
                            image = %image, attempts, timeout_ms = limit.as_millis() as u64,
                            "Timeout reached; image not found"
                        );
                        return LocateResult::TimedOut;
                    }
                    self.poll_interval.min(limit - elapsed)
                }
            };
            trace!(target: "caserpa::locator", image = %image, attempts, "Image not found; retrying");
            thread::sleep(wait);
        }
    }

    fn locate_all(&mut self, image: &ImageRef) -> Vec<Point> {
        let path = self.path_for(image);
        loop {
            match self.matcher.all_matches(&path, self.threshold) {
                Ok(matches) => {
                    let points: Vec<Point> = matches
                        .iter()
                        .filter(|m| m.score >= self.threshold)
                        .map(|m| image.click_point(m.top_left, m.width, m.height))
                        .collect();
                    if !points.is_empty() {
                        debug!(
                            target: "caserpa::locator",
                            image = %image, count = points.len(),
                            "Located all instances"
                        );
                        return points;
                    }
                }
                Err(e) => {
                    warn!(
                        target: "caserpa::locator",
                        image = %path.display(), error = %e,
                        "Template match failed; treating as not found"
                    );
                }
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn tune(&mut self, tuning: LocatorTuning) -> bool {
        debug!(target: "caserpa::locator", ?tuning, "Locator retuned");
        match tuning {
            LocatorTuning::PollInterval(interval) => self.poll_interval = interval,
            LocatorTuning::Threshold(threshold) => self.threshold = threshold,
            LocatorTuning::ImageDirectory(dir) => self.image_directory = dir,
        }
        true
    }
}
