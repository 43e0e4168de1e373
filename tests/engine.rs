use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, bail};
use caserpa::config::Config;
use caserpa::executor::{
    InputInjector, MouseButton, Outcome, Services, Session, execute,
};
use caserpa::locator::{
    ImageRef, LocateMode, LocateResult, LocatorTuning, Point, PollingLocator, ScreenLocator,
    UnavailableMatcher,
};
use caserpa::macros::parse;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Locate(String),
    LocateAll(String),
    Text(String),
    Click(Point, MouseButton),
    DoubleClick(Point, MouseButton),
    Hold(Point),
    Release(Point),
    Capture,
}

type Log = Rc<RefCell<Vec<Call>>>;

/// Finds every image at a fixed point, or times out when `missing` names it.
struct MockLocator {
    log: Log,
    at: Point,
    missing: Vec<String>,
    all: Vec<Point>,
    tunings: Vec<LocatorTuning>,
}

impl ScreenLocator for MockLocator {
    fn locate(&mut self, image: &ImageRef, mode: LocateMode) -> LocateResult {
        self.log.borrow_mut().push(Call::Locate(image.file.clone()));
        if self.missing.contains(&image.file) {
            assert!(
                matches!(mode, LocateMode::Timeout(_)),
                "a missing image with no timeout would wait forever"
            );
            return LocateResult::TimedOut;
        }
        LocateResult::Found(self.at)
    }

    fn locate_all(&mut self, image: &ImageRef) -> Vec<Point> {
        self.log.borrow_mut().push(Call::LocateAll(image.file.clone()));
        self.all.clone()
    }

    fn tune(&mut self, tuning: LocatorTuning) -> bool {
        self.tunings.push(tuning);
        true
    }
}

struct MockInjector {
    log: Log,
    failing_text: Option<String>,
}

impl InputInjector for MockInjector {
    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.failing_text.as_deref() == Some(text) {
            bail!("injection refused");
        }
        self.log.borrow_mut().push(Call::Text(text.to_string()));
        Ok(())
    }

    fn click(&mut self, at: Point, button: MouseButton) -> Result<()> {
        self.log.borrow_mut().push(Call::Click(at, button));
        Ok(())
    }

    fn double_click(&mut self, at: Point, button: MouseButton, _gap: Duration) -> Result<()> {
        self.log.borrow_mut().push(Call::DoubleClick(at, button));
        Ok(())
    }

    fn move_and_hold(&mut self, at: Point) -> Result<()> {
        self.log.borrow_mut().push(Call::Hold(at));
        Ok(())
    }

    fn release(&mut self, at: Point) -> Result<()> {
        self.log.borrow_mut().push(Call::Release(at));
        Ok(())
    }

    fn capture_screen(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Call::Capture);
        Ok(())
    }
}

struct Harness {
    log: Log,
    locator: MockLocator,
    injector: MockInjector,
    config: Config,
    session: Session,
}

impl Harness {
    fn new() -> Self {
        let log: Log = Rc::default();
        Self {
            locator: MockLocator {
                log: log.clone(),
                at: Point::new(40, 30),
                missing: Vec::new(),
                all: Vec::new(),
                tunings: Vec::new(),
            },
            injector: MockInjector {
                log: log.clone(),
                failing_text: None,
            },
            log,
            config: Config::default(),
            session: Session::immediate(),
        }
    }

    fn run(&mut self, source: &str) -> Outcome {
        let mut services = Services {
            locator: &mut self.locator,
            injector: &mut self.injector,
            commands: &self.config,
        };
        execute(&parse(source), &mut services, &mut self.session)
    }

    fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }
}

fn text(s: &str) -> Call {
    Call::Text(s.into())
}

fn locate(s: &str) -> Call {
    Call::Locate(s.into())
}

#[test]
fn instructions_run_in_order() {
    let mut h = Harness::new();
    let outcome = h.run("e;sexplorer.exe{ENTER};l100:200;r-5:7;x;y;p;o;i;c");
    assert_eq!(outcome, Outcome::Completed { executed: 10 });
    assert_eq!(
        h.calls(),
        vec![
            text("^{ESC}"),
            text("explorer.exe{ENTER}"),
            Call::Click(Point::new(100, 200), MouseButton::Left),
            Call::Click(Point::new(-5, 7), MouseButton::Right),
            text("%( x)"),
            text("%( n)"),
            text("^c"),
            text("^v"),
            text("^a"),
            Call::Capture,
        ]
    );
}

#[test]
fn single_instruction_loop_repeats_locate_and_click() {
    let mut h = Harness::new();
    let outcome = h.run("[3]ficon.png");
    assert_eq!(outcome, Outcome::Completed { executed: 3 });
    let click = Call::Click(Point::new(40, 30), MouseButton::Left);
    assert_eq!(
        h.calls(),
        vec![
            locate("icon.png"),
            click.clone(),
            locate("icon.png"),
            click.clone(),
            locate("icon.png"),
            click,
        ]
    );
}

#[test]
fn block_loop_repeats_the_whole_block_then_moves_on() {
    let mut h = Harness::new();
    let outcome = h.run("[2:3]fa.png;l100:100;e");
    assert_eq!(outcome, Outcome::Completed { executed: 7 });

    let pass = vec![
        locate("a.png"),
        Call::Click(Point::new(40, 30), MouseButton::Left),
        Call::Click(Point::new(100, 100), MouseButton::Left),
    ];
    let mut expected = Vec::new();
    for _ in 0..3 {
        expected.extend(pass.clone());
    }
    expected.push(text("^{ESC}"));
    assert_eq!(h.calls(), expected);
}

#[test]
fn nested_loops_stay_inside_their_block() {
    let mut h = Harness::new();
    // Outer block of 3 run twice; the inner `[2]` repeats `sb` inside each pass.
    let outcome = h.run("[3:2]sa;[2]sb;sc;sd");
    assert_eq!(outcome, Outcome::Completed { executed: 9 });
    assert_eq!(
        h.calls(),
        vec![
            text("a"),
            text("b"),
            text("b"),
            text("c"),
            text("a"),
            text("b"),
            text("b"),
            text("c"),
            text("d"),
        ]
    );
}

#[test]
fn timeout_halts_the_macro_without_clicking() {
    let mut h = Harness::new();
    h.locator.missing.push("dialog.png".into());
    let outcome = h.run("e;vdialog.png,50;fok.png;sdone");
    assert_eq!(
        outcome,
        Outcome::TimedOut {
            index: 2,
            image: "dialog.png".into()
        }
    );
    assert_eq!(h.calls(), vec![text("^{ESC}"), locate("dialog.png")]);
    assert!(outcome.to_string().starts_with("Not Found"));
}

#[test]
fn always_failing_matcher_times_out_through_the_real_locator() {
    let mut h = Harness::new();
    let mut locator =
        PollingLocator::new(UnavailableMatcher, "find", Duration::from_millis(1), 0.9);
    let mut services = Services {
        locator: &mut locator,
        injector: &mut h.injector,
        commands: &h.config,
    };
    let outcome = execute(&parse("vmissing.png,5;e"), &mut services, &mut h.session);
    assert!(matches!(outcome, Outcome::TimedOut { index: 1, .. }), "{outcome}");
    assert!(h.calls().is_empty());
}

#[test]
fn stored_commands_run_recursively() {
    let mut h = Harness::new();
    h.config.commands.insert("open".into(), "e;snotepad~".into());
    h.config.commands.insert("twice".into(), "zopen;zopen".into());
    let outcome = h.run("ztwice;sdone");
    assert!(outcome.is_completed());
    assert_eq!(
        h.calls(),
        vec![
            text("^{ESC}"),
            text("notepad~"),
            text("^{ESC}"),
            text("notepad~"),
            text("done"),
        ]
    );
}

#[test]
fn timeout_inside_a_stored_command_stops_the_caller() {
    let mut h = Harness::new();
    h.locator.missing.push("gone.png".into());
    h.config.commands.insert("wait".into(), "vgone.png,1;e".into());
    let outcome = h.run("zwait;sunreached");
    assert!(matches!(outcome, Outcome::TimedOut { .. }));
    assert_eq!(h.calls(), vec![locate("gone.png")]);
}

#[test]
fn self_referencing_command_is_aborted_by_the_depth_guard() {
    let mut h = Harness::new();
    h.config.commands.insert("again".into(), "sx;zagain".into());
    h.session = Session::immediate().with_max_call_depth(3);
    let outcome = h.run("zagain");
    match outcome {
        Outcome::Aborted { reason, .. } => assert!(reason.contains("call depth"), "{reason}"),
        other => panic!("expected Aborted, got {other}"),
    }
    assert_eq!(h.calls(), vec![text("x"), text("x"), text("x")]);
}

#[test]
fn unknown_commands_and_bad_arguments_are_skipped() {
    let mut h = Harness::new();
    let outcome = h.run("znowhere;tsoon;w;l1;s(/definitely/not/here.txt);sok");
    assert_eq!(outcome, Outcome::Completed { executed: 6 });
    assert_eq!(h.calls(), vec![text("ok")]);
}

#[test]
fn injector_failures_do_not_stop_execution() {
    let mut h = Harness::new();
    h.injector.failing_text = Some("^c".into());
    let outcome = h.run("p;o");
    assert!(outcome.is_completed());
    assert_eq!(h.calls(), vec![text("^v")]);
}

#[test]
fn settings_update_changes_the_delay() {
    let mut h = Harness::new();
    h.session.set_command_delay(Duration::from_millis(500));
    let outcome = h.run("uCommandDelay:0;e");
    assert!(outcome.is_completed());
    assert_eq!(h.session.command_delay(), Duration::ZERO);
}

#[test]
fn max_call_depth_update_limits_recursion() {
    let mut h = Harness::new();
    h.config.commands.insert("again".into(), "zagain".into());
    let outcome = h.run("uMaxCallDepth:2;zagain");
    assert_eq!(h.session.max_call_depth(), 2);
    match outcome {
        Outcome::Aborted { index, reason } => {
            assert_eq!(index, 1);
            assert!(reason.contains("maximum call depth (2)"), "{reason}");
        }
        other => panic!("expected Aborted, got {other}"),
    }
}

#[test]
fn locate_settings_retune_the_locator() {
    let mut h = Harness::new();
    let outcome = h.run("uPollInterval:50;uMatchThreshold:0.8;uImageStorageDirectory:shots;fok.png");
    assert!(outcome.is_completed());
    assert_eq!(
        h.locator.tunings,
        vec![
            LocatorTuning::PollInterval(Duration::from_millis(50)),
            LocatorTuning::Threshold(0.8),
            LocatorTuning::ImageDirectory("shots".into()),
        ]
    );
}

#[test]
fn rejected_settings_change_nothing() {
    let mut h = Harness::new();
    h.config.settings.insert("Theme".into(), "light".into());
    let outcome = h.run("uTheme:dark;uMaxCallDepth:none;uMatchThreshold:7");
    assert!(outcome.is_completed());
    assert_eq!(h.session.max_call_depth(), 16);
    assert!(h.locator.tunings.is_empty());
}

#[test]
fn last_instance_gets_a_double_click() {
    let mut h = Harness::new();
    h.locator.all = vec![Point::new(1, 1), Point::new(2, 2), Point::new(9, 9)];
    let outcome = h.run("qrow.png");
    assert!(outcome.is_completed());
    assert_eq!(
        h.calls(),
        vec![
            Call::LocateAll("row.png".into()),
            Call::DoubleClick(Point::new(9, 9), MouseButton::Left),
        ]
    );
}

#[test]
fn image_double_clicks_and_right_clicks() {
    let mut h = Harness::new();
    let at = Point::new(40, 30);
    assert!(h.run("ga.png;ja.png;ka.png;ha.png").is_completed());
    assert_eq!(
        h.calls(),
        vec![
            locate("a.png"),
            Call::DoubleClick(at, MouseButton::Left),
            locate("a.png"),
            Call::Click(at, MouseButton::Right),
            locate("a.png"),
            Call::DoubleClick(at, MouseButton::Right),
            locate("a.png"),
        ]
    );
}

#[test]
fn drag_between_literal_and_located_points() {
    let mut h = Harness::new();
    assert!(h.run("d10:20,300:400;dhandle.png<tl>,5:6").is_completed());
    assert_eq!(
        h.calls(),
        vec![
            Call::Hold(Point::new(10, 20)),
            Call::Release(Point::new(300, 400)),
            locate("handle.png"),
            Call::Hold(Point::new(40, 30)),
            Call::Release(Point::new(5, 6)),
        ]
    );
}

#[test]
fn tabs_and_alt_tab() {
    let mut h = Harness::new();
    assert!(h.run("n3;a;a2;n").is_completed());
    assert_eq!(
        h.calls(),
        vec![
            text("{TAB}"),
            text("{TAB}"),
            text("{TAB}"),
            text("%({TAB})"),
            text("%({TAB}{TAB})"),
            text("{TAB}"),
        ]
    );
}

#[test]
fn counted_tabs_pause_after_every_press() {
    let mut h = Harness::new();
    h.session.set_command_delay(Duration::from_millis(20));
    let started = std::time::Instant::now();
    assert!(h.run("n2").is_completed());
    // Two presses plus the instruction itself, each followed by the delay.
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(h.calls(), vec![text("{TAB}"), text("{TAB}")]);
}

#[test]
fn typing_a_file_escapes_its_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.txt");
    std::fs::write(&path, "50% off (today)\r\nbye").unwrap();

    let mut h = Harness::new();
    let outcome = h.run(&format!("s({})", path.display()));
    assert!(outcome.is_completed());
    assert_eq!(h.calls(), vec![text("50{%} off {(}today{)}{ENTER}bye")]);
}

#[test]
fn delay_is_applied_after_every_instruction() {
    let mut h = Harness::new();
    h.session.set_command_delay(Duration::from_millis(20));
    let started = std::time::Instant::now();
    assert!(h.run("[2]e;e").is_completed());
    // Three instruction runs, each followed by the delay.
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[test]
fn script_of_locate_results_is_consumed_in_order() {
    // Interleaves found and timed-out results to check the engine only stops on
    // the bounded variant.
    struct Scripted(VecDeque<LocateResult>);
    impl ScreenLocator for Scripted {
        fn locate(&mut self, _: &ImageRef, _: LocateMode) -> LocateResult {
            self.0.pop_front().unwrap_or(LocateResult::TimedOut)
        }
        fn locate_all(&mut self, _: &ImageRef) -> Vec<Point> {
            Vec::new()
        }
    }

    let mut h = Harness::new();
    let mut locator = Scripted(VecDeque::from([
        LocateResult::Found(Point::new(1, 2)),
        LocateResult::Found(Point::new(3, 4)),
        LocateResult::TimedOut,
    ]));
    let mut services = Services {
        locator: &mut locator,
        injector: &mut h.injector,
        commands: &h.config,
    };
    let outcome = execute(
        &parse("fa.png;va.png,10;vb.png,10;fc.png"),
        &mut services,
        &mut h.session,
    );
    assert_eq!(
        outcome,
        Outcome::TimedOut {
            index: 3,
            image: "b.png".into()
        }
    );
    assert_eq!(
        h.calls(),
        vec![Call::Click(Point::new(1, 2), MouseButton::Left)]
    );
}
