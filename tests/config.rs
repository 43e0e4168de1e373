use std::path::Path;

use caserpa::config::{self, TriggerConfig};
use caserpa::executor::Runtime;
use caserpa::sources::{ExecutionGate, build_sources_from_config};

fn bundled() -> config::Config {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.json");
    config::load_from_path(path).expect("bundled config loads")
}

#[test]
fn bundled_config_is_valid() {
    let cfg = bundled();
    assert!(cfg.commands.contains_key("open_notepad"));
    assert!(matches!(cfg.triggers[0], TriggerConfig::File { .. }));
    assert_eq!(build_sources_from_config(&cfg, &ExecutionGate::new()).len(), cfg.triggers.len());
}

#[test]
fn bundled_commands_describe_and_validate() {
    let rt = Runtime::new(bundled(), true);
    for (name, code) in &rt.config().commands {
        assert!(rt.validate(code).is_valid(), "{name}");
        assert!(!rt.describe(code).is_empty(), "{name}");
    }
    assert_eq!(
        rt.describe("zopen_notepad;t250"),
        "run the stored command \"open_notepad\", wait for 250 milliseconds"
    );
}
