#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Caserpa.

This module wires together:
- `services`: the collaborator traits the engine drives (locator, injector, commands) and the settings store validation reads
- `session`: mutable session state (inter-instruction delay, timings, call depth) and run-time setting updates
- `engine`: in-order macro execution with loops, sub-macros and the timeout sentinel
- `keys`: parsing of injection-form key text (`^c`, `{TAB 3}`, `%( x)`)
- `actions`: the Enigo-backed `InputInjector` with dry-run mode
- `runtime`: validate/describe/run by text, stored name or trigger request

Typical usage:
- Construct a `Runtime` with a loaded `Config`.
- Call `Runtime::run_macro` with macro text, or `run_command` with a stored name.

Example:
```no_run
use caserpa::config::Config;
use caserpa::executor::Runtime;

let cfg: Config = Default::default();
let mut rt = Runtime::new(cfg, true); // dry-run mode
let outcome = rt.run_macro("e;snotepad~;t500")?;
println!("{outcome}");
# Ok::<(), anyhow::Error>(())
```
*/

pub mod actions;
pub mod engine;
pub mod keys;
pub mod runtime;
pub mod services;
pub mod session;

// Re-exports for convenient access from `caserpa::executor::*`
pub use actions::EnigoInjector;
pub use engine::{Outcome, execute};
pub use runtime::Runtime;
pub use services::{CommandResolver, InputInjector, MouseButton, Services, SettingsStore};
pub use session::{Session, SettingError, SettingUpdate, Timings};
