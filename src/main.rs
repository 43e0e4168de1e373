use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use caserpa::config::{self as cfg, Config};
use caserpa::executor::{Outcome, Runtime};
use caserpa::macros::{self, ValidationOutcome};
use caserpa::sources::{self, ExecutionGate, GateGuard, TriggerRequest};

/// Caserpa CLI
#[derive(Debug, Parser)]
#[command(
    name = caserpa::PKG_NAME,
    version = caserpa::PKG_VERSION,
    about = "Run compact desktop-automation macros over Enigo"
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long = "config", default_value = "config/default.json")]
    config: PathBuf,

    /// Execute a macro (e.g. "e;snotepad~;t500")
    #[arg(short = 'e', long = "execute", value_name = "MACRO")]
    execute: Option<String>,

    /// Macro arguments are written with verbose phrases ("Start Menu;Sleep: 500")
    #[arg(long = "verbose")]
    verbose: bool,

    /// Run a stored command by name
    #[arg(short = 'r', long = "run", value_name = "NAME")]
    run: Option<String>,

    /// Validate a macro and exit
    #[arg(long = "validate", value_name = "MACRO")]
    validate: Option<String>,

    /// Print a readable description of a macro and exit
    #[arg(long = "describe", value_name = "MACRO")]
    describe: Option<String>,

    /// Print the opcode table and exit
    #[arg(long = "commands")]
    commands: bool,

    /// Run the configured trigger sources until Ctrl+C
    #[arg(short = 'w', long = "watch")]
    watch: bool,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema for the configuration and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

impl Args {
    /// Macro text in short-code form.
    fn short_code(&self, text: &str) -> String {
        if self.verbose {
            macros::to_short_code(text)
        } else {
            text.to_string()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.log_level.as_deref() {
        Some(name) => {
            let level = caserpa::parse_level(name).unwrap_or(tracing::Level::INFO);
            caserpa::init_tracing_with_level(level);
        }
        None => caserpa::init_tracing(),
    }

    if args.print_schema {
        cfg::write_schema_to_writer(std::io::stdout())?;
        println!();
        return Ok(());
    }

    if args.commands {
        for (code, verbose, example) in macros::translate::command_table() {
            println!("{code}  {verbose:<32} {example}");
        }
        return Ok(());
    }

    if let Some(text) = &args.describe {
        println!("{}", macros::describe(&args.short_code(text)));
        return Ok(());
    }

    info!(
        version = caserpa::PKG_VERSION,
        config = %args.config.display(),
        dry_run = args.dry_run,
        "Starting Caserpa"
    );
    let config = load_config(&args).await?;

    if let Some(text) = &args.validate {
        let program = macros::parse(&args.short_code(text));
        let outcome = macros::validate(&program, &config, &config);
        println!("{outcome}");
        if let ValidationOutcome::Invalid { .. } = outcome {
            bail!("validation failed");
        }
        return Ok(());
    }

    if let Some(text) = &args.execute {
        let text = args.short_code(text);
        let outcome = run_blocking(config, args.dry_run, move |rt| rt.run_macro(&text)).await?;
        return report(outcome);
    }

    if let Some(name) = args.run.clone() {
        let outcome = run_blocking(config, args.dry_run, move |rt| rt.run_command(&name)).await?;
        return report(outcome);
    }

    if args.watch {
        return watch(config, args.dry_run).await;
    }

    warn!("Nothing to do; pass --execute, --run, --watch or --help");
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
async fn load_config(args: &Args) -> Result<Config> {
    if !args.config.exists() {
        warn!(config = %args.config.display(), "Config file not found; using defaults");
        return Ok(Config::default());
    }
    let config = cfg::load_from_path_async(&args.config).await?;
    debug!(target: "caserpa", "Configuration loaded successfully");
    Ok(config)
}

/// Build a runtime on a blocking thread and run `job` there.
async fn run_blocking<F>(config: Config, dry_run: bool, job: F) -> Result<Outcome>
where
    F: FnOnce(&mut Runtime) -> Result<Outcome> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut runtime = Runtime::new(config, dry_run);
        job(&mut runtime)
    })
    .await
    .context("Execution thread panicked")?
}

fn report(outcome: Outcome) -> Result<()> {
    println!("{outcome}");
    match outcome {
        Outcome::Completed { .. } => Ok(()),
        other => bail!("macro did not complete: {other}"),
    }
}

/// Run trigger sources; each admitted request executes on a dedicated worker
/// thread that owns the runtime.
async fn watch(config: Config, dry_run: bool) -> Result<()> {
    let gate = ExecutionGate::new();
    let sources = sources::build_sources_from_config(&config, &gate);
    if sources.is_empty() {
        warn!("No trigger sources configured. Waiting for Ctrl+C.");
    }

    let (work_tx, work_rx) = std_mpsc::channel::<(TriggerRequest, GateGuard)>();
    thread::Builder::new()
        .name("caserpa-executor".into())
        .spawn(move || {
            let mut runtime = Runtime::new(config, dry_run);
            while let Ok((request, _guard)) = work_rx.recv() {
                match runtime.run_trigger(&request) {
                    Ok(outcome) => info!(?request, %outcome, "Trigger handled"),
                    Err(err) => error!(?request, error = %err, "Trigger failed"),
                }
            }
        })
        .context("Failed to spawn executor thread")?;

    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel::<TriggerRequest>(64);
    let handles = sources::spawn_all_sources(&sources, tx, &cancel);

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(request) = request else {
                    info!("All trigger sources ended");
                    break;
                };
                let Some(guard) = gate.try_acquire() else {
                    warn!(?request, "Execution in progress; trigger dropped");
                    continue;
                };
                if work_tx.send((request, guard)).is_err() {
                    error!("Executor thread is gone; stopping");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    info!("Caserpa exited");
    Ok(())
}
