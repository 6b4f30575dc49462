use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::bridge::run_async;
use crate::config::{secs_to_duration, Config};
use crate::executor::{MainLoop, MainThreadHandle};
use crate::helpers::{poll_query, raise_in_background, sleep, PollOptions};
use crate::trampoline::{yield_now, RunStats, Trampoline};

#[derive(Parser)]
#[command(name = "trampoline")]
#[command(about = "Trampoline - run main-thread code that bounces blocking work to the background", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Coroutine stack size in words (overrides config file and env vars)
    #[arg(long, global = true)]
    pub stack_size: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the reference scenario on a dedicated privileged thread
    Demo {
        /// How long the body sleeps in the background, in milliseconds
        #[arg(long, default_value = "100")]
        sleep_ms: u64,
    },

    /// Poll a simulated widget tree until a query resolves
    Poll {
        /// Query to resolve
        #[arg(default_value = "//QPushButton[@enabled]")]
        query: String,

        /// Milliseconds until the simulated widget appears
        #[arg(long, default_value = "200")]
        appear_after_ms: u64,

        /// Seconds to wait before giving up (default from config)
        #[arg(long)]
        timeout_secs: Option<f64>,

        /// Fail instead of returning no matches
        #[arg(long, conflicts_with = "lenient")]
        strict: bool,

        /// Return no matches on timeout, even if the config asks for strict
        #[arg(long)]
        lenient: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    result: String,
    events: Vec<String>,
    stats: RunStats,
}

#[derive(Debug, Serialize)]
struct PollReport {
    query: String,
    matches: Vec<String>,
    elapsed_ms: u128,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config = Config::builder()
        .config_path(cli.config)
        .stack_size(cli.stack_size)
        .build()
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Demo { sleep_ms } => {
            let report = tokio::task::spawn_blocking(move || {
                run_demo(&config, Duration::from_millis(sleep_ms))
            })
            .await
            .context("Demo driver thread failed")??;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Poll {
            query,
            appear_after_ms,
            timeout_secs,
            strict,
            lenient,
        } => {
            let options = poll_options(&config, timeout_secs, strict, lenient)?;
            let report = run_poll(query, Duration::from_millis(appear_after_ms), options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

/// Effective poll options: config first, then command-line flags.
fn poll_options(config: &Config, timeout_secs: Option<f64>, strict: bool, lenient: bool) -> Result<PollOptions> {
    let mut options = PollOptions::try_from(&config.poll)?;
    if strict || lenient {
        options = options.strict(strict);
    }
    if let Some(secs) = timeout_secs {
        options = options.timeout(secs_to_duration("--timeout-secs", secs)?);
    }
    Ok(options)
}

/// Spawn a thread that owns a [`MainLoop`] until the returned handle and all
/// its clones are dropped.
fn spawn_privileged_thread() -> Result<(MainThreadHandle, thread::JoinHandle<usize>)> {
    let (main_loop, handle) = MainLoop::new();
    let join = thread::Builder::new()
        .name("privileged".to_string())
        .spawn(move || main_loop.run())
        .context("Failed to spawn privileged thread")?;
    Ok((handle, join))
}

fn run_demo(config: &Config, sleep_for: Duration) -> Result<DemoReport> {
    let (handle, ui) = spawn_privileged_thread()?;
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&events);

    let record = move |event: String| {
        let on = thread::current().name().unwrap_or("unnamed").to_string();
        if let Ok(mut log) = log.lock() {
            log.push(format!("[{on}] {event}"));
        }
    };

    let (result, stats) = Trampoline::with_config(&handle, config).run_with_stats(
        move |(args, key): (Vec<i32>, String)| {
            record(format!("1 - started with {args:?}, key={key}"));
            sleep(sleep_for)?;
            record("2 - back from sleep".to_string());
            yield_now()?;
            record("3 - back from yield".to_string());

            match raise_in_background(anyhow::anyhow!("expected")) {
                Err(_) => record("4 - caught background failure".to_string()),
                Ok(()) => record("SHOULD NOT GET HERE".to_string()),
            }

            Ok("we finished".to_string())
        },
        (vec![1, 2, 3], "value".to_string()),
    );

    drop(handle);
    let jobs = ui
        .join()
        .map_err(|_| anyhow::anyhow!("privileged thread panicked"))?;
    tracing::info!(jobs, "privileged thread finished");

    let events = events
        .lock()
        .map_err(|_| anyhow::anyhow!("event log poisoned"))?
        .clone();

    Ok(DemoReport {
        result: result?,
        events,
        stats,
    })
}

async fn run_poll(query: String, appear_after: Duration, options: PollOptions) -> Result<PollReport> {
    let (handle, ui) = spawn_privileged_thread()?;
    let started = Instant::now();
    let appears_at = started + appear_after;
    let body_query = query.clone();

    let matches = run_async(
        Arc::new(handle),
        move |()| {
            let widgets = move |_root: &str, query: &str| -> Vec<String> {
                if Instant::now() >= appears_at {
                    vec![format!("{query} -> QPushButton#ok")]
                } else {
                    Vec::new()
                }
            };
            poll_query("main-window", &body_query, &widgets, &options)
        },
        (),
    )
    .await?;

    ui.join()
        .map_err(|_| anyhow::anyhow!("privileged thread panicked"))?;

    Ok(PollReport {
        query,
        matches,
        elapsed_ms: started.elapsed().as_millis(),
    })
}
