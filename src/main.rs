//! Curfew Agent CLI
//!
//! Journals power-state transitions and reports the red zone.

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use curfew_agent::{
    collector::{backend_name, Collector, PowerObserver},
    ClockTime, Config, Event, EventJournal, EventKind, JournalError, Recorder, RedZoneStatus,
    SystemEventLog, TimeWindow, VERSION,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "curfew")]
#[command(version = VERSION)]
#[command(about = "Power-state journal and late-night red zone checker", long_about = None)]
struct Cli {
    /// Use this configuration file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent and journal power transitions until Ctrl+C or SIGTERM
    Start,

    /// Append a single event stamped with the current time
    Record {
        /// sleep, wake, power-off, app-start or app-close
        kind: EventKind,
    },

    /// Print the journal
    Events {
        /// Only show the most recent N events
        #[arg(long, short)]
        limit: Option<usize>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether now (or --at HH:MM) is inside the red zone; exits 0 inside, 1 outside
    Check {
        #[arg(long)]
        at: Option<ClockTime>,
    },

    /// Set the red zone, e.g. `curfew window 22:00 03:00`
    Window { start: ClockTime, end: ClockTime },

    /// Show journal and red zone status
    Status,

    /// Show configuration
    Config,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CURFEW_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config_path = cli.config.unwrap_or_else(Config::config_path);
    let config = Config::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    match cli.command {
        Commands::Start => cmd_start(&config),
        Commands::Record { kind } => cmd_record(&config, kind),
        Commands::Events { limit, json } => cmd_events(&config, limit, json),
        Commands::Check { at } => cmd_check(&config, at),
        Commands::Window { start, end } => cmd_window(config, &config_path, start, end),
        Commands::Status => cmd_status(&config, &config_path),
        Commands::Config => cmd_config(&config, &config_path),
    }
}

fn build_recorder(config: &Config) -> anyhow::Result<Recorder> {
    Ok(Recorder::new(
        EventJournal::new(&config.journal_path),
        config.text_log_path.clone().map(SystemEventLog::new),
        config.red_zone,
        config.time_zone()?,
    ))
}

fn cmd_start(config: &Config) -> anyhow::Result<u8> {
    println!("Curfew Agent v{VERSION}");
    println!();

    let mut recorder = build_recorder(config)?;

    println!("  Journal: {}", config.journal_path.display());
    if let Some(ref log) = config.text_log_path {
        println!("  Text log: {}", log.display());
    }
    println!("  Red zone: {}", config.red_zone);
    println!("  Notifications: {}", backend_name());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    // Ctrl+C, and SIGTERM from a service manager or system shutdown
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut collector = Collector::new();
    collector
        .start()
        .context("starting power notification collector")?;

    recorder.on_app_start();

    let mut last_status = recorder.evaluate_now();
    print_status_line(&last_status);

    let check_interval = Duration::from_secs(config.check_interval_secs.max(1));
    let mut last_check = Instant::now();
    let receiver = collector.receiver().clone();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(notification) => {
                println!(
                    "[{}] {}",
                    notification
                        .event
                        .timestamp
                        .with_timezone(&Local)
                        .format("%H:%M:%S"),
                    notification.event.kind.description()
                );
                notification.deliver(&mut recorder);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("Collector disconnected unexpectedly");
                break;
            }
        }

        if last_check.elapsed() >= check_interval {
            let status = recorder.evaluate_now();
            if status.inside != last_status.inside {
                if status.inside {
                    tracing::warn!(window = %status.window, "Entered red zone");
                } else {
                    tracing::info!(window = %status.window, "Left red zone");
                }
                print_status_line(&status);
            }
            last_status = status;
            last_check = Instant::now();
        }
    }

    println!();
    println!("Stopping...");
    collector.stop();

    // Anything queued before the collector stopped still belongs in the journal.
    while let Some(notification) = collector.try_recv() {
        notification.deliver(&mut recorder);
    }
    recorder.on_app_close();

    println!();
    println!("{}", recorder.summary());
    Ok(0)
}

fn cmd_record(config: &Config, kind: EventKind) -> anyhow::Result<u8> {
    let mut recorder = build_recorder(config)?;
    let outcome = recorder.record(Event::now(kind))?;
    println!(
        "Recorded {kind} ({} event(s) in journal)",
        outcome.total_events
    );
    Ok(0)
}

fn cmd_events(config: &Config, limit: Option<usize>, json: bool) -> anyhow::Result<u8> {
    let journal = EventJournal::new(&config.journal_path);
    let events = match journal.read_all() {
        Ok(events) => events,
        Err(e @ JournalError::CorruptData { .. }) => {
            eprintln!("Error: {e}");
            eprintln!("The next recorded event will start a new journal and keep a backup of this one.");
            return Ok(2);
        }
        Err(e) => return Err(e.into()),
    };

    let skip = limit.map_or(0, |n| events.len().saturating_sub(n));
    let shown = &events[skip..];

    if json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(0);
    }

    if shown.is_empty() {
        println!("No events recorded yet.");
        return Ok(0);
    }

    for event in shown {
        println!(
            "{}  {}",
            event
                .timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S %z"),
            event.kind
        );
    }
    Ok(0)
}

fn cmd_check(config: &Config, at: Option<ClockTime>) -> anyhow::Result<u8> {
    let inside = match at {
        Some(clock) => {
            let inside = config.red_zone.contains(clock);
            println!(
                "{clock} is {} the red zone {}",
                if inside { "inside" } else { "outside" },
                config.red_zone
            );
            inside
        }
        None => {
            let status = build_recorder(config)?.evaluate_now();
            print_status_line(&status);
            status.inside
        }
    };

    Ok(if inside { 0 } else { 1 })
}

fn cmd_window(
    mut config: Config,
    config_path: &Path,
    start: ClockTime,
    end: ClockTime,
) -> anyhow::Result<u8> {
    config.red_zone = TimeWindow::new(start, end);
    config.save_to(config_path)?;

    println!("Red zone set to {}", config.red_zone);
    if config.red_zone.is_empty() {
        println!("Note: start equals end, so the red zone is empty.");
    }
    Ok(0)
}

fn cmd_status(config: &Config, config_path: &Path) -> anyhow::Result<u8> {
    println!("Curfew Agent Status");
    println!("===================");
    println!();
    println!("Config file: {}", config_path.display());
    println!("Journal: {}", config.journal_path.display());
    println!("Notifications: {}", backend_name());
    println!(
        "Time zone: {}",
        config.timezone.as_deref().unwrap_or("system local")
    );
    println!();

    match EventJournal::new(&config.journal_path).read_all() {
        Ok(events) => {
            println!("Events recorded: {}", events.len());
            if let Some(last) = events.last() {
                println!(
                    "Last event: {} at {}",
                    last.kind,
                    last.timestamp
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Err(e) => println!("Journal unavailable: {e}"),
    }
    println!();

    let status = build_recorder(config)?.evaluate(Utc::now());
    print_status_line(&status);
    Ok(0)
}

fn cmd_config(config: &Config, config_path: &Path) -> anyhow::Result<u8> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", config_path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(0)
}

fn print_status_line(status: &RedZoneStatus) {
    println!(
        "The current time {} is {} the red zone {}.",
        status.clock,
        if status.inside { "inside" } else { "outside" },
        status.window
    );
}

/// Set up the stop handler for SIGINT, SIGTERM and SIGHUP (console close events on Windows).
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting termination handler")
}
