//! Binary entrypoint for the botfleet CLI.
//!
//! Commands:
//! - `start` - run the bot manager (interactive menu or unattended)
//! - `init` - create a starter `botfleet.toml`
//! - `status` - print the persisted session roster
//!
//! Exit codes are binary: 0 for a normal shutdown, 1 when the supervisor
//! requests a restart or an unrecoverable error occurs. An external
//! process manager is expected to interpret non-zero as "restart me".

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};

use botfleet::backend::detached::DetachedConnector;
use botfleet::bot::{SessionRegistry, SessionSettings, Supervisor};
use botfleet::config::{Config, DeployMode};
use botfleet::{menu, procinfo};

#[derive(Parser)]
#[command(name = "botfleet")]
#[command(about = "Multi-session chat bot manager")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "botfleet.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot manager
    Start,
    /// Initialize a new configuration file
    Init,
    /// Show the persisted session roster
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    procinfo::mark_start();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Start => {
            // A broken or missing settings file is never fatal: defaults
            // keep an unattended deployment alive.
            let config = match pre_config {
                Some(c) => c,
                None => {
                    warn!(
                        "could not load {}; continuing with default settings",
                        cli.config
                    );
                    Config::default()
                }
            };
            run_manager(config).await?;
        }
        Commands::Init => {
            info!("Initializing new botfleet configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = pre_config.unwrap_or_default();
            let roster =
                SessionRegistry::load_roster(Path::new(&config.manager.roster_file)).await;
            if roster.is_empty() {
                println!("No bots in roster.");
            } else {
                for entry in roster {
                    println!("id: {}  name: {}", entry.id, entry.name);
                }
            }
        }
    }

    Ok(())
}

async fn run_manager(config: Config) -> Result<()> {
    let mode = DeployMode::detect();
    info!(
        "Starting botfleet v{} ({} mode)",
        env!("CARGO_PKG_VERSION"),
        mode.label()
    );

    // The built-in connector runs detached; a deployment links its backend
    // bridge here by providing its own `ClientConnector`.
    let connector = Arc::new(DetachedConnector);
    let settings = SessionSettings::from_config(&config, mode);
    let mut registry = SessionRegistry::new(
        &config.manager.roster_file,
        &config.manager.auth_dir,
        connector,
        settings,
        mode,
    );

    let roster = SessionRegistry::load_roster(Path::new(&config.manager.roster_file)).await;
    if !roster.is_empty() {
        info!("Loading {} saved bot(s)...", roster.len());
        registry.start_from_roster(roster).await;
    }
    if mode.is_unattended() && registry.is_empty() {
        info!("No saved bots - creating default...");
        if let Err(e) = registry.create_default_session().await {
            error!("could not create default bot: {}", e);
        }
    }

    let registry = Arc::new(Mutex::new(registry));
    let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel();
    let supervisor = Supervisor::new(Arc::clone(&registry), config.supervisor.clone(), fatal_tx);
    let supervisor_task = supervisor.spawn();

    let exit_code = if mode.is_unattended() {
        tokio::select! {
            reason = fatal_rx.recv() => {
                error!(
                    "supervisor requested restart: {}",
                    reason.unwrap_or_else(|| "fatal channel closed".to_string())
                );
                1
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                registry.lock().await.shutdown_all().await;
                0
            }
        }
    } else {
        tokio::select! {
            reason = fatal_rx.recv() => {
                error!(
                    "supervisor requested restart: {}",
                    reason.unwrap_or_else(|| "fatal channel closed".to_string())
                );
                1
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                registry.lock().await.shutdown_all().await;
                0
            }
            result = menu::run(Arc::clone(&registry)) => {
                if let Err(e) = result {
                    error!("menu error: {}", e);
                }
                0
            }
        }
    };

    supervisor_task.abort();
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| match c.logging.level.as_str() {
                "debug" => log::LevelFilter::Debug,
                "trace" => log::LevelFilter::Trace,
                "warn" => log::LevelFilter::Warn,
                "error" => log::LevelFilter::Error,
                _ => log::LevelFilter::Info,
            })
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    if let Some(file) = config.as_ref().and_then(|c| c.logging.file.clone()) {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // If stdout is a terminal we mirror log lines to the console;
            // under a process manager only the file is written.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());
                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }
                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(default_format);
        }
    } else {
        builder.format(default_format);
    }
    let _ = builder.try_init();
}

fn default_format(
    fmt: &mut env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    use std::io::Write;
    writeln!(
        fmt,
        "{} [{}] {}",
        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
        record.level(),
        record.args()
    )
}
