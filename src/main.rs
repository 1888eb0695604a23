use mini_cbt::cli;
use mini_cbt::comm;
use mini_cbt::config;
use mini_cbt::session::SessionStore;
use mini_cbt::trainer::{self, Trainer};

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cogni", version, about = "Chat-driven CBT training demo")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon (intent bus + trainer dispatcher)
    Start,
    /// List the training topics
    Topics,
    /// Run an interactive console session against the core
    Demo,
    /// Debug utilities
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },
}

#[derive(Subcommand, Debug)]
enum DebugAction {
    /// Append one record through the event-log seam and print its path
    LogEvent {
        /// User identity key
        #[arg(long, default_value_t = 0)]
        user: i64,
        /// Case identifier (names the log file)
        #[arg(long, default_value = "debug")]
        case: String,
        /// Turn number
        #[arg(long, default_value_t = 1)]
        step: u32,
        /// Client line for the turn
        #[arg(long, default_value = "debug client line")]
        client: String,
        /// Trainee reply letter
        #[arg(long, default_value = "B")]
        reply: String,
        /// Whether the reply counts as clinically appropriate
        #[arg(long)]
        good: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (fmt layer + env filter, default "info").
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| mini_cbt::cogni_home().join("config.yaml"));

    // Handle non-daemon subcommands.
    match cli.command {
        Some(Command::Start) | None => { /* fall through to daemon startup */ }
        Some(command) => {
            return match command {
                Command::Topics => {
                    cli::print_topics();
                    Ok(())
                }
                Command::Demo => cli::run_demo().await,
                Command::Debug { action } => match action {
                    DebugAction::LogEvent {
                        user,
                        case,
                        step,
                        client,
                        reply,
                        good,
                    } => {
                        let cfg = config::Config::load(&config_path).await?;
                        cli::debug_log_event(
                            cfg.event_log_dir(),
                            user,
                            &case,
                            step,
                            &client,
                            &reply,
                            good,
                        )
                        .await
                    }
                },
                Command::Start => unreachable!(),
            };
        }
    }

    // --- Daemon startup ---

    println!("cogni v{} — CBT training demo core", env!("CARGO_PKG_VERSION"));

    info!(path = %config_path.display(), "loading configuration");
    let cfg = config::Config::load(&config_path).await?;

    let store = Arc::new(SessionStore::new());
    let bus = comm::sender();
    let cancel = CancellationToken::new();

    Trainer::init(Arc::clone(&store), bus.clone(), cancel.clone());

    let telegram_status = if cfg.channels.telegram.is_some() {
        "configured (gateway attaches via the intent bus)"
    } else {
        "not configured"
    };
    info!(
        topics = mini_cbt::dialogue::TOPICS.len(),
        event_log_dir = %cfg.event_log_dir().display(),
        telegram = telegram_status,
        "cogni ready — trainer dispatcher running"
    );

    // Wait for shutdown signal (Ctrl-C).
    tokio::signal::ctrl_c().await?;
    info!("received Ctrl-C, shutting down…");

    // 1. Signal the dispatcher to stop accepting new intents.
    cancel.cancel();

    // 2. Wait for in-flight intents to complete (up to 10s).
    let in_flight = trainer::in_flight_count();
    if in_flight > 0 {
        info!(in_flight, "waiting for in-flight intents to drain…");
    }
    trainer::drain_in_flight(std::time::Duration::from_secs(10)).await;

    info!("shutdown complete");

    Ok(())
}
