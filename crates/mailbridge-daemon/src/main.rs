//! MailBridge Daemon
//!
//! Long-running service that serves the mail authorization endpoints and
//! answers Discord direct messages with Gmail actions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use mailbridge_core::ai::create_backend;
use mailbridge_core::bot::{resolve, Assistant, Resolution};
use mailbridge_core::chat::{ChatClient, DiscordClient};
use mailbridge_core::config::Config;
use mailbridge_core::mail::{GmailClientFactory, MailClientFactory};
use mailbridge_core::web::{self, AppState};

/// How long tasks get to finish after shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "mailbridge")]
#[command(about = "Discord assistant for your Gmail inbox", long_about = None)]
struct Cli {
    /// Path to config file (defaults to ~/.config/mailbridge/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default if no command specified)
    Run,
    /// Resolve a chat message to a command without executing it
    Parse {
        /// Message text, e.g. "get 5 mail"
        text: String,
    },
    /// Write a config file with default values
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    if let Some(Commands::InitConfig { force }) = cli.command {
        return init_config(&config_path, force);
    }

    let config = Config::load_from(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let _guard = init_logging(&config)?;

    match cli.command {
        Some(Commands::Parse { text }) => parse(&config, &text).await,
        _ => run_daemon(config).await,
    }
}

/// Console logging, plus daily JSON log files when enabled
///
/// `RUST_LOG` takes precedence over `general.log_level`.
fn init_logging(config: &Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.general.log_level))
        .context("Invalid log level")?;
    let console = fmt::layer().with_target(true).with_thread_ids(true);

    if !config.general.log_to_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(&log_dir, "mailbridge.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().json().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save_to(path)?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

/// Print what a message would resolve to
async fn parse(config: &Config, text: &str) -> Result<()> {
    let ai = create_backend(&config.ai);
    match resolve(&ai, text).await {
        Resolution::Command(command) => println!("{}", serde_json::to_string_pretty(&command)?),
        Resolution::Failed(reason) => println!("No command ({})", reason),
        Resolution::Nothing => println!("No command"),
    }
    Ok(())
}

/// Run the web listener and the chat listener until Ctrl+C or either stops
async fn run_daemon(config: Config) -> Result<()> {
    info!("Starting MailBridge v{}", env!("CARGO_PKG_VERSION"));

    let token_dir = config.token_dir();
    let mail: Arc<dyn MailClientFactory> = Arc::new(
        GmailClientFactory::from_config(&config.gmail, &token_dir)
            .context("Failed to configure Gmail")?,
    );
    info!("Storing credentials in {:?}", token_dir);

    let ai = create_backend(&config.ai);
    if !ai.is_ready() {
        warn!("Running with the rule-based parser only");
    }

    let chat: Arc<dyn ChatClient> =
        Arc::new(DiscordClient::new(&config.discord).context("Failed to configure Discord")?);
    let assistant = Arc::new(Assistant::new(chat.clone(), mail.clone(), ai, &config.bot));

    let bind_addr = config.web.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let web_cancel = cancel.clone();
    tasks.spawn(async move {
        ("web server", web::serve(listener, AppState { mail }, web_cancel).await)
    });

    let chat_cancel = cancel.clone();
    tasks.spawn(async move { ("chat listener", chat.listen(assistant, chat_cancel).await) });

    info!("MailBridge is running. Press Ctrl+C to stop.");

    tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down...");
        }
        Some(joined) = tasks.join_next() => {
            report(joined);
            warn!("A task stopped, shutting down the rest");
        }
    }

    cancel.cancel();
    let drain = async {
        while let Some(joined) = tasks.join_next().await {
            report(joined);
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!("Tasks did not stop within {:?}, aborting", SHUTDOWN_GRACE);
        tasks.abort_all();
    }

    info!("MailBridge stopped");
    Ok(())
}

type TaskOutcome = (&'static str, mailbridge_core::Result<()>);

fn report(joined: std::result::Result<TaskOutcome, tokio::task::JoinError>) {
    match joined {
        Ok((name, Ok(()))) => info!("{} stopped", name),
        Ok((name, Err(e))) => error!("{} failed: {}", name, e),
        Err(e) => error!("Task panicked: {}", e),
    }
}
