use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cloudbox::config::Config;
use cloudbox::server::{self, AppState};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Version injected at compile time via CLOUDBOX_VERSION env var (set by CI/CD),
/// or the crate version for local builds.
pub const VERSION: &str = match option_env!("CLOUDBOX_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Single-endpoint cloud automation shim
#[derive(Parser, Debug)]
#[command(name = "cloudbox", version, about, long_about = None)]
struct Args {
    /// YAML config file (default: CLOUDBOX_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket address to listen on, overrides the configured one
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to a file instead of stderr; without a value the default
    /// path under the user config directory is used
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    let (writer, guard, log_path) = match log_file {
        Some(path) => {
            let log_path = if path.as_os_str().is_empty() {
                get_log_path()
            } else {
                path.to_path_buf()
            };
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (writer, guard, Some(log_path))
        }
        None => {
            let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
            (writer, guard, None)
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_path.is_none())
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("cloudbox {} started with log level: {:?}", VERSION, level);
    if let Some(path) = log_path {
        tracing::info!("Log file: {:?}", path);
    }

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("cloudbox").join("cloudbox.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".cloudbox").join("cloudbox.log");
    }
    PathBuf::from("cloudbox.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    tracing::debug!(
        listen = %config.listen_addr,
        bucket = ?config.bucket_name,
        control_plane = %config.control_plane_url,
        "configuration loaded"
    );

    let gateways = cloudbox::cloud::gateways(&config)?;
    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(AppState::new(Arc::new(config), gateways));
    let router = server::router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", listen_addr))?;
    tracing::info!("cloudbox ready on http://{}", listen_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    tracing::info!("cloudbox shut down");
    Ok(())
}

/// Wait for Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
