//! Water Monitor Server
//!
//! Run with: cargo run --bin water-monitor
//!
//! # Configuration
//!
//! Settings come from `--config <file>` or the default search path
//! (`~/.config/water-monitor/config.toml`, `/etc/water-monitor/config.toml`,
//! `./config.toml`), then environment variables:
//! - `WATER_MONITOR_HOST` / `HOST`: Host to bind to (default: 0.0.0.0)
//! - `WATER_MONITOR_PORT` / `PORT`: Port to listen on (default: 8000)
//! - `WATER_MONITOR_MOCK_INTERVAL_MS`: Generator interval (default: 3000)
//! - `WATER_MONITOR_VIEWER_INTERVAL_MS`: Viewer push interval (default: 3000)
//! - `WATER_MONITOR_LOG_LEVEL`, `WATER_MONITOR_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Overrides the log filter entirely

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use water_monitor::api::{serve, AppState};
use water_monitor::config::{generate_default_config, Config, LoggingConfig};

#[derive(Parser)]
#[command(name = "water-monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Real-time water quality telemetry relay")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Start with device data instead of synthetic readings
    #[arg(long)]
    real: bool,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::load_default().context("loading default config")?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.real {
        config.monitor.start_in_mock = false;
    }
    config.validate().context("invalid configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting water monitor v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        mock_interval_ms = config.monitor.mock_interval_ms,
        viewer_interval_ms = config.monitor.viewer_interval_ms,
        static_dir = ?config.monitor.static_dir,
        "Monitor settings"
    );

    let state = AppState::from_config(&config);
    serve(state, &config).await.context("server failed")?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "water_monitor={},tower_http=info",
            logging.level
        ))
    });

    let json = logging.is_json();
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
