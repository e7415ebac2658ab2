//! Trade-surveillance pipeline supervisor: entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tw_sentinel::config::Settings;
use tw_sentinel::shutdown::{self, DEFAULT_GRACE_PERIOD};
use tw_sentinel::Supervisor;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

/// Real-time trade anomaly-detection pipeline supervisor.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file (overrides TW_CONFIG env var).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate configuration and exit without starting the pipeline.
    #[arg(long)]
    config_check: bool,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Run with alert dispatch routed to the dry-run channel only.
    #[arg(long)]
    dry_run: bool,

    /// Override the configured health check HTTP port.
    #[arg(long)]
    health_port: Option<u16>,
}

fn resolve_config_path(args: &Args) -> Option<PathBuf> {
    args.config.clone().or_else(|| std::env::var("TW_CONFIG").ok().map(PathBuf::from))
}

fn load_settings(args: &Args) -> Result<Settings, tw_sentinel::AppError> {
    let config_path = resolve_config_path(args);
    let mut settings = Settings::load(config_path.as_deref())?;

    if let Some(log_level) = &args.log_level {
        settings.log_level = log_level.clone();
    }
    if args.dry_run {
        settings.dry_run = true;
    }
    if let Some(health_port) = args.health_port {
        settings.health_port = health_port;
    }
    Ok(settings)
}

fn print_config_summary(settings: &Settings) {
    println!("tradewatch pipeline supervisor v{}", env!("CARGO_PKG_VERSION"));
    println!("{}", serde_json::to_string_pretty(&settings.redacted_summary()).unwrap_or_default());
    println!("discord alerts: {}", if settings.discord.enabled() { "enabled" } else { "disabled" });
    println!("telegram alerts: {}", if settings.telegram.enabled() { "enabled" } else { "disabled" });
    println!("dry run: {}", settings.dry_run);
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if args.config_check {
        print_config_summary(&settings);
        return ExitCode::from(EXIT_SUCCESS);
    }

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", format!("{},tw=debug", settings.log_level.to_ascii_lowercase()));
    }
    if let Err(e) = tw_telemetry::init_logging() {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::from(EXIT_ERROR);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "starting tradewatch pipeline supervisor");

    let shutdown_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown::watch_for_signals(shutdown_token.clone(), DEFAULT_GRACE_PERIOD));

    let supervisor = Supervisor::new(settings);
    let result = supervisor.run(shutdown_token).await;
    signal_handle.abort();

    match result {
        Ok(()) => {
            info!("pipeline supervisor exited cleanly");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "pipeline supervisor exited with error");
            ExitCode::from(EXIT_ERROR)
        }
    }
}
