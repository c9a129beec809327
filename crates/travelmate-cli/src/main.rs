//! TravelMate CLI - session and travel-plan commands.
//!
//! Each invocation recovers the stored session, runs one command through the
//! resilient API client, applies any session invalidation the server caused,
//! and exits.

mod cli;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use travelmate_core::context::open_credential_store;
use travelmate_core::{Config, SessionContext};

/// Prefix of the daily rolling log file
const LOG_FILE_PREFIX: &str = "travelmate.log";

fn default_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the log file on drop and must outlive `main`'s work.
fn init_tracing(config: &Config, verbosity: u8) -> Result<Option<WorkerGuard>> {
    // RUST_LOG overrides the -v level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));

    let (file_layer, guard) = if config.log_to_file {
        let dir = config.logs_dir()?;
        std::fs::create_dir_all(&dir)?;
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        )
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let matches = cli::commands::new().get_matches();

    let mut config = Config::load()?;
    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api_base_url = url.clone();
    }

    let _guard = init_tracing(&config, matches.get_count("verbosity"))?;
    info!("TravelMate CLI starting");

    let action = cli::dispatch::handler(&matches)?;

    let store = open_credential_store(&config)?;
    let mut ctx = SessionContext::init(config, store)?;

    let result = cli::actions::handle(action, &mut ctx).await;
    ctx.dispose();

    info!("TravelMate CLI shutting down");
    result
}
