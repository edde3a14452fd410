//! Forward-auth gateway
//!
//! Decides, for every request a reverse proxy forwards, whether the caller
//! may proceed.

use clap::Parser;
use gatekeeper::{
    config::load_config,
    logging::init_logging,
    server::{AppState, run_server},
};
use std::net::SocketAddr;
use tracing::{error, info};

/// Gatekeeper - forward-auth gateway with role rules and delegated decisions
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "GATEKEEPER_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GATEKEEPER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Listen host (overrides server.host)
    #[arg(long, env = "GATEKEEPER_HOST")]
    host: Option<String>,

    /// Listen port (overrides server.port)
    #[arg(long, env = "GATEKEEPER_PORT")]
    port: Option<u16>,

    /// Rule file (overrides rules.path)
    #[arg(long, env = "GATEKEEPER_RULES")]
    rules: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    init_logging(&config.logging, args.log_level.as_deref());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting gatekeeper"
    );

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(rules) = args.rules {
        config.rules.path = rules.into();
    }

    let bind: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .inspect_err(|e| error!(error = %e, "Invalid listen address"))?;

    let state = AppState::from_config(&config)
        .inspect_err(|e| error!(error = %e, "Failed to initialize gateway"))?;
    info!(
        rules = state.rules().snapshot().len(),
        path = %config.rules.path.display(),
        "Rule table ready"
    );

    run_server(state, bind, config.session.sweep_interval()).await
}
