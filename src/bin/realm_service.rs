//! Reference resource service
//!
//! Serves the realm authorization contract from a JSON resource table, for
//! rules that delegate with `!host:port`.

use clap::Parser;
use gatekeeper::{
    config::load_config,
    logging::init_logging,
    realm::{PathTemplate, RealmAuthorizer, ResourceTable, router},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Realm authorization service for one resource-owning backend
#[derive(Parser, Debug)]
#[command(name = "gatekeeper-realm")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (reads the [realm] section)
    #[arg(short, long, env = "GATEKEEPER_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GATEKEEPER_LOG_LEVEL")]
    log_level: Option<String>,

    /// JSON resource table (overrides realm.resources)
    #[arg(long, env = "GATEKEEPER_REALM_RESOURCES")]
    resources: Option<String>,

    /// Listen port (overrides realm.port)
    #[arg(long, env = "GATEKEEPER_REALM_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    init_logging(&config.logging, args.log_level.as_deref());

    if let Some(resources) = args.resources {
        config.realm.resources = resources.into();
    }
    if let Some(port) = args.port {
        config.realm.port = port;
    }
    let realm = &config.realm;

    let template = PathTemplate::new(&realm.prefix, &realm.kinds)
        .inspect_err(|e| error!(error = %e, "Invalid path template"))?;
    let table = ResourceTable::load(&realm.resources)
        .inspect_err(|e| error!(error = %e, "Failed to load resource table"))?;
    let authorizer = Arc::new(RealmAuthorizer::new(template, Arc::new(table)));

    let bind: SocketAddr = realm.bind_address().parse()?;
    let listener = TcpListener::bind(bind).await?;
    info!(
        prefix = %realm.prefix,
        kinds = ?realm.kinds,
        "Realm service listening on http://{}",
        listener.local_addr()?
    );

    axum::serve(listener, router(authorizer))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await?;

    Ok(())
}
