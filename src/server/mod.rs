//! Gateway HTTP server
//!
//! Routes the forward-auth endpoint and the small management surface
//! around it, and runs them until shutdown.

pub mod handler;
pub mod state;

pub use state::{AppState, CookieSettings, cookie_value};

use crate::error::TransportError;
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", get(handler::authorize))
        .route("/me", get(handler::me))
        .route("/logout", post(handler::logout))
        .route("/rules", get(handler::rules_source))
        .route("/rules/reload", post(handler::reload_rules))
        .route("/health", get(handler::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway until `ct` is cancelled
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    ct: CancellationToken,
) -> Result<(), TransportError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(ct.cancelled_owned())
        .await?;
    Ok(())
}

/// Run the gateway on `bind` and wait for shutdown
///
/// Also runs the idle-session sweeper. Stops on Ctrl+C.
pub async fn run_server(
    state: AppState,
    bind: SocketAddr,
    sweep_interval: Duration,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Gateway listening on http://{}", listener.local_addr()?);

    let ct = CancellationToken::new();
    let sweeper = state.sessions.clone().spawn_sweeper(sweep_interval, ct.clone());

    let shutdown = ct.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
            }
            _ = shutdown.cancelled() => {}
        }
        shutdown.cancel();
    });

    let result = serve(listener, state, ct.clone()).await;
    ct.cancel();
    sweeper.await?;

    info!("Gateway stopped");
    Ok(result?)
}
