//! Social graph API server
//!
//! Serves the JSON API over either the in-memory store or PostgreSQL,
//! selected by `STORE_BACKEND`.
//!
//! # Graceful Shutdown
//!
//! SIGTERM and SIGINT stop the listener, let in-flight requests finish and
//! then close the database pool.

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use socialgraph::api::{self, AppState};
use socialgraph::auth::SessionStore;
use socialgraph::{store, Config, Result};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Social graph server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Configuration loaded and validated");

    let (store, db) = store::connect(&config).await?;
    let state = Arc::new(AppState::new(
        store,
        SessionStore::new(config.auth.session_ttl),
    ));

    info!(
        "Health: http://{}:{}/health",
        config.api.host, config.api.port
    );
    let served = api::start_server(state, &config.api, shutdown_signal()).await;
    if let Err(e) = &served {
        error!("API server error: {:?}", e);
    }

    if let Some(db) = db {
        db.close().await;
    }

    info!("Server stopped");
    served
}

/// Initialize structured logging with tracing
///
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("socialgraph=debug,socialgraph_server=debug,tower_http=debug,sqlx=warn,info")
    });

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(std::env::var("NO_COLOR").is_err()),
            )
            .init();
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
