//! Bookshelf server entry point
//!
//! Loads configuration, connects the database and serves the GraphQL API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookshelf::config::Config;
use bookshelf::db::Database;
use bookshelf::graphql;
use bookshelf::services::{AuthConfig, AuthService, BookEvents};
use bookshelf::{AppState, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookshelf=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Bookshelf");

    let config = Arc::new(Config::from_env()?);
    tracing::info!("Configuration loaded");

    tracing::info!(database_url = %config.database_url, "Connecting to database");
    let db = Database::connect(&config.database_url, config.database_max_connections).await?;
    db.sync_schema().await?;
    tracing::info!("Database connected");

    let auth = Arc::new(AuthService::new(db.clone(), AuthConfig::from_config(&config)));
    let events = Arc::new(BookEvents::new(config.book_events_capacity));

    let schema = graphql::build_schema(db.clone(), auth.clone(), events);
    tracing::info!("GraphQL schema built");

    let shutdown = CancellationToken::new();
    let state = AppState {
        db,
        schema,
        auth,
        shutdown: shutdown.clone(),
    };

    let ip = config
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid HOST '{}'", config.host))?;
    let addr = SocketAddr::new(ip, config.port);
    tracing::info!("Listening on {}", addr);
    tracing::info!("GraphQL playground: http://localhost:{}/graphql", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::spawn(cancel_on_ctrl_c(shutdown));
    serve(listener, state).await?;

    Ok(())
}

async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(e) => tracing::error!(error = %e, "Failed to install Ctrl-C handler, shutting down"),
    }
    shutdown.cancel();
}
