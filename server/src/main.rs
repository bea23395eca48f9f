//! Param Adventures Access Server - Main Entry Point

use anyhow::{Context, Result};
use tracing::info;

use pa_server::{api, config, db, permissions};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pa_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Param Adventures access server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&db_pool).await?;

    // Seed roles and permissions
    if config.seed_default_catalog {
        permissions::ensure_default_catalog(&db_pool)
            .await
            .context("Failed to seed default permission catalog")?;
    } else {
        info!("Default catalog seeding disabled by configuration");
    }

    if let Some((email, password)) = config.bootstrap_admin() {
        permissions::ensure_bootstrap_admin(&db_pool, email, password)
            .await
            .context("Failed to ensure bootstrap admin")?;
    }

    // Build application state and router
    let state = api::AppState::new(db_pool, config.clone());
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
