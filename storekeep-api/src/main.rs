//! # Storekeep API Server
//!
//! REST backend for Storekeep accounts: signup, email verification, login,
//! password reset and password change.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p storekeep-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use storekeep_api::{
    app::{build_router, AppState},
    config::Config,
};
use storekeep_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    mail::{LogMailer, Mailer, SmtpMailer},
    store::PgCredentialStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "storekeep_api=debug,storekeep_shared=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Storekeep API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let mailer: Arc<dyn Mailer> = match config.smtp_settings() {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Using SMTP mailer");
            Arc::new(SmtpMailer::new(&smtp).context("Failed to configure SMTP")?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, emails will be written to the log");
            Arc::new(LogMailer::new())
        }
    };

    let bind_address = config.bind_address();
    let store = Arc::new(PgCredentialStore::new(pool.clone()));
    let app = build_router(AppState::new(config, store, mailer));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, closing database pool");
    close_pool(pool).await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
