//! Account Service Server
//!
//! Loads configuration from the environment, wires the store, mailer and
//! services together and serves the full route table behind the admission
//! pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;

use account_service::{
    api::{create_app, create_routes, AdmissionState, AppState},
    config::AppConfig,
    database::{AccountStore, MemoryStore, PgStore},
    service::{AuthService, LogMailer, Mailer, SmtpMailer, TokenIssuer},
    utils::CredentialHasher,
    VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_level.as_str()),
    )
    .init();

    config.validate().context("Invalid configuration")?;
    log::info!("Starting Account Service v{}", VERSION);

    let store: Arc<dyn AccountStore> = match &config.database {
        Some(database) => {
            let pool = database
                .create_pool()
                .await
                .context("Failed to connect to the database")?;

            log::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            Arc::new(PgStore::new(pool))
        }
        None => {
            log::warn!("DATABASE_URL not set, accounts are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.email {
        Some(email) => Arc::new(SmtpMailer::new(email)?),
        None => {
            log::warn!("SMTP_HOST not set, confirmation emails are written to the log");
            Arc::new(LogMailer)
        }
    };

    let auth_service = AuthService::new(
        store,
        mailer,
        CredentialHasher::new(config.hashing.clone()),
        TokenIssuer::from_config(&config.jwt),
        config.signup.clone(),
    )?;

    let admission = AdmissionState::new(config.admission.clone());
    let purge_task = admission
        .limiter
        .clone()
        .spawn_purge_task(config.admission.rate_limit.window);

    let state = AppState {
        auth_service: Arc::new(auth_service),
    };
    let app = create_app(create_routes(), state, admission);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    log::info!("Listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    purge_task.abort();
    log::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
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

    log::info!("Shutdown signal received");
}
