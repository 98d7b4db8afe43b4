use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use campus_server::chatbot::{ChatbotClient, UnconfiguredChatbot, http::HttpChatbotClient};
use campus_server::config::Config;
use campus_server::email::{EmailClient, http::HttpEmailClient, mock::NoOpEmailClient};
use campus_server::state::{AppState, Services};
use campus_server::storage::{StorageClient, noop::NoOpStorageClient, r2::R2StorageClient};
use campus_server::{db, routes};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn build_services(cfg: &Config) -> Result<Services> {
    let storage: Arc<dyn StorageClient> = if cfg.r2_configured() {
        Arc::new(R2StorageClient::new(cfg)?)
    } else {
        tracing::warn!("R2 not configured; uploads fall back to default media URLs");
        Arc::new(NoOpStorageClient)
    };
    let email: Arc<dyn EmailClient> = if cfg.email_api_key.is_some() {
        Arc::new(HttpEmailClient::new(cfg)?)
    } else {
        tracing::warn!("EMAIL_API_KEY not set; outgoing email is dropped");
        Arc::new(NoOpEmailClient)
    };
    let chatbot: Arc<dyn ChatbotClient> = match cfg.chatbot_url.as_deref() {
        Some(url) => Arc::new(HttpChatbotClient::new(url)?),
        None => {
            tracing::warn!("CHATBOT_URL not set; chat requests will return 503");
            Arc::new(UnconfiguredChatbot)
        }
    };
    Ok(Services {
        email,
        storage,
        chatbot,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env();
    tracing::debug!(config = ?cfg, "loaded configuration");

    let database_url = cfg
        .database_url
        .as_deref()
        .context("DATABASE_URL is required")?;
    let pool = db::create_pool(database_url).await?;
    if cfg.run_migrations {
        db::run_migrations(&pool).await?;
    } else {
        tracing::info!("RUN_MIGRATIONS=false; skipping migrations");
    }

    let state = AppState::new(pool, &cfg, build_services(&cfg)?)?;
    let app = routes::create_router(state);

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl_c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::warn!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
