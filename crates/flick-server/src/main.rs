mod config;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use flick_api::state::AppStateInner;
use flick_api::token::{TokenService, TokenSettings};
use flick_crypto::MessageCipher;
use flick_crypto::keys::{generate_key, key_to_base64};
use flick_db::{Database, DatabaseOptions};

use crate::config::Config;

const DEFAULT_LOG_FILTER: &str = "flick=debug,flick_api=debug,flick_db=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // `flick keygen` prints fresh secrets for a new deployment.
    if std::env::args().nth(1).as_deref() == Some("keygen") {
        println!("FLICK_JWT_SECRET={}", key_to_base64(&[generate_key(), generate_key()].concat()));
        println!("FLICK_MESSAGE_ENCRYPTION_KEY={}", key_to_base64(&generate_key()));
        return Ok(());
    }

    let config = Config::from_env()?;
    info!(?config, "configuration loaded");

    let db = Database::open(
        &config.db_path,
        &DatabaseOptions {
            readers: config.db_readers,
            ..DatabaseOptions::default()
        },
    )?;

    let tokens = TokenService::new(TokenSettings {
        secret: config.jwt_secret,
        issuer: config.token_issuer,
        audience: config.token_audience,
        ttl: config.token_ttl,
    });
    let cipher = MessageCipher::new(&config.message_key)?;

    let state = AppStateInner::new(db, tokens, cipher, config.db_timeout);

    let app = flick_api::router::build(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Flick server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Flick server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
