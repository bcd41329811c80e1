use std::sync::Arc;

use chrono::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sync_backend::auth::{GoogleTokenInfoVerifier, JwtKeys};
use sync_backend::config::Config;
use sync_backend::store::Store;
use sync_backend::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let addr = config.addr()?;

    let store = Store::open(&config.db_path)?;
    if config.google_client_id.is_none() {
        info!("GOOGLE_CLIENT_ID not set, Google sign-in disabled");
    }

    let state = AppState {
        store: Arc::new(store),
        jwt: Arc::new(JwtKeys::new(&config.jwt_secret, Duration::days(config.jwt_ttl_days))),
        google: Arc::new(GoogleTokenInfoVerifier::new(config.google_client_id.clone())),
    };

    let app = build_router(state);

    info!(%addr, db_path = %config.db_path, "server running");
    info!("API base: http://{}/api", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
