use anyhow::Context;
use tracing::{info, warn};

use vector_backend::{create_app, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting vectorizer backend");

    let config = AppConfig::from_env();
    if config.replicate_api_token.is_none() {
        warn!("REPLICATE_API_TOKEN not set; AI endpoints will fail, basic vectorization still works");
    }

    let addr = config.bind_addr.clone();
    let app = create_app(AppState::from_config(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
