pub mod basic_vectorizer;
pub mod config;
pub mod error;
pub mod export;
pub mod handlers;
pub mod options;
pub mod prompt;
pub mod state;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;

pub use config::AppConfig;
pub use state::AppState;

use handlers::{
    chat_handler, export_handler, health_check, modify_image_handler, recognize_font_handler,
    vectorize_handler,
};

pub fn create_app(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if origins.is_empty() {
        // No valid origins configured
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    };

    let max_body = state.config.max_upload_bytes;
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/vectorize", post(vectorize_handler))
        .route("/api/modify-image", post(modify_image_handler))
        .route("/api/recognize-font", post(recognize_font_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/export", post(export_handler));

    let router = match static_dir {
        Some(dir) => {
            info!("Serving static files from {}", dir.display());
            router.fallback_service(ServeDir::new(dir))
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
