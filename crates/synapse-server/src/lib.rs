pub mod api;
pub mod auth;
pub mod calls;
pub mod config;
pub mod error;
pub mod health;
pub mod hub;
pub mod lifecycle;
pub mod registry;
pub mod state;
pub mod store;
pub mod tasks;
pub mod voice;
pub mod ws;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware;
use tower_http::cors::{Any, CorsLayer};

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    build_app_with_state(AppState::new(config))
}

/// Build the router around an existing state (e.g. one with a custom store).
pub fn build_app_with_state(state: AppState) -> (Router<()>, AppState) {
    let cors = cors_layer(&state.config.cors_origins);

    // API routes (behind bearer auth middleware)
    let api_routes = Router::new()
        .route("/rooms", axum::routing::post(api::create_room))
        .route("/rooms/join", axum::routing::post(api::join_room))
        .route(
            "/rooms/{code}/analysis",
            axum::routing::get(api::get_analysis).put(api::put_analysis),
        )
        .route("/roadmaps", axum::routing::post(api::create_roadmap))
        .route(
            "/roadmaps/{id}/tasks/{task_id}/complete",
            axum::routing::post(api::complete_task),
        )
        .route("/users/{user_id}/points", axum::routing::get(api::user_points))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .nest("/api/v1", api_routes)
        .layer(cors)
        .with_state(state.clone());

    (app, state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    layer.allow_origin(origins)
}

/// Middleware wrapper that injects AuthConfig into request extensions for the
/// bearer auth middleware.
async fn bearer_auth_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, error::AppError> {
    request.extensions_mut().insert(state.auth.clone());
    auth::bearer_auth_middleware(request.headers().clone(), request, next).await
}
