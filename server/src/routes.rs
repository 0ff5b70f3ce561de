use axum::{extract::State, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::facades::crud as facade_crud;
use crate::live::handlers as live_handlers;
use crate::state::AppState;
use crate::ws::handler as ws_handler;
use crate::ws::registry::RegistryStats;

/// GET /api/hub/connections: how many sockets the hub currently holds.
async fn hub_connections(State(state): State<AppState>) -> Json<RegistryStats> {
    Json(state.hub.stats())
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoints
    let ws_routes = Router::new()
        .route("/ws/facade/{id}", axum::routing::get(ws_handler::facade_ws))
        .route("/ws/facade/{id}/live", axum::routing::get(ws_handler::live_frames_ws))
        .route("/ws/monitor", axum::routing::get(ws_handler::monitor_ws));

    let facade_routes = Router::new()
        .route("/api/facades", axum::routing::get(facade_crud::list_facades))
        .route("/api/facades", axum::routing::post(facade_crud::create_facade))
        .route("/api/facades/{id}", axum::routing::get(facade_crud::get_facade))
        .route(
            "/api/facades/{id}/content",
            axum::routing::post(facade_crud::push_content),
        )
        .route(
            "/api/facades/{id}/status",
            axum::routing::get(live_handlers::get_status),
        )
        .route(
            "/api/facades/{id}/live",
            axum::routing::get(live_handlers::get_live_view),
        );

    let live_routes = Router::new()
        .route(
            "/api/live/heartbeat",
            axum::routing::post(live_handlers::post_heartbeat),
        )
        .route(
            "/api/live/play-event",
            axum::routing::post(live_handlers::post_play_event),
        )
        .route("/api/live/online", axum::routing::get(live_handlers::list_online));

    let ops_routes = Router::new()
        .route("/api/hub/connections", axum::routing::get(hub_connections))
        .route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(facade_routes)
        .merge(live_routes)
        .merge(ops_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
