use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    server::AppState,
    transport::{
        middleware::{add_response_headers, check_auth},
        routes::{guilds, stats},
    },
};

const API_V1: &str = "/v1";

pub fn router(state: Arc<AppState>) -> Router {
    let v1_routes = Router::new()
        .route("/guilds/{guild_id}", delete(guilds::remove_guild))
        .route("/guilds/{guild_id}/commands", post(guilds::run_command))
        .route("/guilds/{guild_id}/track-end", post(guilds::track_end))
        .route("/diagnostics", get(stats::get_diagnostics))
        .route("/processes", get(stats::get_processes))
        .route("/info", get(stats::get_info));

    Router::new()
        .nest(API_V1, v1_routes)
        .layer(middleware::from_fn_with_state(state.clone(), check_auth))
        .layer(middleware::from_fn(add_response_headers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
