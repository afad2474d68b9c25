use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{debug, info};

use crate::{
    commands::Command,
    common::{errors::ApiError, types::GuildId},
    server::{AppState, ReplyTarget},
};

/// POST /v1/guilds/{guild_id}/commands
pub async fn run_command(
    Path(guild_id): Path<GuildId>,
    Query(reply): Query<ReplyTarget>,
    State(state): State<Arc<AppState>>,
    body: Result<Json<Command>, JsonRejection>,
) -> Response {
    let path = format!("/v1/guilds/{}/commands", guild_id);
    let command = match body {
        Ok(Json(command)) => command,
        Err(rejection) => {
            debug!("POST {} rejected: {}", path, rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiError::bad_request(rejection.body_text(), path)),
            )
                .into_response();
        }
    };

    info!("POST {} ({})", path, command.name());
    let response = state.service.handle(&guild_id, command, reply).await;
    Json(response).into_response()
}

/// POST /v1/guilds/{guild_id}/track-end
pub async fn track_end(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
) -> Response {
    debug!("POST /v1/guilds/{}/track-end", guild_id);
    if !state.store.sessions.contains(&guild_id) {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(
                "No session for this guild",
                format!("/v1/guilds/{}/track-end", guild_id),
            )),
        )
            .into_response();
    }
    let response = state
        .service
        .handle(&guild_id, Command::TrackFinished, ReplyTarget::default())
        .await;
    Json(response).into_response()
}

/// DELETE /v1/guilds/{guild_id}
pub async fn remove_guild(
    Path(guild_id): Path<GuildId>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    info!("DELETE /v1/guilds/{}", guild_id);
    state
        .service
        .handle(&guild_id, Command::Leave, ReplyTarget::default())
        .await;
    StatusCode::NO_CONTENT
}
