use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::{
    monitoring::{DiagnosticsReport, collect_diagnostics},
    process::ProcessStatusReport,
    server::AppState,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub version: String,
    pub branch: String,
    pub commit: String,
    pub build_time: u64,
    pub profile: String,
    pub uptime_ms: u64,
    pub resolver: String,
}

/// GET /v1/info
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<Info> {
    tracing::debug!("GET /v1/info");
    let build = &state.build;
    Json(Info {
        version: build.version.to_string(),
        branch: build.branch.to_string(),
        commit: build.commit.to_string(),
        build_time: build.build_time,
        profile: build.profile.to_string(),
        uptime_ms: state.start_time.elapsed().as_millis() as u64,
        resolver: state.config.resolver.program.clone(),
    })
}

/// GET /v1/diagnostics
pub async fn get_diagnostics(State(state): State<Arc<AppState>>) -> Json<DiagnosticsReport> {
    tracing::debug!("GET /v1/diagnostics");
    Json(collect_diagnostics(
        &state.store,
        state.config.cleanup.diagnostics_sample_size,
    ))
}

/// GET /v1/processes
pub async fn get_processes(State(state): State<Arc<AppState>>) -> Json<ProcessStatusReport> {
    tracing::debug!("GET /v1/processes");
    Json(state.store.processes.get_status().await)
}
