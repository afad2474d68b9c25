use serde::Serialize;

use crate::{
    common::types::{ChannelId, GuildId, now_ms},
    lifecycle::TimeoutInfo,
    player::PlaybackStatus,
    process::ProcessRecord,
    resolver::ActiveQuery,
    server::{error_records::ErrorRecord, store::SessionStore},
    ui::TrackedState,
};

/// One registry: its size, every key, and the first few entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryReport<T> {
    pub size: usize,
    pub keys: Vec<GuildId>,
    pub sample: Vec<Sample<T>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample<T> {
    pub guild_id: GuildId,
    pub entry: T,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSample {
    pub status: PlaybackStatus,
    pub current_title: Option<String>,
    pub queue_length: usize,
    pub volume: u8,
    pub muted: bool,
    pub started_at: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub generated_at: u64,
    pub sessions: RegistryReport<SessionSample>,
    pub active_queries: RegistryReport<ActiveQuery>,
    pub processes: RegistryReport<Vec<ProcessRecord>>,
    pub timeouts: RegistryReport<TimeoutInfo>,
    pub voice_channels: RegistryReport<ChannelId>,
    pub error_records: RegistryReport<ErrorRecord>,
    pub ui_states: RegistryReport<TrackedState>,
    pub pending_requests: usize,
    pub total_processes: usize,
    pub query_releases: u64,
}

fn registry<T>(mut entries: Vec<(GuildId, T)>, sample_size: usize) -> RegistryReport<T> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let keys = entries.iter().map(|(k, _)| k.clone()).collect();
    RegistryReport {
        size: entries.len(),
        keys,
        sample: entries
            .into_iter()
            .take(sample_size)
            .map(|(guild_id, entry)| Sample { guild_id, entry })
            .collect(),
    }
}

/// Read-only walk over every registry in the store. Never probes processes or awaits.
pub fn collect_diagnostics(store: &SessionStore, sample_size: usize) -> DiagnosticsReport {
    let mut sessions = Vec::with_capacity(store.sessions.len());
    store.sessions.for_each(|guild_id, session| {
        sessions.push((
            guild_id.clone(),
            SessionSample {
                status: session.sink.status(),
                current_title: session.current.as_ref().map(|t| t.title.clone()),
                queue_length: session.lazy_load().total_count,
                volume: session.volume,
                muted: session.muted,
                started_at: session.started_at,
            },
        ));
    });

    let processes: Vec<_> = store.processes.snapshot().into_iter().collect();
    let total_processes = processes.iter().map(|(_, r)| r.len()).sum();

    DiagnosticsReport {
        generated_at: now_ms(),
        sessions: registry(sessions, sample_size),
        active_queries: registry(store.queries.snapshot(), sample_size),
        processes: registry(processes, sample_size),
        timeouts: registry(store.timeouts.snapshot(), sample_size),
        voice_channels: registry(store.voice_channels.snapshot(), sample_size),
        error_records: registry(store.errors.snapshot(), sample_size),
        ui_states: registry(store.ui.snapshot(), sample_size),
        pending_requests: store.pending_requests(),
        total_processes,
        query_releases: store.queries.release_count(),
    }
}
