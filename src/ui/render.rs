use serde::Serialize;

use crate::{
    common::types::GuildId,
    player::{AudioSession, MAX_VOLUME, TrackDescriptor},
    ui::state::{TrackedState, UiState},
};

pub const VOLUME_CELLS: usize = 10;
const FILLED_CELL: char = '▰';
const EMPTY_CELL: char = '▱';

/// Above this total duration timestamps switch to `h:mm:ss`.
const HOURS_THRESHOLD_SECS: u64 = 36_000;

/// Data the presentation layer needs to draw a guild's player message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPayload {
    pub guild_id: GuildId,
    pub state: UiState,
    pub primary_text: String,
    pub image_url: Option<String>,
    /// `elapsed / total`, only while a track is loaded.
    pub progress: Option<String>,
    pub volume_bar: String,
    pub muted: bool,
    pub queue_length: usize,
    /// Extra line for the reply, such as an unsupported volume change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RenderPayload {
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Renders `tracked` for the guild. The session supplies the track, volume and the sink
/// whose position is shown as elapsed time.
pub fn render(
    guild_id: &GuildId,
    session: Option<&AudioSession>,
    tracked: &TrackedState,
) -> RenderPayload {
    let current = session.and_then(|s| s.current.as_ref());
    let (volume, muted) = session.map_or((MAX_VOLUME, false), |s| (s.volume, s.muted));

    let primary_text = match (tracked.state, current) {
        (UiState::Idle, _) => "Nothing is playing.".to_string(),
        (UiState::Loading, _) => match tracked.detail.as_deref() {
            Some(query) => format!("Loading {}...", query),
            None => "Loading...".to_string(),
        },
        (UiState::Error, _) => tracked
            .detail
            .clone()
            .unwrap_or_else(|| "Something went wrong.".to_string()),
        (UiState::Playing, Some(track)) => format!("Now playing: {}", track.title),
        (UiState::Paused, Some(track)) => format!("Paused: {}", track.title),
        (UiState::Playing | UiState::Paused, None) => "Nothing is playing.".to_string(),
    };

    let shows_track = matches!(tracked.state, UiState::Playing | UiState::Paused);
    let (image_url, progress_line) = match (shows_track, session, current) {
        (true, Some(session), Some(track)) => {
            let elapsed = session.sink.position_ms();
            (cover_image(track), Some(progress(elapsed, track.duration_ms)))
        }
        _ => (None, None),
    };

    RenderPayload {
        guild_id: guild_id.clone(),
        state: tracked.state,
        primary_text,
        image_url,
        progress: progress_line,
        volume_bar: volume_bar(volume, muted),
        muted,
        queue_length: session.map_or(0, |s| s.lazy_load().total_count),
        note: None,
    }
}

/// Spotify tracks show their album art ahead of the resolver thumbnail.
pub fn cover_image(track: &TrackDescriptor) -> Option<String> {
    if track.is_spotify {
        track
            .image_url
            .clone()
            .or_else(|| track.thumbnail_url.clone())
    } else {
        track.thumbnail_url.clone()
    }
}

/// `elapsed / total`. Unknown durations (0) render as a live stream.
pub fn progress(elapsed_ms: u64, total_ms: u64) -> String {
    if total_ms == 0 {
        return format!("{} / LIVE", format_timestamp(elapsed_ms, 0));
    }
    let elapsed_ms = elapsed_ms.min(total_ms);
    format!(
        "{} / {}",
        format_timestamp(elapsed_ms, total_ms),
        format_timestamp(total_ms, total_ms)
    )
}

/// Formats `ms` as `m:ss`, or `h:mm:ss` when the track's total runs past 10 hours.
pub fn format_timestamp(ms: u64, total_ms: u64) -> String {
    let secs = ms / 1000;
    if total_ms / 1000 > HOURS_THRESHOLD_SECS {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

pub fn filled_cells(volume: u8) -> usize {
    let volume = volume.min(MAX_VOLUME) as usize;
    volume.div_ceil(10).min(VOLUME_CELLS)
}

pub fn volume_bar(volume: u8, muted: bool) -> String {
    let filled = if muted { 0 } else { filled_cells(volume) };
    let mut bar = String::with_capacity(VOLUME_CELLS * 3 + 8);
    bar.extend(std::iter::repeat_n(FILLED_CELL, filled));
    bar.extend(std::iter::repeat_n(EMPTY_CELL, VOLUME_CELLS - filled));
    if muted {
        bar.push_str(" muted");
    } else {
        bar.push_str(&format!(" {}%", volume.min(MAX_VOLUME)));
    }
    bar
}
