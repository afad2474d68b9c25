use std::{collections::VecDeque, sync::Arc};

use serde::Serialize;

use crate::{common::types::now_ms, player::sink::AudioSink};

pub const DEFAULT_VOLUME: u8 = 100;
pub const MAX_VOLUME: u8 = 100;

/// Everything needed to render and stream one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackDescriptor {
    pub title: String,
    pub duration_ms: u64,
    pub thumbnail_url: Option<String>,
    /// Canonical URL the stream is resolved from.
    pub source: String,
    pub is_spotify: bool,
    /// Album art for Spotify tracks; preferred over the thumbnail when present.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyLoadInfo {
    pub total_count: usize,
}

/// Live playback state for one guild.
///
/// The queue is private: it only changes through [`GuildSessionRegistry`], which keeps
/// `lazy_load.total_count` equal to the queue length.
///
/// [`GuildSessionRegistry`]: crate::player::GuildSessionRegistry
#[derive(Clone)]
pub struct AudioSession {
    queue: VecDeque<TrackDescriptor>,
    pub sink: Arc<dyn AudioSink>,
    pub volume: u8,
    pub muted: bool,
    /// When the current track started, in Unix milliseconds.
    pub started_at: u64,
    lazy_load: LazyLoadInfo,
    pub current: Option<TrackDescriptor>,
}

impl AudioSession {
    pub fn new(sink: Arc<dyn AudioSink>) -> Self {
        Self {
            queue: VecDeque::new(),
            sink,
            volume: DEFAULT_VOLUME,
            muted: false,
            started_at: now_ms(),
            lazy_load: LazyLoadInfo::default(),
            current: None,
        }
    }

    pub fn queue(&self) -> &VecDeque<TrackDescriptor> {
        &self.queue
    }

    pub fn lazy_load(&self) -> LazyLoadInfo {
        self.lazy_load
    }

    /// Linear gain the sink should output at.
    pub fn effective_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume as f32 / MAX_VOLUME as f32
        }
    }

    pub(super) fn push_track(&mut self, track: TrackDescriptor) -> usize {
        self.queue.push_back(track);
        self.sync_lazy_load()
    }

    /// Moves the next queued track into `current`. `None` once the queue is exhausted.
    pub(super) fn advance(&mut self) -> Option<TrackDescriptor> {
        let next = self.queue.pop_front();
        self.sync_lazy_load();
        self.current = next.clone();
        if next.is_some() {
            self.started_at = now_ms();
        }
        next
    }

    pub(super) fn remove_at(&mut self, index: usize) -> Option<TrackDescriptor> {
        let removed = self.queue.remove(index);
        self.sync_lazy_load();
        removed
    }

    pub(super) fn clear_queue(&mut self) -> usize {
        let cleared = self.queue.len();
        self.queue.clear();
        self.sync_lazy_load();
        cleared
    }

    fn sync_lazy_load(&mut self) -> usize {
        self.lazy_load.total_count = self.queue.len();
        self.lazy_load.total_count
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("queue_len", &self.queue.len())
            .field("sink_status", &self.sink.status())
            .field("volume", &self.volume)
            .field("muted", &self.muted)
            .field("started_at", &self.started_at)
            .field("current", &self.current.as_ref().map(|t| &t.title))
            .finish()
    }
}
