use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::common::types::{GuildId, now_ms};

/// Why a guild's inactivity timer was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutReason {
    /// The queue ran dry.
    Idle,
    /// Playback stayed paused.
    Paused,
}

struct ArmedTimer {
    generation: u64,
    reason: TimeoutReason,
    armed_at: u64,
    fires_at: u64,
    task: JoinHandle<()>,
}

/// Public view of an armed timer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutInfo {
    pub reason: TimeoutReason,
    pub armed_at: u64,
    pub fires_at: u64,
}

/// Per-guild cancellable inactivity timers.
///
/// At most one timer per guild. A timer that fires removes itself before running its
/// callback, so a later `cancel` is a no-op.
#[derive(Default)]
pub struct TimeoutSupervisor {
    timers: Arc<DashMap<GuildId, ArmedTimer>>,
    next_generation: AtomicU64,
}

impl TimeoutSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any timer armed for the guild with one that runs `on_fire` after `after`.
    pub fn arm<F, Fut>(&self, guild_id: &GuildId, after: Duration, reason: TimeoutReason, on_fire: F)
    where
        F: FnOnce(GuildId, TimeoutReason) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel(guild_id);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timers = self.timers.clone();
        let guild = guild_id.clone();
        // Hold the slot while spawning so a zero-length timer cannot look for itself early.
        let slot = self.timers.entry(guild_id.clone());
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;

            // A cancel or re-arm that raced the wake-up owns the slot now.
            if timers
                .remove_if(&guild, |_, t| t.generation == generation)
                .is_none()
            {
                return;
            }
            info!("[{}] Inactivity timeout fired ({:?})", guild, reason);
            on_fire(guild, reason).await;
        });

        let armed_at = now_ms();
        slot.insert(ArmedTimer {
            generation,
            reason,
            armed_at,
            fires_at: armed_at + after.as_millis() as u64,
            task,
        });
        debug!("[{}] Armed {:?} timeout for {:?}", guild_id, reason, after);
    }

    /// Cancels the guild's timer. Returns whether one was armed.
    pub fn cancel(&self, guild_id: &GuildId) -> bool {
        match self.timers.remove(guild_id) {
            Some((_, timer)) => {
                timer.task.abort();
                debug!("[{}] Cancelled {:?} timeout", guild_id, timer.reason);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, guild_id: &GuildId) -> bool {
        self.timers.contains_key(guild_id)
    }

    pub fn info(&self, guild_id: &GuildId) -> Option<TimeoutInfo> {
        self.timers.get(guild_id).map(|t| TimeoutInfo {
            reason: t.reason,
            armed_at: t.armed_at,
            fires_at: t.fires_at,
        })
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn snapshot(&self) -> Vec<(GuildId, TimeoutInfo)> {
        self.timers
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    TimeoutInfo {
                        reason: e.reason,
                        armed_at: e.armed_at,
                        fires_at: e.fires_at,
                    },
                )
            })
            .collect()
    }

    pub fn cancel_all(&self) -> usize {
        let guilds: Vec<GuildId> = self.timers.iter().map(|e| e.key().clone()).collect();
        guilds.iter().filter(|g| self.cancel(g)).count()
    }
}
