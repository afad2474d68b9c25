use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    common::types::{GuildId, now_ms},
    process::ReapReport,
    server::store::SessionStore,
};

/// How long an error record survives without a new error.
pub const ERROR_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Reclaims per-guild entries on guild departure and on a periodic sweep.
pub struct CleanupCoordinator {
    store: Arc<SessionStore>,
}

impl CleanupCoordinator {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Drops the guild's timer, configured voice channel and error record.
    ///
    /// Returns how many of those entries actually existed. Runs without suspending, so no
    /// other task observes a half-purged guild.
    pub fn purge_guild(&self, guild_id: &GuildId) -> usize {
        let removed = [
            self.store.timeouts.cancel(guild_id),
            self.store.voice_channels.remove(guild_id),
            self.store.errors.remove(guild_id),
        ]
        .into_iter()
        .filter(|removed| *removed)
        .count();

        if removed > 0 {
            info!("[{}] Purged {} guild entries", guild_id, removed);
        }
        removed
    }

    /// Drops error records older than [`ERROR_RETENTION`] at `now` (Unix ms).
    pub fn sweep_stale(&self, now: u64) -> usize {
        let removed = self.store.errors.sweep_older_than(now, ERROR_RETENTION);
        if removed > 0 {
            info!("Swept {} stale error records", removed);
        }
        removed
    }

    /// One full periodic pass: stale error records, then dead and orphaned processes.
    pub async fn run_sweep(&self) -> (usize, ReapReport) {
        let swept = self.sweep_stale(now_ms());
        let queries = self.store.queries.clone();
        let reaped = self
            .store
            .processes
            .reap(move |guild_id| queries.is_active(guild_id))
            .await;
        (swept, reaped)
    }

    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let (swept, reaped) = self.run_sweep().await;
                debug!(
                    "Cleanup sweep: errors={} dead={} orphans={}",
                    swept, reaped.dead_removed, reaped.orphans_terminated
                );
            }
        })
    }
}
