use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    common::types::GuildId,
    configs::CleanupConfig,
    lifecycle::timeout::{TimeoutReason, TimeoutSupervisor},
    player::GuildSessionRegistry,
    process::ProcessRegistry,
    resolver::QueryDeduplicator,
    server::{
        error_records::ErrorRecords,
        voice::{VoiceChannels, VoiceLink},
    },
    ui::{StateCoordinator, UiEvent, UiState},
};

/// Why a guild's playback was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Stop,
    Leave,
    Timeout(TimeoutReason),
    Shutdown,
}

/// Every per-guild map of the process, owned in one place.
///
/// Components receive the store (or the piece of it they need) instead of reaching for
/// globals. All maps are keyed by [`GuildId`].
pub struct SessionStore {
    pub sessions: GuildSessionRegistry,
    pub queries: Arc<QueryDeduplicator>,
    pub processes: Arc<ProcessRegistry>,
    pub timeouts: TimeoutSupervisor,
    pub voice_channels: VoiceChannels,
    pub voice: VoiceLink,
    pub errors: ErrorRecords,
    pub ui: StateCoordinator,
    /// Ticket of the play request currently allowed to commit its result.
    requests: DashMap<GuildId, u64>,
    next_ticket: AtomicU64,
}

impl SessionStore {
    pub fn new(
        queries: Arc<QueryDeduplicator>,
        processes: Arc<ProcessRegistry>,
        voice: VoiceLink,
        cleanup: &CleanupConfig,
    ) -> Self {
        Self {
            sessions: GuildSessionRegistry::new(),
            queries,
            processes,
            timeouts: TimeoutSupervisor::new(),
            voice_channels: VoiceChannels::new(),
            voice,
            errors: ErrorRecords::new(cleanup),
            ui: StateCoordinator::new(),
            requests: DashMap::new(),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Registers a play request; any earlier ticket for the guild stops being current.
    pub fn begin_request(&self, guild_id: &GuildId) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.requests.insert(guild_id.clone(), ticket);
        ticket
    }

    /// Whether the request may still commit. Checked after every suspension point.
    pub fn is_current(&self, guild_id: &GuildId, ticket: u64) -> bool {
        self.requests.get(guild_id).is_some_and(|t| *t == ticket)
    }

    pub fn finish_request(&self, guild_id: &GuildId, ticket: u64) {
        self.requests.remove_if(guild_id, |_, t| *t == ticket);
    }

    /// Invalidates the guild's in-flight play request, if any.
    pub fn supersede(&self, guild_id: &GuildId) -> bool {
        self.requests.remove(guild_id).is_some()
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Stops playback for the guild: drops the session and its sink, cancels the timer,
    /// frees the query slot, discards any in-flight request and asks the transport to
    /// disconnect. Returns whether there was anything to stop.
    pub fn teardown(&self, guild_id: &GuildId, reason: TeardownReason) -> bool {
        let superseded = self.supersede(guild_id);
        let released = self.queries.release(guild_id);
        self.timeouts.cancel(guild_id);

        let session = self.sessions.delete(guild_id);
        if let Some(session) = &session {
            session.sink.stop();
            self.voice.leave(guild_id);
        }

        if self.ui.state(guild_id) != UiState::Idle {
            let _ = self.ui.apply(guild_id, UiEvent::Stopped);
        }

        let stopped = session.is_some() || superseded || released;
        if stopped {
            info!(
                "[{}] Torn down ({:?}); session: {}, in-flight request: {}",
                guild_id,
                reason,
                session.is_some(),
                superseded
            );
        }
        stopped
    }

    /// Cancels every timer, stops every session, terminates every tracked process and
    /// clears the maps.
    pub async fn shutdown(&self) {
        let timers = self.timeouts.cancel_all();
        let guilds = self.sessions.guild_ids();
        for guild_id in &guilds {
            self.teardown(guild_id, TeardownReason::Shutdown);
        }
        for (guild_id, _) in self.queries.snapshot() {
            self.queries.release(&guild_id);
        }
        self.requests.clear();

        let killed = self.processes.terminate_all().await;

        self.voice_channels.clear();
        self.errors.clear();
        self.ui.clear();
        info!(
            "Session store shut down: {} sessions, {} timers, {} processes",
            guilds.len(),
            timers,
            killed
        );
        debug!("Remaining tracked processes: {}", self.processes.total_processes());
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        common::types::ChannelId,
        player::{AudioSession, AudioSink, PlaybackStatus, TrackSink},
        server::voice::VoiceRequest,
        testing::{FakeResolver, store_with},
    };

    fn store() -> (Arc<SessionStore>, flume::Receiver<VoiceRequest>) {
        store_with(Arc::new(FakeResolver::default()))
    }

    #[test]
    fn test_request_tickets() {
        let (store, _rx) = store();
        let guild = GuildId::from("1");

        let first = store.begin_request(&guild);
        assert!(store.is_current(&guild, first));
        let second = store.begin_request(&guild);
        assert!(!store.is_current(&guild, first));

        // A stale finish must not clear the newer ticket.
        store.finish_request(&guild, first);
        assert!(store.is_current(&guild, second));
        store.finish_request(&guild, second);
        assert_eq!(store.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_teardown_clears_playback_footprint() {
        let (store, rx) = store();
        let guild = GuildId::from("1");
        let sink = TrackSink::new(true);
        sink.start();
        store
            .sessions
            .set(guild.clone(), AudioSession::new(Arc::new(sink.clone())));
        store.voice_channels.set(guild.clone(), ChannelId(9));
        store.timeouts.arm(
            &guild,
            Duration::from_secs(60),
            TimeoutReason::Idle,
            |_, _| async {},
        );
        let ticket = store.begin_request(&guild);
        let _guard = store.queries.acquire(&guild, "q").unwrap();
        store.ui.apply(&guild, UiEvent::PlayRequested).unwrap();

        assert!(store.teardown(&guild, TeardownReason::Stop));

        assert!(!store.sessions.contains(&guild));
        assert_eq!(sink.status(), PlaybackStatus::Stopped);
        assert!(!store.timeouts.is_armed(&guild));
        assert!(!store.queries.is_active(&guild));
        assert!(!store.is_current(&guild, ticket));
        assert_eq!(store.ui.state(&guild), UiState::Idle);
        assert_eq!(rx.try_recv().unwrap(), VoiceRequest::Leave { guild_id: guild.clone() });
        // The configured channel is sticky.
        assert_eq!(store.voice_channels.get(&guild), Some(ChannelId(9)));

        assert!(!store.teardown(&guild, TeardownReason::Stop));
    }

    #[test]
    fn test_teardown_of_unknown_guild_leaves_no_trace() {
        let (store, rx) = store();
        assert!(!store.teardown(&GuildId::from("ghost"), TeardownReason::Leave));
        assert!(store.ui.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_empties_everything() {
        let (store, _rx) = store();
        for g in ["1", "2"] {
            let guild = GuildId::from(g);
            store
                .sessions
                .set(guild.clone(), AudioSession::new(Arc::new(TrackSink::new(true))));
            store.voice_channels.set(guild.clone(), ChannelId(1));
            store.timeouts.arm(
                &guild,
                Duration::from_secs(60),
                TimeoutReason::Idle,
                |_, _| async {},
            );
        }
        store.processes.track(&GuildId::from("1"), 4242);

        store.shutdown().await;

        assert!(store.sessions.is_empty());
        assert!(store.timeouts.is_empty());
        assert!(store.voice_channels.is_empty());
        assert!(store.queries.is_empty());
        assert_eq!(store.processes.total_processes(), 0);
    }
}
