use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    commands::types::{Command, CommandResponse},
    common::{
        errors::CoreError,
        types::{ChannelId, GuildId, now_ms},
    },
    configs::TimeoutsConfig,
    lifecycle::{CleanupCoordinator, TimeoutReason},
    player::{
        Advance, AudioSession, MAX_VOLUME, PlaybackStatus, SinkFactory, TrackDescriptor,
        VolumeOutcome,
    },
    resolver::{FetchOutcome, ThumbnailValidator},
    server::{
        error_records::ReplyTarget,
        store::{SessionStore, TeardownReason},
    },
    ui::{self, RenderPayload, UiEvent, UiState, format_timestamp},
};

const QUEUE_PREVIEW: usize = 10;

/// Entry point of the command layer: one method per command, each returning what to
/// show in reply.
pub struct PlayerService {
    store: Arc<SessionStore>,
    cleanup: Arc<CleanupCoordinator>,
    sinks: Arc<dyn SinkFactory>,
    thumbnails: ThumbnailValidator,
    timeouts: TimeoutsConfig,
}

impl PlayerService {
    pub fn new(
        store: Arc<SessionStore>,
        cleanup: Arc<CleanupCoordinator>,
        sinks: Arc<dyn SinkFactory>,
        thumbnails: ThumbnailValidator,
        timeouts: TimeoutsConfig,
    ) -> Self {
        Self {
            store,
            cleanup,
            sinks,
            thumbnails,
            timeouts,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn handle(
        &self,
        guild_id: &GuildId,
        command: Command,
        reply: ReplyTarget,
    ) -> CommandResponse {
        let request_id = Uuid::new_v4();
        let span = info_span!("command", request = %request_id, kind = command.name());

        async move {
            debug!("[{}] {:?}", guild_id, command);
            match command {
                Command::Play {
                    query,
                    title,
                    image_url,
                } => self.play(guild_id, &query, title, image_url, reply).await,
                Command::Skip => self.skip(guild_id),
                Command::Stop => self.stop(guild_id),
                Command::Pause => self.pause(guild_id),
                Command::Resume => self.resume(guild_id),
                Command::Volume { level } => self.volume(guild_id, level),
                Command::Mute => self.mute(guild_id),
                Command::Queue => self.queue(guild_id),
                Command::NowPlaying => CommandResponse::Render(self.render(guild_id)),
                Command::Remove { index } => self.remove(guild_id, index),
                Command::SetChannel { channel_id } => self.set_channel(guild_id, channel_id),
                Command::Leave => self.leave(guild_id),
                Command::TrackFinished => self.track_finished(guild_id),
            }
        }
        .instrument(span)
        .await
    }

    pub fn render(&self, guild_id: &GuildId) -> RenderPayload {
        let tracked = self.store.ui.tracked(guild_id);
        let session = self.store.sessions.get(guild_id);
        ui::render(guild_id, session.as_ref(), &tracked)
    }

    async fn play(
        &self,
        guild_id: &GuildId,
        query: &str,
        title: Option<String>,
        image_url: Option<String>,
        reply: ReplyTarget,
    ) -> CommandResponse {
        let query = query.trim();
        if query.is_empty() {
            return CommandResponse::ephemeral("Tell me what to play.");
        }
        if self.store.queries.is_active(guild_id) {
            return duplicate(guild_id);
        }

        self.store.timeouts.cancel(guild_id);
        let label = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| query.to_string());
        if let Err(e) =
            self.store
                .ui
                .apply_with_detail(guild_id, UiEvent::PlayRequested, Some(label.clone()))
        {
            debug!("[{}] UI unchanged for play: {}", guild_id, e);
        }
        let ticket = self.store.begin_request(guild_id);

        let outcome = self
            .store
            .queries
            .fetch_stream_details(query, &label, guild_id)
            .await;
        if !self.store.is_current(guild_id, ticket) {
            return superseded(guild_id, query);
        }

        let details = match outcome {
            FetchOutcome::Resolved(details) => details,
            FetchOutcome::InProgress => {
                self.store.finish_request(guild_id, ticket);
                self.rearm_if_inactive(guild_id);
                return duplicate(guild_id);
            }
            FetchOutcome::Failed { error } => {
                self.store.finish_request(guild_id, ticket);
                return self.fail(guild_id, error, reply);
            }
        };

        let thumbnail_url = self.thumbnails.validate(details.thumbnail_url.clone()).await;
        let image_url = if details.is_spotify {
            self.thumbnails.validate(image_url).await
        } else {
            None
        };
        if !self.store.is_current(guild_id, ticket) {
            return superseded(guild_id, query);
        }
        self.store.finish_request(guild_id, ticket);

        self.commit_track(
            guild_id,
            TrackDescriptor {
                title: details.title,
                duration_ms: details.duration_ms,
                thumbnail_url,
                source: details.url,
                is_spotify: details.is_spotify,
                image_url,
            },
        )
    }

    /// Adds a resolved track, creating the session on the guild's first play.
    fn commit_track(&self, guild_id: &GuildId, track: TrackDescriptor) -> CommandResponse {
        if !self.store.sessions.contains(guild_id) {
            let session = AudioSession::new(self.sinks.create(guild_id));
            self.store.sessions.set(guild_id.clone(), session);
            if let Some(channel_id) = self.store.voice_channels.get(guild_id) {
                self.store.voice.join(guild_id, channel_id);
            }
            info!("[{}] Session created", guild_id);
        }

        let title = track.title.clone();
        let position = self.store.sessions.enqueue(guild_id, track).unwrap_or(0);
        let idle = self
            .store
            .sessions
            .with(guild_id, |s| s.current.is_none())
            .unwrap_or(false);
        if idle {
            return self.start_next(guild_id);
        }

        self.sync_ui_with_sink(guild_id);
        self.rearm_if_inactive(guild_id);
        CommandResponse::public(format!("Queued {} (position {}).", title, position))
    }

    /// Starts the next queued track, or goes idle when there is none.
    fn start_next(&self, guild_id: &GuildId) -> CommandResponse {
        let Some(sink) = self.store.sessions.with(guild_id, |s| s.sink.clone()) else {
            return nothing_playing();
        };
        match self.store.sessions.advance(guild_id) {
            Some(Advance::Started(track)) => {
                self.store.timeouts.cancel(guild_id);
                sink.start();
                info!("[{}] Now playing {:?}", guild_id, track.title);

                if self.store.ui.state(guild_id) == UiState::Loading {
                    let event = UiEvent::Resolved {
                        sink_ready: sink.is_ready(),
                    };
                    if let Err(e) = self.store.ui.apply(guild_id, event) {
                        debug!("[{}] {}", guild_id, e);
                    }
                } else {
                    self.drive_ui(guild_id, UiState::Playing);
                }
                CommandResponse::Render(self.render(guild_id))
            }
            Some(Advance::Exhausted) => {
                sink.stop();
                let _ = self.store.ui.apply(guild_id, UiEvent::QueueExhausted);
                self.arm_timeout(guild_id, TimeoutReason::Idle);
                info!("[{}] Queue exhausted", guild_id);
                CommandResponse::public("The queue is empty.")
            }
            None => nothing_playing(),
        }
    }

    fn fail(&self, guild_id: &GuildId, error: String, reply: ReplyTarget) -> CommandResponse {
        let err = CoreError::Resolution(error);
        warn!("[{}] {}", guild_id, err);
        let message = err.user_message();

        let _ = self
            .store
            .ui
            .apply(guild_id, UiEvent::ResolveFailed(message.clone()));
        let now = now_ms();
        self.store.errors.record(guild_id, reply, now);
        let notify = self.store.errors.should_notify(guild_id, now);
        self.rearm_if_inactive(guild_id);

        // A track is still playing: keep the player view and report in the reply only.
        let playing = self
            .store
            .sessions
            .with(guild_id, |s| s.current.is_some())
            .unwrap_or(false);
        if playing {
            self.sync_ui_with_sink(guild_id);
            return CommandResponse::ephemeral(message);
        }

        if notify {
            CommandResponse::Render(self.render(guild_id))
        } else {
            CommandResponse::ephemeral(message)
        }
    }

    fn skip(&self, guild_id: &GuildId) -> CommandResponse {
        if !self.store.sessions.contains(guild_id) {
            return nothing_playing();
        }
        self.start_next(guild_id)
    }

    fn track_finished(&self, guild_id: &GuildId) -> CommandResponse {
        if !self.store.sessions.contains(guild_id) {
            debug!("[{}] Track end for a guild without session", guild_id);
            return nothing_playing();
        }
        self.start_next(guild_id)
    }

    fn stop(&self, guild_id: &GuildId) -> CommandResponse {
        if self.store.teardown(guild_id, TeardownReason::Stop) {
            CommandResponse::public("Stopped playback.")
        } else {
            nothing_playing()
        }
    }

    fn leave(&self, guild_id: &GuildId) -> CommandResponse {
        self.store.teardown(guild_id, TeardownReason::Leave);
        self.cleanup.purge_guild(guild_id);
        self.store.ui.remove(guild_id);
        CommandResponse::public("Left the voice channel.")
    }

    fn pause(&self, guild_id: &GuildId) -> CommandResponse {
        let Some(sink) = self.store.sessions.with(guild_id, |s| s.sink.clone()) else {
            return nothing_playing();
        };
        match sink.status() {
            PlaybackStatus::Playing | PlaybackStatus::Buffering => {}
            PlaybackStatus::Paused => return CommandResponse::ephemeral("Already paused."),
            PlaybackStatus::Stopped => return nothing_playing(),
        }

        sink.pause();
        self.drive_ui(guild_id, UiState::Paused);
        self.arm_timeout(guild_id, TimeoutReason::Paused);
        CommandResponse::Render(self.render(guild_id))
    }

    fn resume(&self, guild_id: &GuildId) -> CommandResponse {
        let Some(sink) = self.store.sessions.with(guild_id, |s| s.sink.clone()) else {
            return nothing_playing();
        };
        if sink.status() != PlaybackStatus::Paused {
            return CommandResponse::ephemeral("Playback is not paused.");
        }

        self.store.timeouts.cancel(guild_id);
        sink.resume();
        self.drive_ui(guild_id, UiState::Playing);
        CommandResponse::Render(self.render(guild_id))
    }

    fn volume(&self, guild_id: &GuildId, level: i64) -> CommandResponse {
        let level = level.clamp(0, MAX_VOLUME as i64) as u8;
        match self.store.sessions.set_volume(guild_id, level) {
            VolumeOutcome::NoSession => nothing_playing(),
            VolumeOutcome::Applied(_) => CommandResponse::Render(self.render(guild_id)),
            VolumeOutcome::Unsupported(volume) => CommandResponse::Render(
                self.render(guild_id).with_note(format!(
                    "Volume set to {}%, but this player cannot change volume.",
                    volume
                )),
            ),
        }
    }

    fn mute(&self, guild_id: &GuildId) -> CommandResponse {
        match self.store.sessions.toggle_mute(guild_id) {
            Some(_) => CommandResponse::Render(self.render(guild_id)),
            None => nothing_playing(),
        }
    }

    fn queue(&self, guild_id: &GuildId) -> CommandResponse {
        let Some((current, upcoming)) = self.store.sessions.with(guild_id, |s| {
            let upcoming: Vec<(String, u64)> = s
                .queue()
                .iter()
                .map(|t| (t.title.clone(), t.duration_ms))
                .collect();
            (s.current.clone(), upcoming)
        }) else {
            return nothing_playing();
        };

        let mut lines = Vec::with_capacity(upcoming.len().min(QUEUE_PREVIEW) + 3);
        match current {
            Some(track) => lines.push(format!("Now playing: {}", track.title)),
            None => lines.push("Nothing is playing.".to_string()),
        }
        if upcoming.is_empty() {
            lines.push("The queue is empty.".to_string());
        } else {
            lines.push("Up next:".to_string());
            for (i, (title, duration_ms)) in upcoming.iter().take(QUEUE_PREVIEW).enumerate() {
                lines.push(format!(
                    "{}. {} ({})",
                    i + 1,
                    title,
                    format_timestamp(*duration_ms, *duration_ms)
                ));
            }
            if upcoming.len() > QUEUE_PREVIEW {
                lines.push(format!("...and {} more", upcoming.len() - QUEUE_PREVIEW));
            }
        }
        CommandResponse::public(lines.join("\n"))
    }

    fn remove(&self, guild_id: &GuildId, index: usize) -> CommandResponse {
        if !self.store.sessions.contains(guild_id) {
            return nothing_playing();
        }
        let removed = index
            .checked_sub(1)
            .and_then(|i| self.store.sessions.remove_track(guild_id, i));
        match removed {
            Some(track) => CommandResponse::public(format!("Removed {}.", track.title)),
            None => CommandResponse::ephemeral(format!("No track at position {}.", index)),
        }
    }

    fn set_channel(&self, guild_id: &GuildId, channel_id: ChannelId) -> CommandResponse {
        self.store.voice_channels.set(guild_id.clone(), channel_id);
        if self.store.sessions.contains(guild_id) {
            self.store.voice.join(guild_id, channel_id);
        }
        CommandResponse::public(format!("Voice channel set to <#{}>.", channel_id))
    }

    fn arm_timeout(&self, guild_id: &GuildId, reason: TimeoutReason) {
        let after = match reason {
            TimeoutReason::Idle => self.timeouts.idle_timeout(),
            TimeoutReason::Paused => self.timeouts.pause_timeout(),
        };
        let store = Arc::downgrade(&self.store);
        self.store
            .timeouts
            .arm(guild_id, after, reason, move |guild_id, reason| async move {
                if let Some(store) = store.upgrade() {
                    store.teardown(&guild_id, TeardownReason::Timeout(reason));
                }
            });
    }

    /// Re-arms the timer `play` cancelled when the guild is still idle or paused.
    fn rearm_if_inactive(&self, guild_id: &GuildId) {
        let state = self
            .store
            .sessions
            .with(guild_id, |s| (s.current.is_none(), s.sink.status()));
        match state {
            Some((true, _)) => self.arm_timeout(guild_id, TimeoutReason::Idle),
            Some((false, PlaybackStatus::Paused)) => {
                self.arm_timeout(guild_id, TimeoutReason::Paused)
            }
            _ => {}
        }
    }

    /// Moves the UI to what the sink is doing, when a track is loaded.
    fn sync_ui_with_sink(&self, guild_id: &GuildId) {
        match self.store.sessions.with(guild_id, |s| s.sink.status()) {
            Some(PlaybackStatus::Playing | PlaybackStatus::Buffering) => {
                self.drive_ui(guild_id, UiState::Playing)
            }
            Some(PlaybackStatus::Paused) => self.drive_ui(guild_id, UiState::Paused),
            _ => {}
        }
    }

    /// Reaches `target` through legal transitions only.
    fn drive_ui(&self, guild_id: &GuildId, target: UiState) {
        use UiEvent as E;
        use UiState as S;

        let resolved = E::Resolved { sink_ready: true };
        let steps = match (self.store.ui.state(guild_id), target) {
            (from, to) if from == to => vec![],
            (S::Paused, S::Playing) => vec![E::Resume],
            (S::Playing, S::Paused) => vec![E::Pause],
            (S::Loading, S::Playing) => vec![resolved],
            (S::Loading, S::Paused) => vec![resolved, E::Pause],
            (S::Idle | S::Error, S::Playing) => vec![E::PlayRequested, resolved],
            (S::Idle | S::Error, S::Paused) => vec![E::PlayRequested, resolved, E::Pause],
            (_, S::Idle) => vec![E::Stopped],
            _ => vec![],
        };
        for event in steps {
            if let Err(e) = self.store.ui.apply(guild_id, event) {
                debug!("[{}] {}", guild_id, e);
                break;
            }
        }
    }
}

fn nothing_playing() -> CommandResponse {
    CommandResponse::ephemeral("Nothing is playing.")
}

fn duplicate(guild_id: &GuildId) -> CommandResponse {
    CommandResponse::ephemeral(CoreError::DuplicateRequest(guild_id.clone()).user_message())
}

fn superseded(guild_id: &GuildId, query: &str) -> CommandResponse {
    info!("[{}] Request for {:?} was superseded, result discarded", guild_id, query);
    CommandResponse::ephemeral("That request was cancelled.")
}
