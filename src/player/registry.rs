use dashmap::DashMap;
use tracing::debug;

use crate::{
    common::types::GuildId,
    player::session::{AudioSession, MAX_VOLUME, TrackDescriptor},
};

/// Result of a volume change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeOutcome {
    /// The sink accepted the new gain.
    Applied(u8),
    /// Recorded on the session for display, but the sink has no volume control.
    Unsupported(u8),
    NoSession,
}

/// Result of moving a guild's queue forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Started(TrackDescriptor),
    Exhausted,
}

/// Authoritative guild → [`AudioSession`] map.
#[derive(Default)]
pub struct GuildSessionRegistry {
    sessions: DashMap<GuildId, AudioSession>,
}

impl GuildSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the guild's session.
    pub fn get(&self, guild_id: &GuildId) -> Option<AudioSession> {
        self.sessions.get(guild_id).map(|s| s.value().clone())
    }

    /// Reads the session in place without cloning.
    pub fn with<R>(&self, guild_id: &GuildId, f: impl FnOnce(&AudioSession) -> R) -> Option<R> {
        self.sessions.get(guild_id).map(|s| f(s.value()))
    }

    /// Last writer wins; returns the session that was replaced.
    pub fn set(&self, guild_id: GuildId, session: AudioSession) -> Option<AudioSession> {
        self.sessions.insert(guild_id, session)
    }

    pub fn delete(&self, guild_id: &GuildId) -> Option<AudioSession> {
        self.sessions.remove(guild_id).map(|(_, s)| s)
    }

    pub fn contains(&self, guild_id: &GuildId) -> bool {
        self.sessions.contains_key(guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Appends to the guild's queue. Returns the new queue length.
    pub fn enqueue(&self, guild_id: &GuildId, track: TrackDescriptor) -> Option<usize> {
        let mut session = self.sessions.get_mut(guild_id)?;
        let len = session.push_track(track);
        debug!("[{}] queued track, queue length {}", guild_id, len);
        Some(len)
    }

    pub fn advance(&self, guild_id: &GuildId) -> Option<Advance> {
        let mut session = self.sessions.get_mut(guild_id)?;
        Some(match session.advance() {
            Some(track) => Advance::Started(track),
            None => Advance::Exhausted,
        })
    }

    pub fn remove_track(&self, guild_id: &GuildId, index: usize) -> Option<TrackDescriptor> {
        self.sessions.get_mut(guild_id)?.remove_at(index)
    }

    pub fn clear_queue(&self, guild_id: &GuildId) -> Option<usize> {
        self.sessions.get_mut(guild_id).map(|mut s| s.clear_queue())
    }

    /// Records the volume on the session and pushes it to the sink if it has volume control.
    pub fn set_volume(&self, guild_id: &GuildId, volume: u8) -> VolumeOutcome {
        let Some(mut session) = self.sessions.get_mut(guild_id) else {
            return VolumeOutcome::NoSession;
        };
        let volume = volume.min(MAX_VOLUME);
        session.volume = volume;

        let gain = session.effective_gain();
        match session.sink.volume_control() {
            Some(control) => {
                control.set_volume(gain);
                VolumeOutcome::Applied(volume)
            }
            None => {
                debug!("[{}] sink has no volume control, recorded {}", guild_id, volume);
                VolumeOutcome::Unsupported(volume)
            }
        }
    }

    /// Flips the muted flag. Returns the new state.
    pub fn toggle_mute(&self, guild_id: &GuildId) -> Option<bool> {
        let mut session = self.sessions.get_mut(guild_id)?;
        session.muted = !session.muted;
        let gain = session.effective_gain();
        if let Some(control) = session.sink.volume_control() {
            control.set_volume(gain);
        }
        Some(session.muted)
    }

    /// Visits every session; used by diagnostics and shutdown.
    pub fn for_each(&self, mut f: impl FnMut(&GuildId, &AudioSession)) {
        for entry in self.sessions.iter() {
            f(entry.key(), entry.value());
        }
    }

    pub fn clear(&self) -> Vec<AudioSession> {
        let ids = self.guild_ids();
        ids.iter().filter_map(|id| self.delete(id)).collect()
    }
}
