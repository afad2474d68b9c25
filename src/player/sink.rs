use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PlaybackStatus {
    Playing = 0,
    Paused = 1,
    Stopped = 2,
    Buffering = 3,
}

impl PlaybackStatus {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Playing,
            1 => Self::Paused,
            3 => Self::Buffering,
            _ => Self::Stopped,
        }
    }
}

/// Optional capability of a sink: adjusting output gain.
pub trait VolumeControl: Send + Sync {
    /// `volume` is a linear gain where 1.0 is unity.
    fn set_volume(&self, volume: f32);
    fn volume(&self) -> f32;
}

/// Playback endpoint bound to one guild session.
///
/// The actual decoder/streamer lives outside the core; it drives the sink's position and
/// status, and the core only issues controls and reads status back.
pub trait AudioSink: Send + Sync {
    fn status(&self) -> PlaybackStatus;

    /// Position of the current track in milliseconds.
    fn position_ms(&self) -> u64;

    /// Returns the volume handle when the sink supports it.
    fn volume_control(&self) -> Option<&dyn VolumeControl>;

    fn start(&self);
    fn pause(&self);
    fn resume(&self);
    fn stop(&self);

    fn is_ready(&self) -> bool {
        matches!(
            self.status(),
            PlaybackStatus::Playing | PlaybackStatus::Buffering
        )
    }
}

/// Creates the sink a new guild session is bound to.
pub trait SinkFactory: Send + Sync {
    fn create(&self, guild_id: &crate::common::types::GuildId) -> Arc<dyn AudioSink>;
}

/// Lock-free sink handle shared between the core and the streaming collaborator.
#[derive(Clone)]
pub struct TrackSink {
    state: Arc<AtomicU8>,
    volume: Arc<AtomicU32>,   // f32 bits
    position: Arc<AtomicU64>, // position in samples
    volume_capable: bool,
}

impl TrackSink {
    pub const SAMPLE_RATE: u64 = 48_000;

    pub fn new(volume_capable: bool) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PlaybackStatus::Stopped as u8)),
            volume: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            position: Arc::new(AtomicU64::new(0)),
            volume_capable,
        }
    }

    /// Called by the streamer as samples are written out.
    pub fn advance_samples(&self, samples: u64) {
        self.position.fetch_add(samples, Ordering::AcqRel);
    }

    pub fn set_position_ms(&self, position_ms: u64) {
        let samples = (position_ms * Self::SAMPLE_RATE) / 1000;
        self.position.store(samples, Ordering::Release);
    }

    fn set_state(&self, status: PlaybackStatus) {
        self.state.store(status as u8, Ordering::Release);
    }
}

impl VolumeControl for TrackSink {
    fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Release);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }
}

impl AudioSink for TrackSink {
    fn status(&self) -> PlaybackStatus {
        PlaybackStatus::from_u8(self.state.load(Ordering::Acquire))
    }

    fn position_ms(&self) -> u64 {
        let samples = self.position.load(Ordering::Acquire);
        (samples * 1000) / Self::SAMPLE_RATE
    }

    fn volume_control(&self) -> Option<&dyn VolumeControl> {
        if self.volume_capable {
            Some(self)
        } else {
            None
        }
    }

    fn start(&self) {
        self.position.store(0, Ordering::Release);
        self.set_state(PlaybackStatus::Playing);
    }

    fn pause(&self) {
        if self.status() != PlaybackStatus::Stopped {
            self.set_state(PlaybackStatus::Paused);
        }
    }

    fn resume(&self) {
        if self.status() == PlaybackStatus::Paused {
            self.set_state(PlaybackStatus::Playing);
        }
    }

    fn stop(&self) {
        self.set_state(PlaybackStatus::Stopped);
    }
}

/// Hands out a fresh [`TrackSink`] per guild.
pub struct TrackSinkFactory {
    pub volume_capable: bool,
}

impl SinkFactory for TrackSinkFactory {
    fn create(&self, _guild_id: &crate::common::types::GuildId) -> Arc<dyn AudioSink> {
        Arc::new(TrackSink::new(self.volume_capable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_sink_lifecycle() {
        let sink = TrackSink::new(true);
        assert_eq!(sink.status(), PlaybackStatus::Stopped);
        assert!(!sink.is_ready());

        sink.start();
        assert!(sink.is_ready());
        sink.pause();
        assert_eq!(sink.status(), PlaybackStatus::Paused);
        sink.resume();
        assert_eq!(sink.status(), PlaybackStatus::Playing);
        sink.stop();
        sink.resume();
        assert_eq!(sink.status(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_position_in_ms() {
        let sink = TrackSink::new(false);
        sink.start();
        sink.advance_samples(96_000);
        assert_eq!(sink.position_ms(), 2_000);
        sink.set_position_ms(125_000);
        assert_eq!(sink.position_ms(), 125_000);
    }

    #[test]
    fn test_volume_capability_is_probed() {
        let capable = TrackSink::new(true);
        let control = capable.volume_control().expect("capable sink exposes volume");
        control.set_volume(0.45);
        assert!((control.volume() - 0.45).abs() < f32::EPSILON);

        let fixed = TrackSink::new(false);
        assert!(fixed.volume_control().is_none());
    }
}
