pub mod registry;
pub mod session;
pub mod sink;

pub use registry::{Advance, GuildSessionRegistry, VolumeOutcome};
pub use session::{AudioSession, DEFAULT_VOLUME, LazyLoadInfo, MAX_VOLUME, TrackDescriptor};
pub use sink::{AudioSink, PlaybackStatus, SinkFactory, TrackSink, TrackSinkFactory, VolumeControl};
