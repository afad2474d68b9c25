pub mod app_state;
pub mod error_records;
pub mod store;
pub mod voice;

pub use app_state::AppState;
pub use error_records::{ErrorRecord, ErrorRecords, ReplyTarget};
pub use store::{SessionStore, TeardownReason};
pub use voice::{VoiceChannels, VoiceLink, VoiceRequest};
