pub mod service;
pub mod types;

pub use service::PlayerService;
pub use types::{Command, CommandResponse};
