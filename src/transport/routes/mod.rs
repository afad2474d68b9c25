pub mod guilds;
pub mod stats;
