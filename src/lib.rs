pub mod commands;
pub mod common;
pub mod configs;
pub mod lifecycle;
pub mod monitoring;
pub mod player;
pub mod process;
pub mod resolver;
pub mod server;
pub mod transport;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;
