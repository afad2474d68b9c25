use std::{sync::Arc, time::Instant};

use crate::{
    commands::PlayerService, common::banner::BuildInfo, configs::Config,
    server::store::SessionStore,
};

/// Top-level application state shared with the HTTP handlers.
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub service: Arc<PlayerService>,
    pub config: Config,
    pub build: BuildInfo,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<PlayerService>, config: Config) -> Self {
        Self {
            store: service.store().clone(),
            service,
            config,
            build: BuildInfo::default(),
            start_time: Instant::now(),
        }
    }
}
