use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

use crate::common::{
    errors::CoreError,
    types::{GuildId, now_ms},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UiState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

impl UiState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    /// Applies `event`, or rejects it when the current state does not accept it.
    ///
    /// An `error` guild accepts a new play request the same way `idle` does.
    pub fn transition(self, event: &UiEvent) -> Result<UiState, CoreError> {
        use UiEvent as E;
        use UiState as S;

        let next = match (self, event) {
            (S::Idle | S::Playing | S::Error, E::PlayRequested) => S::Loading,
            (S::Loading, E::Resolved { sink_ready: true }) => S::Playing,
            (S::Loading, E::Resolved { sink_ready: false }) => S::Loading,
            (S::Loading, E::ResolveFailed(_)) => S::Error,
            (S::Playing, E::Pause) => S::Paused,
            (S::Paused, E::Resume) => S::Playing,
            (_, E::QueueExhausted | E::Stopped) => S::Idle,
            _ => {
                return Err(CoreError::InvalidTransition {
                    from: self.name(),
                    event: event.name(),
                });
            }
        };
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    PlayRequested,
    Resolved { sink_ready: bool },
    Pause,
    Resume,
    /// Carries the short user-facing message.
    ResolveFailed(String),
    QueueExhausted,
    Stopped,
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayRequested => "playRequested",
            Self::Resolved { .. } => "resolved",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::ResolveFailed(_) => "resolveFailed",
            Self::QueueExhausted => "queueExhausted",
            Self::Stopped => "stopped",
        }
    }
}

/// UI state of one guild plus the text the current state needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedState {
    pub state: UiState,
    /// The pending query while loading, the user-facing message in `error`.
    pub detail: Option<String>,
    pub updated_at: u64,
}

/// Per-guild UI state machine.
#[derive(Default)]
pub struct StateCoordinator {
    states: DashMap<GuildId, TrackedState>,
}

impl StateCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Guilds never seen are `idle`.
    pub fn state(&self, guild_id: &GuildId) -> UiState {
        self.states
            .get(guild_id)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    pub fn tracked(&self, guild_id: &GuildId) -> TrackedState {
        self.states
            .get(guild_id)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    pub fn apply(&self, guild_id: &GuildId, event: UiEvent) -> Result<UiState, CoreError> {
        self.apply_with_detail(guild_id, event, None)
    }

    /// Like [`apply`](Self::apply), recording `detail` for the new state.
    pub fn apply_with_detail(
        &self,
        guild_id: &GuildId,
        event: UiEvent,
        detail: Option<String>,
    ) -> Result<UiState, CoreError> {
        let from = self.state(guild_id);
        let next = from.transition(&event)?;

        let mut entry = self.states.entry(guild_id.clone()).or_default();
        let previous = entry.detail.take();
        entry.detail = match event {
            UiEvent::ResolveFailed(message) => Some(message),
            _ if next == UiState::Loading => detail.or(previous),
            _ => None,
        };
        entry.state = next;
        entry.updated_at = now_ms();

        if from != next {
            debug!("[{}] UI {} -> {}", guild_id, from.name(), next.name());
        }
        Ok(next)
    }

    pub fn remove(&self, guild_id: &GuildId) -> bool {
        self.states.remove(guild_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn snapshot(&self) -> Vec<(GuildId, TrackedState)> {
        self.states
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let ui = StateCoordinator::new();
        let guild = GuildId::from("1");

        assert_eq!(ui.state(&guild), UiState::Idle);
        assert_eq!(ui.apply(&guild, UiEvent::PlayRequested).unwrap(), UiState::Loading);
        assert_eq!(
            ui.apply(&guild, UiEvent::Resolved { sink_ready: true }).unwrap(),
            UiState::Playing
        );
        assert_eq!(ui.apply(&guild, UiEvent::Pause).unwrap(), UiState::Paused);
        assert_eq!(ui.apply(&guild, UiEvent::Resume).unwrap(), UiState::Playing);
        assert_eq!(ui.apply(&guild, UiEvent::QueueExhausted).unwrap(), UiState::Idle);
    }

    #[test]
    fn test_sink_not_ready_stays_loading() {
        let state = UiState::Loading
            .transition(&UiEvent::Resolved { sink_ready: false })
            .unwrap();
        assert_eq!(state, UiState::Loading);
    }

    #[test]
    fn test_failure_records_message() {
        let ui = StateCoordinator::new();
        let guild = GuildId::from("1");
        ui.apply_with_detail(&guild, UiEvent::PlayRequested, Some("lofi".into()))
            .unwrap();
        assert_eq!(ui.tracked(&guild).detail.as_deref(), Some("lofi"));

        ui.apply(&guild, UiEvent::ResolveFailed("Could not load that track.".into()))
            .unwrap();
        let tracked = ui.tracked(&guild);
        assert_eq!(tracked.state, UiState::Error);
        assert_eq!(tracked.detail.as_deref(), Some("Could not load that track."));

        // A retry from the error state is accepted.
        assert_eq!(ui.apply(&guild, UiEvent::PlayRequested).unwrap(), UiState::Loading);
    }

    #[test]
    fn test_stop_from_any_state() {
        for from in [
            UiState::Idle,
            UiState::Loading,
            UiState::Playing,
            UiState::Paused,
            UiState::Error,
        ] {
            assert_eq!(from.transition(&UiEvent::Stopped).unwrap(), UiState::Idle);
        }
    }

    #[test]
    fn test_rejected_transitions_leave_state() {
        let ui = StateCoordinator::new();
        let guild = GuildId::from("1");

        let err = ui.apply(&guild, UiEvent::Pause).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: "idle",
                event: "pause"
            }
        ));
        assert!(ui.apply(&guild, UiEvent::Resolved { sink_ready: true }).is_err());
        assert!(UiState::Paused.transition(&UiEvent::PlayRequested).is_err());
        assert_eq!(ui.state(&guild), UiState::Idle);
    }

    #[test]
    fn test_guilds_are_independent() {
        let ui = StateCoordinator::new();
        let a = GuildId::from("a");
        let b = GuildId::from("b");
        ui.apply(&a, UiEvent::PlayRequested).unwrap();
        assert_eq!(ui.state(&b), UiState::Idle);
        assert!(ui.remove(&a));
        assert!(!ui.remove(&a));
        assert_eq!(ui.state(&a), UiState::Idle);
    }
}
