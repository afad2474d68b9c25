pub mod render;
pub mod state;

pub use render::{RenderPayload, format_timestamp, render, volume_bar};
pub use state::{StateCoordinator, TrackedState, UiEvent, UiState};
