pub mod cleanup;
pub mod timeout;

pub use cleanup::{CleanupCoordinator, ERROR_RETENTION};
pub use timeout::{TimeoutInfo, TimeoutReason, TimeoutSupervisor};
