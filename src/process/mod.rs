pub mod probe;
pub mod registry;

pub use probe::{LivenessProbe, SysinfoProbe};
pub use registry::{
    GuildProcessStatus, ProcessHandle, ProcessRecord, ProcessRegistry, ProcessStatusReport,
    ReapReport,
};
