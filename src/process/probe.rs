use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};
use tracing::warn;

/// OS-level view of process liveness.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Returns the subset of `pids` that are still running.
    async fn alive(&self, pids: &[u32]) -> HashSet<u32>;

    /// Sends a kill signal. Returns `false` if the process was already gone.
    async fn terminate(&self, pid: u32) -> bool;
}

/// [`LivenessProbe`] backed by `sysinfo`. Refreshes only the pids it is asked about.
#[derive(Clone, Default)]
pub struct SysinfoProbe {
    system: Arc<Mutex<System>>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    fn refresh(system: &mut System, pids: &[u32]) {
        let wanted: Vec<Pid> = pids.iter().map(|p| Pid::from_u32(*p)).collect();
        system.refresh_processes(ProcessesToUpdate::Some(&wanted), true);
    }
}

#[async_trait]
impl LivenessProbe for SysinfoProbe {
    async fn alive(&self, pids: &[u32]) -> HashSet<u32> {
        if pids.is_empty() {
            return HashSet::new();
        }
        let system = self.system.clone();
        let pids = pids.to_vec();

        let probed = tokio::task::spawn_blocking(move || {
            let mut system = system.lock();
            Self::refresh(&mut system, &pids);
            pids.into_iter()
                .filter(|pid| {
                    // Exited children linger as zombies until reaped; they count as dead.
                    system.process(Pid::from_u32(*pid)).is_some_and(|p| {
                        !matches!(p.status(), ProcessStatus::Zombie | ProcessStatus::Dead)
                    })
                })
                .collect::<HashSet<u32>>()
        })
        .await;

        probed.unwrap_or_else(|e| {
            warn!("Liveness probe task failed: {}", e);
            HashSet::new()
        })
    }

    async fn terminate(&self, pid: u32) -> bool {
        let system = self.system.clone();
        tokio::task::spawn_blocking(move || {
            let mut system = system.lock();
            Self::refresh(&mut system, &[pid]);
            system
                .process(Pid::from_u32(pid))
                .is_some_and(|process| process.kill())
        })
        .await
        .unwrap_or(false)
    }
}
