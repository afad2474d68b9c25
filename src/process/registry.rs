use std::{
    collections::{BTreeMap, HashSet},
    process::{Output, Stdio},
    sync::Arc,
};

use dashmap::DashMap;
use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{
    common::{
        errors::CoreError,
        types::{GuildId, now_ms},
    },
    process::probe::LivenessProbe,
};

type RecordMap = DashMap<GuildId, Vec<ProcessRecord>>;

/// Metadata for one spawned resolver process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub pid: u32,
    pub spawned_at: u64,
    /// Result of the most recent liveness probe; `None` until probed.
    pub last_alive: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildProcessStatus {
    pub alive: usize,
    pub total: usize,
    pub pids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatusReport {
    pub total_guilds: usize,
    pub total_processes: usize,
    pub guilds: BTreeMap<GuildId, GuildProcessStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReapReport {
    /// Records whose process had already exited.
    pub dead_removed: usize,
    /// Live processes killed because they overlapped or had no owning query.
    pub orphans_terminated: usize,
}

/// Tracks resolver processes per guild.
pub struct ProcessRegistry {
    records: Arc<RecordMap>,
    probe: Arc<dyn LivenessProbe>,
}

impl ProcessRegistry {
    pub fn new(probe: Arc<dyn LivenessProbe>) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            probe,
        }
    }

    /// Launches `command` for `guild_id` and starts tracking it.
    ///
    /// Spawn failures are returned as-is; the caller decides what to tell the user and
    /// nothing is retried.
    pub fn spawn(&self, guild_id: &GuildId, mut command: Command) -> Result<ProcessHandle, CoreError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            warn!("[{}] Failed to spawn resolver process: {}", guild_id, e);
            CoreError::ProcessSpawn(e)
        })?;

        let pid = child_pid(guild_id, child.id())?;
        self.track(guild_id, pid);
        debug!("[{}] Spawned resolver process pid={}", guild_id, pid);

        Ok(ProcessHandle {
            guild_id: guild_id.clone(),
            pid,
            child: Some(child),
            records: self.records.clone(),
        })
    }

    /// Registers an externally spawned process.
    pub fn track(&self, guild_id: &GuildId, pid: u32) {
        self.records
            .entry(guild_id.clone())
            .or_default()
            .push(ProcessRecord {
                pid,
                spawned_at: now_ms(),
                last_alive: None,
            });
    }

    /// Stops tracking `pid`. Returns whether a record existed.
    pub fn untrack(&self, guild_id: &GuildId, pid: u32) -> bool {
        untrack(&self.records, guild_id, pid)
    }

    pub fn records(&self, guild_id: &GuildId) -> Vec<ProcessRecord> {
        self.records
            .get(guild_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn total_processes(&self) -> usize {
        self.records.iter().map(|e| e.value().len()).sum()
    }

    pub fn total_guilds(&self) -> usize {
        self.records.iter().filter(|e| !e.value().is_empty()).count()
    }

    /// Cheap, probe-free copy of every record; used by diagnostics.
    pub fn snapshot(&self) -> BTreeMap<GuildId, Vec<ProcessRecord>> {
        self.records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    fn pid_snapshot(&self) -> Vec<(GuildId, Vec<ProcessRecord>)> {
        self.records
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Probes every tracked pid and aggregates per-guild liveness.
    pub async fn get_status(&self) -> ProcessStatusReport {
        let probed: HashSet<u32> = self
            .pid_snapshot()
            .into_iter()
            .flat_map(|(_, records)| records.into_iter().map(|r| r.pid))
            .collect();
        let probed_list: Vec<u32> = probed.iter().copied().collect();
        let alive = self.probe.alive(&probed_list).await;

        // The map may have changed while probing. Pids spawned meanwhile were not probed
        // and are reported alive; pids untracked meanwhile are simply gone.
        let mut guilds = BTreeMap::new();
        for mut entry in self.records.iter_mut() {
            if entry.value().is_empty() {
                continue;
            }
            let mut status = GuildProcessStatus {
                alive: 0,
                total: 0,
                pids: Vec::with_capacity(entry.value().len()),
            };
            for record in entry.value_mut().iter_mut() {
                let is_alive = !probed.contains(&record.pid) || alive.contains(&record.pid);
                if probed.contains(&record.pid) {
                    record.last_alive = Some(is_alive);
                }
                status.total += 1;
                status.alive += usize::from(is_alive);
                status.pids.push(record.pid);
            }
            guilds.insert(entry.key().clone(), status);
        }

        ProcessStatusReport {
            total_guilds: guilds.len(),
            total_processes: guilds.values().map(|g| g.total).sum(),
            guilds,
        }
    }

    /// Removes dead records and kills overlapping ones.
    ///
    /// `in_flight` reports whether a guild currently owns a query. A guild with a query in
    /// flight keeps its newest live process; every other live process of that guild, and
    /// every live process of a guild with no query in flight, is an orphan.
    pub async fn reap(&self, in_flight: impl Fn(&GuildId) -> bool) -> ReapReport {
        let snapshot = self.pid_snapshot();
        let probed: Vec<u32> = snapshot
            .iter()
            .flat_map(|(_, records)| records.iter().map(|r| r.pid))
            .collect();
        if probed.is_empty() {
            return ReapReport::default();
        }
        let alive = self.probe.alive(&probed).await;

        let dead: HashSet<u32> = probed
            .iter()
            .filter(|pid| !alive.contains(pid))
            .copied()
            .collect();
        let mut orphans: HashSet<u32> = HashSet::new();
        let mut report = ReapReport::default();

        for (guild_id, records) in &snapshot {
            let mut live: Vec<&ProcessRecord> =
                records.iter().filter(|r| alive.contains(&r.pid)).collect();
            live.sort_by_key(|r| r.spawned_at);
            if in_flight(guild_id) {
                live.pop();
            }
            for record in live {
                if self.probe.terminate(record.pid).await {
                    warn!(
                        "[{}] Terminated orphaned resolver process pid={}",
                        guild_id, record.pid
                    );
                    report.orphans_terminated += 1;
                }
                orphans.insert(record.pid);
            }
        }

        // Only touch records that were probed; anything spawned meanwhile stays.
        for (guild_id, _) in &snapshot {
            if let Some(mut records) = self.records.get_mut(guild_id) {
                records.retain(|r| {
                    if dead.contains(&r.pid) {
                        report.dead_removed += 1;
                        false
                    } else {
                        !orphans.contains(&r.pid)
                    }
                });
            }
            self.records.remove_if(guild_id, |_, records| records.is_empty());
        }

        if report != ReapReport::default() {
            info!(
                "Reaped resolver processes: dead={} orphans={}",
                report.dead_removed, report.orphans_terminated
            );
        }
        report
    }

    /// Kills every tracked process and forgets all records.
    pub async fn terminate_all(&self) -> usize {
        let mut killed = 0;
        for (guild_id, records) in self.pid_snapshot() {
            for record in records {
                if self.probe.terminate(record.pid).await {
                    killed += 1;
                }
                untrack(&self.records, &guild_id, record.pid);
            }
        }
        killed
    }
}

fn untrack(records: &RecordMap, guild_id: &GuildId, pid: u32) -> bool {
    let removed = match records.get_mut(guild_id) {
        Some(mut list) => {
            let before = list.len();
            list.retain(|r| r.pid != pid);
            before != list.len()
        }
        None => false,
    };
    records.remove_if(guild_id, |_, list| list.is_empty());
    removed
}

/// `id()` is only `None` once the child has been polled to completion, so there is
/// nothing left to track or terminate.
fn child_pid(guild_id: &GuildId, pid: Option<u32>) -> Result<u32, CoreError> {
    pid.ok_or_else(|| {
        warn!("[{}] Resolver process exited before its pid was read", guild_id);
        CoreError::ProcessSpawn(std::io::Error::other("process exited before its pid was read"))
    })
}

/// A running resolver process. Its record is dropped from the registry when the handle is.
pub struct ProcessHandle {
    guild_id: GuildId,
    pid: u32,
    child: Option<Child>,
    records: Arc<RecordMap>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    /// Waits for exit and collects stdout/stderr.
    ///
    /// If this future is dropped early (e.g. by a timeout) the child is killed.
    pub async fn wait_with_output(mut self) -> std::io::Result<Output> {
        let Some(child) = self.child.take() else {
            return Err(std::io::Error::other("process output already taken"));
        };
        child.wait_with_output().await
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if untrack(&self.records, &self.guild_id, self.pid) {
            debug!("[{}] Resolver process pid={} untracked", self.guild_id, self.pid);
        }
    }
}
