//! In-crate fakes for the external collaborators.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    common::types::GuildId,
    configs::CleanupConfig,
    player::TrackDescriptor,
    process::{LivenessProbe, ProcessRegistry},
    resolver::{MetadataResolver, QueryDeduplicator, ResolveError, ResolvedMetadata},
    server::{
        store::SessionStore,
        voice::{VoiceLink, VoiceRequest},
    },
};

/// A store wired to `resolver` and a probe that sees no live processes.
pub fn store_with(
    resolver: Arc<FakeResolver>,
) -> (Arc<SessionStore>, flume::Receiver<VoiceRequest>) {
    let processes = Arc::new(ProcessRegistry::new(Arc::new(FakeProbe::with_alive(&[]))));
    let queries = Arc::new(QueryDeduplicator::new(resolver));
    let (voice, rx) = VoiceLink::new();
    let store = SessionStore::new(queries, processes, voice, &CleanupConfig::default());
    (Arc::new(store), rx)
}

pub fn track(title: &str) -> TrackDescriptor {
    TrackDescriptor {
        title: title.to_string(),
        duration_ms: 180_000,
        thumbnail_url: None,
        source: format!("https://example.com/{}", title),
        is_spotify: false,
        image_url: None,
    }
}

pub fn meta(title: &str, duration: Option<f64>, url: Option<&str>) -> ResolvedMetadata {
    ResolvedMetadata {
        title: Some(title.to_string()),
        duration_seconds: duration,
        thumbnail_url: None,
        canonical_url: url.map(String::from),
    }
}

/// Holds a resolver call open until the test lets it go.
#[derive(Default)]
pub struct Gate {
    started: Notify,
    release: Notify,
}

impl Gate {
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn open(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
pub struct FakeResolver {
    responses: Mutex<HashMap<String, Result<ResolvedMetadata, String>>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn respond(&self, query: &str, result: Result<ResolvedMetadata, ResolveError>) {
        self.responses
            .lock()
            .insert(query.to_string(), result.map_err(|e| e.to_string()));
    }

    pub fn gate(&self, query: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().insert(query.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataResolver for FakeResolver {
    async fn resolve(
        &self,
        _guild_id: &GuildId,
        query: &str,
    ) -> Result<ResolvedMetadata, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().get(query).cloned();
        if let Some(gate) = gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }

        let response = self.responses.lock().get(query).cloned();
        match response {
            Some(Ok(meta)) => Ok(meta),
            Some(Err(message)) => Err(ResolveError::Failed { message }),
            None => Ok(meta(query, Some(180.0), None)),
        }
    }
}

pub struct FakeProbe {
    alive: Mutex<HashSet<u32>>,
    terminated: Mutex<Vec<u32>>,
}

impl FakeProbe {
    pub fn with_alive(pids: &[u32]) -> Self {
        Self {
            alive: Mutex::new(pids.iter().copied().collect()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().clone()
    }
}

#[async_trait]
impl LivenessProbe for FakeProbe {
    async fn alive(&self, pids: &[u32]) -> HashSet<u32> {
        let alive = self.alive.lock();
        pids.iter().copied().filter(|p| alive.contains(p)).collect()
    }

    async fn terminate(&self, pid: u32) -> bool {
        if self.alive.lock().remove(&pid) {
            self.terminated.lock().push(pid);
            true
        } else {
            false
        }
    }
}
