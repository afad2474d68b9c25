use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    common::{
        errors::CoreError,
        types::{GuildId, now_ms},
    },
    resolver::{
        links::is_spotify_link,
        traits::{MetadataResolver, ResolvedMetadata},
    },
};

/// The one in-flight fetch a guild may have.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveQuery {
    pub query: String,
    pub started_at: u64,
    #[serde(skip)]
    token: u64,
}

#[derive(Default)]
struct Counters {
    next_token: AtomicU64,
    releases: AtomicU64,
}

type ActiveMap = DashMap<GuildId, ActiveQuery>;

/// Normalized result of a resolver call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDetails {
    pub title: String,
    pub duration_ms: u64,
    pub thumbnail_url: Option<String>,
    pub url: String,
    pub is_spotify: bool,
}

impl StreamDetails {
    /// Fills resolver gaps: title from `title_fallback`, duration 0, URL from the query.
    pub fn normalize(meta: ResolvedMetadata, query: &str, title_fallback: &str) -> Self {
        let title = meta
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_fallback.to_string());
        let duration_ms = meta
            .duration_seconds
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| (d * 1000.0).round() as u64)
            .unwrap_or(0);
        let url = meta
            .canonical_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| query.to_string());

        Self {
            title,
            duration_ms,
            thumbnail_url: meta.thumbnail_url.filter(|u| !u.trim().is_empty()),
            is_spotify: is_spotify_link(query) || is_spotify_link(&url),
            url,
        }
    }
}

/// Outcome of [`QueryDeduplicator::fetch_stream_details`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FetchOutcome {
    Resolved(StreamDetails),
    /// Another fetch for the guild is still running. Not an error.
    InProgress,
    Failed { error: String },
}

/// Scoped ownership of a guild's query slot. The slot is released when the guard drops.
pub struct QueryGuard {
    guild_id: GuildId,
    token: u64,
    active: Arc<ActiveMap>,
    counters: Arc<Counters>,
    released: bool,
}

impl QueryGuard {
    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    pub fn release(mut self) {
        self.release_slot();
    }

    fn release_slot(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // Only clear the slot this guard owns; an explicit release may already have
        // handed it to a newer request.
        let token = self.token;
        if self
            .active
            .remove_if(&self.guild_id, |_, q| q.token == token)
            .is_some()
        {
            self.counters.releases.fetch_add(1, Ordering::Relaxed);
            debug!("[{}] Query slot released", self.guild_id);
        }
    }
}

impl Drop for QueryGuard {
    fn drop(&mut self) {
        self.release_slot();
    }
}

/// Gatekeeper allowing at most one in-flight fetch per guild.
pub struct QueryDeduplicator {
    active: Arc<ActiveMap>,
    counters: Arc<Counters>,
    resolver: Arc<dyn MetadataResolver>,
}

impl QueryDeduplicator {
    pub fn new(resolver: Arc<dyn MetadataResolver>) -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            resolver,
        }
    }

    /// Claims the guild's slot, or reports the request as a duplicate.
    pub fn acquire(&self, guild_id: &GuildId, query: &str) -> Result<QueryGuard, CoreError> {
        match self.active.entry(guild_id.clone()) {
            Entry::Occupied(existing) => {
                debug!(
                    "[{}] Duplicate request suppressed; {:?} still in flight",
                    guild_id,
                    existing.get().query
                );
                Err(CoreError::DuplicateRequest(guild_id.clone()))
            }
            Entry::Vacant(slot) => {
                let token = self.counters.next_token.fetch_add(1, Ordering::Relaxed);
                slot.insert(ActiveQuery {
                    query: query.to_string(),
                    started_at: now_ms(),
                    token,
                });
                Ok(QueryGuard {
                    guild_id: guild_id.clone(),
                    token,
                    active: self.active.clone(),
                    counters: self.counters.clone(),
                    released: false,
                })
            }
        }
    }

    /// Frees the guild's slot regardless of owner. No-op if nothing is held.
    pub fn release(&self, guild_id: &GuildId) -> bool {
        let released = self.active.remove(guild_id).is_some();
        if released {
            self.counters.releases.fetch_add(1, Ordering::Relaxed);
        }
        released
    }

    pub fn is_active(&self, guild_id: &GuildId) -> bool {
        self.active.contains_key(guild_id)
    }

    pub fn active_query(&self, guild_id: &GuildId) -> Option<String> {
        self.active.get(guild_id).map(|q| q.query.clone())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Total slots released since startup.
    pub fn release_count(&self) -> u64 {
        self.counters.releases.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Vec<(GuildId, ActiveQuery)> {
        self.active
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Resolves `query` under the guild's slot and normalizes the answer.
    ///
    /// Resolver failures come back as [`FetchOutcome::Failed`]; the slot is released on
    /// every path, including when this future is dropped mid-fetch.
    pub async fn fetch_stream_details(
        &self,
        query: &str,
        title_fallback: &str,
        guild_id: &GuildId,
    ) -> FetchOutcome {
        let guard = match self.acquire(guild_id, query) {
            Ok(guard) => guard,
            Err(_) => return FetchOutcome::InProgress,
        };

        let outcome = match self.resolver.resolve(guild_id, query).await {
            Ok(meta) => FetchOutcome::Resolved(StreamDetails::normalize(meta, query, title_fallback)),
            Err(e) => {
                warn!("[{}] Failed to resolve {:?}: {}", guild_id, query, e);
                FetchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        guard.release();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resolver::traits::ResolveError,
        testing::{FakeResolver, meta},
    };

    fn dedup(resolver: FakeResolver) -> QueryDeduplicator {
        QueryDeduplicator::new(Arc::new(resolver))
    }

    #[test]
    fn test_acquire_rejects_second_guard() {
        let dedup = dedup(FakeResolver::default());
        let guild = GuildId::from("1");

        let guard = dedup.acquire(&guild, "a").unwrap();
        assert!(matches!(
            dedup.acquire(&guild, "b"),
            Err(CoreError::DuplicateRequest(_))
        ));
        assert_eq!(dedup.active_query(&guild).as_deref(), Some("a"));

        // Other guilds are unaffected.
        let other = dedup.acquire(&GuildId::from("2"), "a").unwrap();
        assert_eq!(dedup.len(), 2);

        drop(guard);
        drop(other);
        assert!(dedup.is_empty());
        assert!(dedup.acquire(&guild, "c").is_ok());
    }

    #[test]
    fn test_release_is_idempotent() {
        let dedup = dedup(FakeResolver::default());
        let guild = GuildId::from("1");

        assert!(!dedup.release(&guild));
        let guard = dedup.acquire(&guild, "a").unwrap();
        assert!(dedup.release(&guild));
        assert!(!dedup.release(&guild));
        assert_eq!(dedup.release_count(), 1);

        // The stale guard must not clear a slot now owned by someone else.
        let newer = dedup.acquire(&guild, "b").unwrap();
        drop(guard);
        assert_eq!(dedup.active_query(&guild).as_deref(), Some("b"));
        assert_eq!(dedup.release_count(), 1);
        newer.release();
        assert_eq!(dedup.release_count(), 2);
        assert!(!dedup.is_active(&guild));
    }

    #[test]
    fn test_normalize_fills_gaps() {
        let details = StreamDetails::normalize(ResolvedMetadata::default(), "some query", "Fallback");
        assert_eq!(details.title, "Fallback");
        assert_eq!(details.duration_ms, 0);
        assert_eq!(details.thumbnail_url, None);
        assert_eq!(details.url, "some query");
        assert!(!details.is_spotify);
    }

    #[test]
    fn test_normalize_keeps_resolver_values() {
        let details = StreamDetails::normalize(
            meta("Real", Some(212.0), Some("https://youtu.be/x")),
            "https://open.spotify.com/track/abc123",
            "Fallback",
        );
        assert_eq!(details.title, "Real");
        assert_eq!(details.duration_ms, 212_000);
        assert_eq!(details.url, "https://youtu.be/x");
        assert!(details.is_spotify);
    }

    #[test]
    fn test_normalize_rejects_bad_duration() {
        let mut raw = meta("x", Some(f64::NAN), None);
        assert_eq!(StreamDetails::normalize(raw.clone(), "q", "f").duration_ms, 0);
        raw.duration_seconds = Some(-3.0);
        assert_eq!(StreamDetails::normalize(raw, "q", "f").duration_ms, 0);
    }

    #[tokio::test]
    async fn test_fetch_releases_on_success() {
        let resolver = FakeResolver::default();
        resolver.respond("song", Ok(meta("Song", Some(1.5), None)));
        let dedup = dedup(resolver);
        let guild = GuildId::from("1");

        let outcome = dedup.fetch_stream_details("song", "fallback", &guild).await;
        match outcome {
            FetchOutcome::Resolved(details) => {
                assert_eq!(details.title, "Song");
                assert_eq!(details.duration_ms, 1_500);
                assert_eq!(details.url, "song");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!dedup.is_active(&guild));
        assert_eq!(dedup.release_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_structured() {
        let resolver = FakeResolver::default();
        resolver.respond(
            "bad",
            Err(ResolveError::Failed {
                message: "Video unavailable".into(),
            }),
        );
        let dedup = dedup(resolver);
        let guild = GuildId::from("1");

        let outcome = dedup.fetch_stream_details("bad", "bad", &guild).await;
        assert_eq!(
            outcome,
            FetchOutcome::Failed {
                error: "Video unavailable".into()
            }
        );
        assert!(!dedup.is_active(&guild));
    }

    #[tokio::test]
    async fn test_fetch_while_held_is_in_progress() {
        let dedup = dedup(FakeResolver::default());
        let guild = GuildId::from("1");
        let _guard = dedup.acquire(&guild, "first").unwrap();

        let outcome = dedup.fetch_stream_details("second", "second", &guild).await;
        assert_eq!(outcome, FetchOutcome::InProgress);
        assert_eq!(dedup.active_query(&guild).as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_dropped_fetch_releases_slot() {
        let resolver = FakeResolver::default();
        let gate = resolver.gate("slow");
        let dedup = Arc::new(dedup(resolver));
        let guild = GuildId::from("1");

        let task = {
            let dedup = dedup.clone();
            let guild = guild.clone();
            tokio::spawn(async move { dedup.fetch_stream_details("slow", "slow", &guild).await })
        };
        gate.wait_started().await;
        assert!(dedup.is_active(&guild));

        task.abort();
        let _ = task.await;
        assert!(!dedup.is_active(&guild));
        assert_eq!(dedup.release_count(), 1);
    }
}
