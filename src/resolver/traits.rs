use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::common::types::GuildId;

/// Raw answer from the external metadata resolver. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolvedMetadata {
    pub title: Option<String>,
    #[serde(rename = "duration")]
    pub duration_seconds: Option<f64>,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: Option<String>,
    #[serde(rename = "webpage_url", alias = "original_url")]
    pub canonical_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("could not start resolver: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("{message}")]
    Failed { message: String },

    #[error("resolver timed out after {0} ms")]
    Timeout(u64),

    #[error("resolver returned malformed output: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Turns a user query into track metadata.
///
/// Implementations run one resolution per call and never retry; the core surfaces the
/// first failure to the user.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, guild_id: &GuildId, query: &str)
    -> Result<ResolvedMetadata, ResolveError>;
}
