use serde::{Deserialize, Serialize};

/// External metadata resolver process settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResolverConfig {
    /// Executable launched once per fetch.
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before the query.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Prefix applied to queries that are not URLs.
    #[serde(default = "default_search_prefix")]
    pub search_prefix: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub validate_thumbnails: bool,
    #[serde(default = "default_thumbnail_timeout_ms")]
    pub thumbnail_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            search_prefix: default_search_prefix(),
            timeout_ms: default_timeout_ms(),
            validate_thumbnails: true,
            thumbnail_timeout_ms: default_thumbnail_timeout_ms(),
        }
    }
}

fn default_program() -> String {
    "yt-dlp".to_string()
}

fn default_args() -> Vec<String> {
    [
        "--dump-single-json",
        "--no-playlist",
        "--no-warnings",
        "--skip-download",
        "--format",
        "bestaudio/best",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_search_prefix() -> String {
    "ytsearch1:".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_thumbnail_timeout_ms() -> u64 {
    3_000
}

fn default_true() -> bool {
    true
}
