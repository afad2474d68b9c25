use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::{
    common::{errors::CoreError, types::GuildId},
    configs::ResolverConfig,
    process::ProcessRegistry,
    resolver::{
        links::is_url,
        traits::{MetadataResolver, ResolveError, ResolvedMetadata},
    },
};

/// Resolves queries by running an external extractor (yt-dlp compatible) per request.
pub struct ProcessResolver {
    config: ResolverConfig,
    processes: Arc<ProcessRegistry>,
}

impl ProcessResolver {
    pub fn new(config: ResolverConfig, processes: Arc<ProcessRegistry>) -> Self {
        Self { config, processes }
    }

    fn target(&self, query: &str) -> String {
        let query = query.trim();
        if is_url(query) {
            query.to_string()
        } else {
            format!("{}{}", self.config.search_prefix, query)
        }
    }

    fn command(&self, target: &str) -> Command {
        let mut command = Command::new(&self.config.program);
        command.args(&self.config.args).arg(target);
        command
    }
}

#[async_trait]
impl MetadataResolver for ProcessResolver {
    async fn resolve(
        &self,
        guild_id: &GuildId,
        query: &str,
    ) -> Result<ResolvedMetadata, ResolveError> {
        let target = self.target(query);
        let handle = self
            .processes
            .spawn(guild_id, self.command(&target))
            .map_err(|e| match e {
                CoreError::ProcessSpawn(io) => ResolveError::Spawn(io),
                other => ResolveError::Failed {
                    message: other.to_string(),
                },
            })?;
        debug!("[{}] Resolving {:?} via pid {}", guild_id, target, handle.pid());

        // Dropping the wait future on timeout kills the child and untracks it.
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let output = tokio::time::timeout(timeout, handle.wait_with_output())
            .await
            .map_err(|_| ResolveError::Timeout(self.config.timeout_ms))??;

        if !output.status.success() {
            return Err(ResolveError::Failed {
                message: last_error_line(&output.stderr)
                    .unwrap_or_else(|| format!("resolver exited with {}", output.status)),
            });
        }

        parse_metadata(&output.stdout)
    }
}

/// Picks the most useful line out of the extractor's stderr.
fn last_error_line(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or(lines.last())
        .map(|l| l.trim_start_matches("ERROR:").trim().to_string())
}

/// Parses extractor JSON. Search results arrive as a playlist; the first entry wins.
pub fn parse_metadata(stdout: &[u8]) -> Result<ResolvedMetadata, ResolveError> {
    let value: Value =
        serde_json::from_slice(stdout).map_err(|e| ResolveError::Malformed(e.to_string()))?;

    let item = match value.get("entries") {
        Some(Value::Array(entries)) => entries.first().cloned().ok_or_else(|| {
            ResolveError::Failed {
                message: "no results found".to_string(),
            }
        })?,
        _ => value,
    };

    serde_json::from_value(item).map_err(|e| ResolveError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProbe;

    fn resolver(program: &str, args: &[&str]) -> (ProcessResolver, Arc<ProcessRegistry>) {
        let processes = Arc::new(ProcessRegistry::new(Arc::new(FakeProbe::with_alive(&[]))));
        let config = ResolverConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout_ms: 2_000,
            ..ResolverConfig::default()
        };
        (ProcessResolver::new(config, processes.clone()), processes)
    }

    #[test]
    fn test_parse_single_video() {
        let json = br#"{"title":"Song","duration":125.4,"thumbnail":"https://i.ytimg.com/x.jpg","webpage_url":"https://youtu.be/x"}"#;
        let meta = parse_metadata(json).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Song"));
        assert_eq!(meta.duration_seconds, Some(125.4));
        assert_eq!(meta.thumbnail_url.as_deref(), Some("https://i.ytimg.com/x.jpg"));
        assert_eq!(meta.canonical_url.as_deref(), Some("https://youtu.be/x"));
    }

    #[test]
    fn test_parse_search_playlist_takes_first_entry() {
        let json = br#"{"_type":"playlist","entries":[{"title":"First","duration":null},{"title":"Second"}]}"#;
        let meta = parse_metadata(json).unwrap();
        assert_eq!(meta.title.as_deref(), Some("First"));
        assert_eq!(meta.duration_seconds, None);
        assert_eq!(meta.canonical_url, None);
    }

    #[test]
    fn test_parse_empty_search() {
        let err = parse_metadata(br#"{"entries":[]}"#).unwrap_err();
        assert_eq!(err.to_string(), "no results found");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_metadata(b"not json"),
            Err(ResolveError::Malformed(_))
        ));
    }

    #[test]
    fn test_last_error_line_prefers_error_prefix() {
        let stderr = b"WARNING: something\nERROR: Video unavailable\n[debug] trailing\n";
        assert_eq!(last_error_line(stderr).as_deref(), Some("Video unavailable"));
        assert_eq!(last_error_line(b"").as_deref(), None);
    }

    #[test]
    fn test_target_prefixes_searches_only() {
        let (resolver, _) = resolver("yt-dlp", &[]);
        assert_eq!(resolver.target(" lofi beats "), "ytsearch1:lofi beats");
        assert_eq!(
            resolver.target("https://youtu.be/x"),
            "https://youtu.be/x"
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let (resolver, processes) = resolver("/nonexistent/extractor", &[]);
        let err = resolver
            .resolve(&GuildId::from("g"), "anything")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Spawn(_)));
        assert_eq!(processes.total_processes(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_resolves_through_child_process() {
        // `sh -c <script> <target>`: the script ignores the target and prints fixed JSON.
        let (resolver, processes) = resolver(
            "sh",
            &["-c", r#"echo '{"title":"Shell Song","duration":61}'"#],
        );
        let meta = resolver
            .resolve(&GuildId::from("g"), "https://example.com/a")
            .await
            .unwrap();
        assert_eq!(meta.title.as_deref(), Some("Shell Song"));
        assert_eq!(meta.duration_seconds, Some(61.0));
        assert_eq!(processes.total_processes(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let (resolver, _) = resolver("sh", &["-c", "echo 'ERROR: Private video' >&2; exit 1"]);
        let err = resolver
            .resolve(&GuildId::from("g"), "https://example.com/a")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Private video");
    }
}
