use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        Self::parse(&config_str).map_err(|e| format!("{}: {}", config_path, e).into())
    }

    pub fn parse(config_str: &str) -> AnyResult<Self> {
        if config_str.trim().is_empty() {
            return Err("configuration is empty".into());
        }
        Ok(toml::from_str(config_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_applies_section_defaults() {
        let config = Config::parse(
            r#"
            [server]
            password = "hunter2"

            [timeouts]
            idle_timeout_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.server.password, "hunter2");
        assert_eq!(config.server.port, 2444);
        assert_eq!(config.timeouts.idle_timeout_secs, 30);
        assert_eq!(config.timeouts.pause_timeout_secs, 600);
        assert_eq!(config.resolver.program, "yt-dlp");
        assert_eq!(config.resolver.search_prefix, "ytsearch1:");
        assert_eq!(config.cleanup.max_error_notifications, 3);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(Config::parse("  \n").is_err());
    }

    #[test]
    fn test_parse_log_file_section() {
        let config = Config::parse(
            r#"
            [logging]
            level = "debug"
            [logging.file]
            path = "./logs/tunelink.log"
            "#,
        )
        .unwrap();
        let file = config.logging.file.unwrap();
        assert_eq!(file.path, "./logs/tunelink.log");
        assert_eq!(file.max_lines, 10_000);
    }
}
