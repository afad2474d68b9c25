use crate::{configs::Config, log_println};

const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Build metadata injected by `build.rs`.
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub build_time: u64,
    pub profile: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: option_env!("GIT_BRANCH").unwrap_or("unknown"),
            commit: option_env!("GIT_COMMIT").unwrap_or("unknown"),
            build_time: option_env!("BUILD_TIME")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

impl BuildInfo {
    pub fn commit_short(&self) -> &str {
        self.commit.get(..7).unwrap_or(self.commit)
    }
}

pub fn print_banner(info: &BuildInfo, config: &Config) {
    log_println!();
    log_println!("{CYAN}{BOLD}  tunelink{RESET} {DIM}per-guild playback core{RESET}");
    log_println!("{DIM}========================================{RESET}");

    row("Version", info.version);
    row("Branch", info.branch);
    row("Commit", info.commit_short());
    row("Profile", info.profile);
    row("Resolver", &config.resolver.program);
    row(
        "Idle timeout",
        &format!("{}s", config.timeouts.idle_timeout_secs),
    );
    log_println!();
}

fn row(label: &str, value: &str) {
    log_println!("  {BOLD}{label:<14}{RESET}{value}");
}
