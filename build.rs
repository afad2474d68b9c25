use std::{fs, process::Command, time::SystemTime};

fn main() {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    println!("cargo:rustc-env=BUILD_TIME={}", now);
    println!("cargo:rerun-if-changed=.git/HEAD");

    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"])
        .or_else(|| head_ref().map(|r| r.rsplit('/').next().unwrap_or(&r).to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    let commit = git(&["rev-parse", "HEAD"])
        .or_else(|| head_ref().and_then(|r| fs::read_to_string(format!(".git/{}", r)).ok()))
        .map(|c| c.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=GIT_BRANCH={}", branch);
    println!("cargo:rustc-env=GIT_COMMIT={}", commit);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// `refs/heads/<branch>` from `.git/HEAD` when git itself is unavailable.
fn head_ref() -> Option<String> {
    let head = fs::read_to_string(".git/HEAD").ok()?;
    head.strip_prefix("ref: ").map(|r| r.trim().to_string())
}
