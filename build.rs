use std::process::Command;

fn main() {
    // Get Cargo.toml version
    let cargo_version = env!("CARGO_PKG_VERSION");

    // Get git commit hash
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok();

    let git_hash = output
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    // Check if working directory is dirty
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok();

    let dirty = output.map(|o| !o.stdout.is_empty()).unwrap_or(false);

    // Build version string: v0.3.1 (abc1234) or v0.3.1-dev (abc1234)
    let version = if dirty {
        format!("v{}-dev ({})", cargo_version, git_hash)
    } else {
        format!("v{} ({})", cargo_version, git_hash)
    };

    println!("cargo:rustc-env=EVENTDECK_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=EVENTDECK_VERSION={}", version);

    // Re-run if git HEAD changes or Cargo.toml changes
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=Cargo.toml");
}
