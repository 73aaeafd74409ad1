//! Embeds build identification (commit, timestamp, profile) logged at startup

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|hash| hash.trim().to_string())
}

fn main() {
    let unknown = || "unknown".to_string();
    let vars = [
        ("GIT_HASH", git_short_hash().unwrap_or_else(unknown)),
        (
            "BUILD_TIMESTAMP",
            chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        ),
        ("BUILD_PROFILE", std::env::var("PROFILE").unwrap_or_else(|_| unknown())),
    ];
    for (key, value) in vars {
        println!("cargo:rustc-env={}={}", key, value);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
}
