//! Stamps the binary with its source revision and build time.
//!
//! `TAPFORGE_GIT_COMMIT` overrides the revision for builds outside a checkout.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    Some(revision.trim().to_owned())
}

fn main() {
    let revision = std::env::var("TAPFORGE_GIT_COMMIT")
        .ok()
        .or_else(git_revision)
        .unwrap_or_else(|| "unknown".to_owned());

    println!("cargo:rustc-env=GIT_COMMIT_SHORT={revision}");
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    println!("cargo:rerun-if-env-changed=TAPFORGE_GIT_COMMIT");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
