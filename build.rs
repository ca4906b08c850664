// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=BECAM_BUILD_VERSION");

    // Packagers can pin the version string without a git checkout
    let version = match std::env::var("BECAM_BUILD_VERSION") {
        Ok(v) => v,
        Err(_) => describe_version(),
    };

    println!("cargo::rustc-env=BECAM_GIT_VERSION={}", version);
}

/// Build a version string from `git describe`.
///
/// - exact tag `v0.1.0` becomes `0.1.0`
/// - `v0.1.0-5-gabcdef1` becomes `0.1.0+5.abcdef1`
/// - no git at all falls back to the package version
fn describe_version() -> String {
    let pkg_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--match", "v*"])
        .output();

    let described = match output {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => return pkg_version,
    };

    let described = described.strip_prefix('v').unwrap_or(&described);
    let parts: Vec<&str> = described.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [hash, commits, base] => {
            let hash = hash.strip_prefix('g').unwrap_or(hash);
            format!("{}+{}.{}", base, commits, hash)
        }
        // Only a bare commit hash (no tags yet)
        [hash] if !hash.contains('.') => format!("{}+{}", pkg_version, hash),
        _ => described.to_string(),
    }
}
