// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Build script that stamps the `situ` binary with a git-derived version.
//!
//! `git describe --tags --always --dirty` yields strings such as `0.4.0`,
//! `0.4.0-2-gdeadbee` or `0.4.0-2-gdeadbee-dirty`. Without git (release
//! tarballs, vendored builds) the package version is used as-is.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    let version = describe().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    println!("cargo:rustc-env=SITU_VERSION={version}");
}

fn describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Tags are cut as v0.4.0
    Some(trimmed.trim_start_matches('v').to_string())
}
