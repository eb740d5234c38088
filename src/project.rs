// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Project boundary detection.
//!
//! A language-server session is scoped to one cargo project. When the
//! editor opens a file outside the cached project root the session has to
//! be torn down and reconnected for the new project.

use std::path::{Component, Path, PathBuf};

/// Manifest file that marks a cargo project root.
pub const CARGO_MANIFEST: &str = "Cargo.toml";

/// Computes the path that leads from `from` to `to`, lexically.
///
/// Both paths are made absolute against the current directory and
/// normalized (`.` removed, `..` folded) without touching the filesystem.
/// Equal paths yield an empty path. If the two paths share no root (e.g.
/// different drive prefixes) the absolute `to` is returned.
#[must_use]
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);

    let from_parts: Vec<Component<'_>> = from.components().collect();
    let to_parts: Vec<Component<'_>> = to.components().collect();

    let shared = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    if is_rooted(&to_parts) && !is_rooted(&to_parts[..shared]) {
        return to_parts.iter().collect();
    }

    let mut relative = PathBuf::new();
    for _ in shared..from_parts.len() {
        relative.push(Component::ParentDir);
    }
    for part in &to_parts[shared..] {
        relative.push(part);
    }
    relative
}

/// Whether `path` lies outside the project rooted at `root`.
///
/// True when the relative path is empty (the root itself), climbs out of
/// the root, or cannot be expressed relatively at all.
#[must_use]
pub fn is_outside_project(root: &Path, path: &Path) -> bool {
    let relative = relative_path(root, path);
    relative.as_os_str().is_empty()
        || relative.starts_with(Component::ParentDir)
        || relative.is_absolute()
}

/// Finds the nearest directory at or above `path` that holds a `Cargo.toml`.
#[must_use]
pub fn find_cargo_root(path: &Path) -> Option<PathBuf> {
    let start = if path.is_dir() { Some(path) } else { path.parent() };

    start?
        .ancestors()
        .find(|dir| dir.join(CARGO_MANIFEST).is_file())
        .map(Path::to_path_buf)
}

fn is_rooted(parts: &[Component<'_>]) -> bool {
    parts
        .iter()
        .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to remove the root, which matches `/..` == `/`
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
