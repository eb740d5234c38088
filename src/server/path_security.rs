/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! Confines classroom file access to the workspace root.
//!
//! Paths from peers may be absolute or relative to the root. Either way
//! the resolved file must sit under the root after symlinks are followed,
//! and situ's own configuration files are never writable.

use anyhow::{Result, anyhow};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::{PROJECT_CONFIG_FILE, user_config_path};

/// Validates peer-supplied paths against one workspace root.
#[derive(Debug, Clone)]
pub struct PathValidator {
    /// Canonical workspace root.
    root: PathBuf,
    /// Canonical paths of situ config files that must not be written.
    protected_configs: Vec<PathBuf>,
}

impl PathValidator {
    /// Creates a validator for `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist.
    pub fn new(root: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| anyhow!("Workspace root does not exist: {}: {e}", root.display()))?;
        let protected_configs = Self::discover_config_paths(&root);
        debug!(
            "PathValidator for {} protecting {} config file(s)",
            root.display(),
            protected_configs.len()
        );
        Ok(Self {
            root,
            protected_configs,
        })
    }

    /// The canonical workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates a requested path for reading and returns the canonical file.
    ///
    /// # Errors
    ///
    /// Returns an error if the path climbs with `..`, does not exist, or
    /// resolves outside the root.
    pub fn validate_read(&self, requested: &str) -> Result<PathBuf> {
        let path = self.resolve(requested)?;
        let canonical = path
            .canonicalize()
            .map_err(|e| anyhow!("Path does not exist: {requested}: {e}"))?;

        if !canonical.starts_with(&self.root) {
            return Err(anyhow!("Path is outside the workspace: {requested}"));
        }
        Ok(canonical)
    }

    /// Validates a requested path for writing and returns where to write.
    ///
    /// A file that does not exist yet is checked through its nearest
    /// existing ancestor; missing directories are the caller's to create.
    ///
    /// # Errors
    ///
    /// Returns an error if the path climbs with `..`, resolves outside the
    /// root, or names a situ configuration file.
    pub fn validate_write(&self, requested: &str) -> Result<PathBuf> {
        let path = self.resolve(requested)?;

        let target = if path.exists() {
            path.canonicalize()
                .map_err(|e| anyhow!("Cannot resolve path: {requested}: {e}"))?
        } else {
            let ancestor = path
                .ancestors()
                .skip(1)
                .find(|dir| dir.exists())
                .ok_or_else(|| anyhow!("No existing ancestor for: {requested}"))?;
            let canonical_ancestor = ancestor
                .canonicalize()
                .map_err(|e| anyhow!("Cannot resolve {}: {e}", ancestor.display()))?;
            match path.strip_prefix(ancestor) {
                Ok(rest) => canonical_ancestor.join(rest),
                Err(_) => return Err(anyhow!("Cannot resolve path: {requested}")),
            }
        };

        if !target.starts_with(&self.root) {
            return Err(anyhow!("Path is outside the workspace: {requested}"));
        }
        if self.protected_configs.iter().any(|config| *config == target) {
            return Err(anyhow!("Cannot modify situ configuration file: {requested}"));
        }
        Ok(target)
    }

    /// Joins relative requests onto the root and refuses `..` components.
    fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let path = Path::new(requested);
        if requested.is_empty() {
            return Err(anyhow!("Empty path"));
        }
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(anyhow!("Path must not contain '..': {requested}"));
        }
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }

    fn discover_config_paths(root: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(user_config) = user_config_path() {
            paths.extend(user_config.canonicalize());
        }

        // The nearest project config above the root.
        for dir in root.ancestors() {
            if let Ok(canonical) = dir.join(PROJECT_CONFIG_FILE).canonicalize() {
                if !paths.contains(&canonical) {
                    paths.push(canonical);
                }
                break;
            }
        }

        // A project config created after startup still lands here.
        let local = root.join(PROJECT_CONFIG_FILE);
        if !paths.contains(&local) {
            paths.push(local);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup_workspace() -> Result<(TempDir, PathValidator)> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("main.rs"), "fn main() {}")?;
        fs::create_dir_all(dir.path().join("src"))?;
        fs::write(dir.path().join("src/lib.rs"), "// lib")?;
        let validator = PathValidator::new(dir.path())?;
        Ok((dir, validator))
    }

    #[test]
    fn test_read_relative_and_absolute() -> Result<()> {
        let (dir, validator) = setup_workspace()?;
        let root = dir.path().canonicalize()?;

        assert_eq!(validator.validate_read("src/lib.rs")?, root.join("src/lib.rs"));
        let absolute = root.join("main.rs");
        assert_eq!(
            validator.validate_read(&absolute.to_string_lossy())?,
            absolute
        );
        Ok(())
    }

    #[test]
    fn test_read_rejections() -> Result<()> {
        let (_dir, validator) = setup_workspace()?;

        let missing = validator.validate_read("nope.rs").err().map(|e| e.to_string());
        assert!(missing.is_some_and(|e| e.contains("does not exist")));

        let other = TempDir::new()?;
        let stray = other.path().join("stray.rs");
        fs::write(&stray, "// stray")?;
        let outside = validator
            .validate_read(&stray.to_string_lossy())
            .err()
            .map(|e| e.to_string());
        assert!(outside.is_some_and(|e| e.contains("outside the workspace")));

        assert!(validator.validate_read("src/../main.rs").is_err());
        assert!(validator.validate_read("").is_err());
        Ok(())
    }

    #[test]
    fn test_write_new_file_in_new_dir() -> Result<()> {
        let (dir, validator) = setup_workspace()?;
        let target = validator.validate_write("lessons/demo/main.rs")?;
        assert_eq!(
            target,
            dir.path().canonicalize()?.join("lessons/demo/main.rs")
        );
        Ok(())
    }

    #[test]
    fn test_write_rejections() -> Result<()> {
        let (dir, validator) = setup_workspace()?;
        assert!(validator.validate_write("/tmp/situ-outside.rs").is_err());
        assert!(validator.validate_write("new/../../escape.rs").is_err());

        let config = validator
            .validate_write(PROJECT_CONFIG_FILE)
            .err()
            .map(|e| e.to_string());
        assert!(config.is_some_and(|e| e.contains("configuration file")));

        fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[shell]\nenabled = false\n")?;
        let validator = PathValidator::new(dir.path())?;
        assert!(validator.validate_write(PROJECT_CONFIG_FILE).is_err());
        assert!(validator.validate_read(PROJECT_CONFIG_FILE).is_ok());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_fails() -> Result<()> {
        use std::os::unix::fs as unix_fs;

        let (dir, validator) = setup_workspace()?;
        let outside_dir = TempDir::new()?;
        let outside_file = outside_dir.path().join("secret.txt");
        fs::write(&outside_file, "secret")?;
        unix_fs::symlink(&outside_file, dir.path().join("sneaky.txt"))?;

        assert!(validator.validate_read("sneaky.txt").is_err());
        assert!(validator.validate_write("sneaky.txt").is_err());
        Ok(())
    }
}
