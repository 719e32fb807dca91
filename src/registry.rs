// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Tracked-path registry.
//!
//! The registry persists the ordered set of absolute paths the user has
//! opted into mirroring. It is the single source of truth for every mirror
//! pass: the staging tree is derived from it, never the other way around.
//!
//! # Persisted Layout
//!
//! One absolute path per line, in append order, no escaping. The file lives
//! at the top of the storage directory. An absent file and an empty file
//! both mean "nothing tracked", which is a legitimate state rather than an
//! error.

use std::{
    fs::OpenOptions,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// File name of the tracked-path list inside the storage directory.
pub const TRACKED_LIST: &str = "toupload.txt";

/// Registry of tracked paths persisted in the storage directory.
#[derive(Clone, Debug)]
pub struct PathRegistry {
    list_path: PathBuf,
}

/// Outcome of a registration attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Registration {
    /// Path was appended to the tracked list.
    Added(PathBuf),

    /// Path was already present; the list is unchanged.
    AlreadyTracked(PathBuf),
}

impl PathRegistry {
    /// Construct registry rooted at target storage directory.
    pub fn new(storage_dir: impl AsRef<Path>) -> Self {
        Self {
            list_path: storage_dir.as_ref().join(TRACKED_LIST),
        }
    }

    /// Location of the persisted list file.
    pub fn list_path(&self) -> &Path {
        &self.list_path
    }

    /// Register a new path for tracking.
    ///
    /// Resolves target path to an absolute path, and appends it to the
    /// persisted list. Registration is idempotent: registering a path that
    /// is already tracked leaves the list untouched and reports
    /// [`Registration::AlreadyTracked`]. Existence is verified here and
    /// never again; a tracked path that later disappears is skipped by the
    /// mirror pass instead of failing it.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::NotFound`] if the path does not exist on
    ///   disk at registration time.
    /// - Return [`RegistryError::Io`] if the list cannot be read or
    ///   appended to.
    pub fn register(&self, path: impl AsRef<Path>) -> Result<Registration> {
        let abs_path = std::path::absolute(path.as_ref()).map_err(RegistryError::Io)?;
        if !abs_path.exists() {
            return Err(RegistryError::NotFound(abs_path));
        }

        if self.list()?.contains(&abs_path) {
            debug!("{:?} already tracked", abs_path.display());
            return Ok(Registration::AlreadyTracked(abs_path));
        }

        // Storage directory is created lazily on first registration.
        if let Some(parent) = self.list_path.parent() {
            mkdirp::mkdirp(parent).map_err(RegistryError::Io)?;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.list_path)
            .map_err(RegistryError::Io)?;
        writeln!(file, "{}", abs_path.display()).map_err(RegistryError::Io)?;

        info!("tracking {:?}", abs_path.display());
        Ok(Registration::Added(abs_path))
    }

    /// List tracked paths in persisted order.
    ///
    /// An absent list file yields an empty listing.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Io`] for any read failure other than the
    ///   file not existing.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let data = match std::fs::read_to_string(&self.list_path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(RegistryError::Io(error)),
        };

        Ok(data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    /// Remove tracked paths by index into the persisted order.
    ///
    /// Rewrites the list with the remaining entries in their original
    /// relative order. The rewrite is a whole-file replacement through a
    /// temporary file in the same directory, so the caller observes either
    /// the full new list or the untouched old one. Indices out of range are
    /// ignored.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Io`] if the list cannot be read or the
    ///   replacement cannot be persisted.
    pub fn remove(&self, indices: &[usize]) -> Result<Vec<PathBuf>> {
        let paths = self.list()?;
        let (dropped, kept): (Vec<_>, Vec<_>) = paths
            .into_iter()
            .enumerate()
            .partition(|(index, _)| indices.contains(index));
        let kept: Vec<PathBuf> = kept.into_iter().map(|(_, path)| path).collect();
        let dropped: Vec<PathBuf> = dropped.into_iter().map(|(_, path)| path).collect();

        if dropped.is_empty() {
            return Ok(dropped);
        }

        let parent = self.list_path.parent().unwrap_or(Path::new("."));
        let mut replacement = NamedTempFile::new_in(parent).map_err(RegistryError::Io)?;
        for path in &kept {
            writeln!(replacement, "{}", path.display()).map_err(RegistryError::Io)?;
        }
        replacement
            .persist(&self.list_path)
            .map_err(|error| RegistryError::Io(error.error))?;

        info!("removed {} tracked path(s)", dropped.len());
        Ok(dropped)
    }
}

/// Tracked-path registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registration target does not exist on disk.
    #[error("path {0:?} does not exist")]
    NotFound(PathBuf),

    /// Tracked list cannot be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    fn registry_with_entries(entries: &[&str]) -> anyhow::Result<PathRegistry> {
        let registry = PathRegistry::new("storage");
        create_dir_all("storage")?;
        for entry in entries {
            create_dir_all(entry)?;
            registry.register(entry)?;
        }
        Ok(registry)
    }

    #[sealed_test]
    fn register_appends_absolute_path() -> anyhow::Result<()> {
        write("tracked.txt", "contents")?;
        let registry = PathRegistry::new("storage");

        let outcome = registry.register("tracked.txt")?;
        let expect = std::path::absolute("tracked.txt")?;

        assert_eq!(outcome, Registration::Added(expect.clone()));
        assert_eq!(registry.list()?, vec![expect]);

        Ok(())
    }

    #[sealed_test]
    fn register_is_idempotent() -> anyhow::Result<()> {
        write("tracked.txt", "contents")?;
        let registry = PathRegistry::new("storage");

        registry.register("tracked.txt")?;
        let outcome = registry.register("tracked.txt")?;

        let expect = std::path::absolute("tracked.txt")?;
        assert_eq!(outcome, Registration::AlreadyTracked(expect.clone()));
        assert_eq!(registry.list()?, vec![expect]);

        Ok(())
    }

    #[sealed_test]
    fn register_rejects_missing_path() {
        let registry = PathRegistry::new("storage");
        let result = registry.register("no-such-thing");
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[sealed_test]
    fn list_reports_nothing_tracked_as_empty() -> anyhow::Result<()> {
        let registry = PathRegistry::new("storage");
        assert_eq!(registry.list()?, Vec::<PathBuf>::new());
        Ok(())
    }

    #[sealed_test]
    fn remove_preserves_relative_order() -> anyhow::Result<()> {
        let registry = registry_with_entries(&["a", "b", "c"])?;

        let dropped = registry.remove(&[0, 2])?;

        assert_eq!(
            dropped,
            vec![std::path::absolute("a")?, std::path::absolute("c")?]
        );
        assert_eq!(registry.list()?, vec![std::path::absolute("b")?]);

        Ok(())
    }

    #[sealed_test]
    fn remove_with_no_matches_leaves_list_untouched() -> anyhow::Result<()> {
        let registry = registry_with_entries(&["a", "b"])?;

        let dropped = registry.remove(&[7])?;

        assert_eq!(dropped, Vec::<PathBuf>::new());
        assert_eq!(
            registry.list()?,
            vec![std::path::absolute("a")?, std::path::absolute("b")?]
        );

        Ok(())
    }
}
