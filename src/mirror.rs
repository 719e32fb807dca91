// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Mirror tracked paths into the staging tree.
//!
//! A mirror pass is a full rebuild, not a merge. The staging tree is a
//! derived artifact: the registry is the source of truth, so every pass
//! starts by deleting everything under the staging root except the VCS
//! collaborator's own metadata directory, then copies each tracked path
//! back in, stamping fresh origin metadata as it goes.
//!
//! # Failure Policy
//!
//! At-least-effort semantics. A tracked path that has disappeared from disk
//! is skipped with a warning. A copy failure for one tracked path is
//! recorded and the pass moves on to the next entry; only registry reads
//! and the initial tree reset are fatal.

use crate::{
    origin::{append_ledger_line, portablize, write_dir_record, OriginError, ORIGIN_FILE},
    registry::{PathRegistry, RegistryError},
};

use std::{
    fs::{copy, create_dir_all, read_dir, remove_dir_all, remove_file, set_permissions},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Report of a single mirror pass.
#[derive(Debug, Default)]
pub struct MirrorReport {
    /// Tracked paths copied into the staging tree.
    pub mirrored: Vec<PathBuf>,

    /// Tracked paths that no longer exist on disk, skipped.
    pub missing: Vec<PathBuf>,

    /// Tracked paths whose copy failed, with the failure rendered for
    /// display.
    pub failures: Vec<EntryFailure>,
}

impl MirrorReport {
    /// Whether the pass produced any staged entries.
    ///
    /// An empty tracked set is a legitimate no-op, not an error.
    pub fn produced_entries(&self) -> bool {
        !self.mirrored.is_empty()
    }
}

/// A per-entry copy failure, reported but never fatal.
#[derive(Debug)]
pub struct EntryFailure {
    /// The tracked path that failed to mirror.
    pub path: PathBuf,

    /// Diagnostic text of the underlying failure.
    pub reason: String,
}

/// Mirror every tracked path into the staging tree.
///
/// Resets the tree first, then processes each tracked path in registry
/// order: directories are copied recursively and stamped with a fresh
/// single-line origin record, files are copied verbatim and appended to
/// the root ledger. `preserve` names the one directory spared by the
/// reset, the VCS collaborator's metadata directory.
///
/// # Errors
///
/// - Return [`MirrorError::Registry`] if the tracked list cannot be read.
/// - Return [`MirrorError::Io`] if the tree reset fails.
#[instrument(skip(registry, staging_root), level = "debug")]
pub fn sync(
    registry: &PathRegistry,
    staging_root: impl AsRef<Path>,
    preserve: &str,
) -> Result<MirrorReport> {
    let staging_root = staging_root.as_ref();
    let tracked = registry.list().map_err(MirrorError::Registry)?;

    reset_tree(staging_root, preserve)?;

    let mut report = MirrorReport::default();
    for path in tracked {
        if !path.exists() {
            warn!("skipping {:?}: no longer exists", path.display());
            report.missing.push(path);
            continue;
        }

        match mirror_entry(&path, staging_root) {
            Ok(()) => report.mirrored.push(path),
            Err(error) => {
                warn!("skipping {:?}: {error}", path.display());
                report.failures.push(EntryFailure {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    info!(
        "mirrored {} entr(ies), {} missing, {} failed",
        report.mirrored.len(),
        report.missing.len(),
        report.failures.len()
    );

    Ok(report)
}

/// Delete every entry under the staging root except `preserve`.
///
/// Destructive and unconditional. A partially-mirrored tree left behind by
/// an interrupted run is corrected here on the next pass.
fn reset_tree(staging_root: &Path, preserve: &str) -> Result<()> {
    mkdirp::mkdirp(staging_root).map_err(MirrorError::Io)?;

    for entry in read_dir(staging_root).map_err(MirrorError::Io)? {
        let entry = entry.map_err(MirrorError::Io)?;
        if entry.file_name() == preserve {
            continue;
        }

        debug!("reset: removing {:?}", entry.path().display());
        let file_type = entry.file_type().map_err(MirrorError::Io)?;
        if file_type.is_dir() {
            remove_dir_all(entry.path()).map_err(MirrorError::Io)?;
        } else {
            remove_file(entry.path()).map_err(MirrorError::Io)?;
        }
    }

    Ok(())
}

/// Copy one tracked path into the staging tree and stamp its origin.
fn mirror_entry(path: &Path, staging_root: &Path) -> Result<()> {
    let name = path
        .file_name()
        .ok_or_else(|| MirrorError::NoBasename(path.to_path_buf()))?;
    let dest = staging_root.join(name);

    // Distinct tracked paths sharing a basename overwrite each other here.
    // Deliberately left unresolved; see DESIGN.md.
    if dest.exists() {
        warn!(
            "staging destination {:?} already exists; overwriting",
            dest.display()
        );
    }

    let template = portablize(path);
    if path.is_dir() {
        copy_dir(path, &dest)?;
        write_dir_record(&dest, &template).map_err(MirrorError::Origin)?;
    } else {
        copy(path, &dest).map_err(MirrorError::Io)?;
        append_ledger_line(staging_root, &template).map_err(MirrorError::Origin)?;
    }

    Ok(())
}

/// Recursively copy a directory, preserving mode bits.
///
/// Any file named `.original_path` inside the source is skipped, so a
/// previously-installed tree that is tracked again does not carry a stale
/// record back into the mirror; the caller stamps a fresh one afterwards.
pub(crate) fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(MirrorError::Walk)?;
        if entry.file_type().is_file() && entry.file_name() == ORIGIN_FILE {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let dest = dst.join(rel);

        if entry.file_type().is_dir() {
            create_dir_all(&dest).map_err(MirrorError::Io)?;
            let mode = entry.metadata().map_err(MirrorError::Walk)?.permissions();
            set_permissions(&dest, mode).map_err(MirrorError::Io)?;
        } else {
            copy(entry.path(), &dest).map_err(MirrorError::Io)?;
        }
    }

    Ok(())
}

/// Mirror error types.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// Tracked list cannot be read.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Origin metadata cannot be stamped.
    #[error(transparent)]
    Origin(#[from] OriginError),

    /// Directory traversal failed.
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// Tracked path has no final component to name its staged copy.
    #[error("tracked path {0:?} has no basename")]
    NoBasename(PathBuf),

    /// Filesystem copy or reset failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = MirrorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::read_ledger;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    fn tracked_registry(paths: &[&str]) -> anyhow::Result<PathRegistry> {
        let registry = PathRegistry::new("storage");
        for path in paths {
            registry.register(path)?;
        }
        Ok(registry)
    }

    #[sealed_test(env = [("HOME", "/home/alice"), ("USER", "alice")])]
    fn sync_mirrors_file_with_ledger_line() -> anyhow::Result<()> {
        write(".vimrc", "set number")?;
        let registry = tracked_registry(&[".vimrc"])?;

        let report = sync(&registry, "staging", ".git")?;

        assert!(report.produced_entries());
        assert_eq!(read_to_string("staging/.vimrc")?, "set number");
        assert_eq!(
            read_ledger("staging")?,
            vec![portablize(std::path::absolute(".vimrc")?)]
        );

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/alice"), ("USER", "alice")])]
    fn sync_mirrors_directory_with_fresh_record() -> anyhow::Result<()> {
        create_dir_all("nvim/lua")?;
        write("nvim/init.lua", "-- init")?;
        write("nvim/lua/opts.lua", "-- opts")?;
        // Stale record from a previous install must not be carried over.
        write("nvim/.original_path", "$HOME/stale")?;
        let registry = tracked_registry(&["nvim"])?;

        sync(&registry, "staging", ".git")?;

        assert_eq!(read_to_string("staging/nvim/init.lua")?, "-- init");
        assert_eq!(read_to_string("staging/nvim/lua/opts.lua")?, "-- opts");
        assert_eq!(
            read_to_string("staging/nvim/.original_path")?,
            portablize(std::path::absolute("nvim")?)
        );

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/alice"), ("USER", "alice")])]
    fn sync_resets_tree_but_spares_metadata_dir() -> anyhow::Result<()> {
        create_dir_all("staging/.git")?;
        write("staging/.git/HEAD", "ref: refs/heads/main")?;
        write("staging/leftover", "from a previous run")?;
        create_dir_all("staging/old-dir")?;
        let registry = tracked_registry(&[])?;

        let report = sync(&registry, "staging", ".git")?;

        assert!(!report.produced_entries());
        assert_eq!(
            read_to_string("staging/.git/HEAD")?,
            "ref: refs/heads/main"
        );
        assert!(!Path::new("staging/leftover").exists());
        assert!(!Path::new("staging/old-dir").exists());

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/alice"), ("USER", "alice")])]
    fn sync_skips_vanished_path_without_failing() -> anyhow::Result<()> {
        write(".vimrc", "set number")?;
        write(".bashrc", "export PS1")?;
        let registry = tracked_registry(&[".vimrc", ".bashrc"])?;
        std::fs::remove_file(".vimrc")?;

        let report = sync(&registry, "staging", ".git")?;

        assert_eq!(report.missing, vec![std::path::absolute(".vimrc")?]);
        assert_eq!(report.mirrored, vec![std::path::absolute(".bashrc")?]);
        assert!(report.failures.is_empty());

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/alice"), ("USER", "alice")])]
    fn repeated_sync_rebuilds_ledger_from_scratch() -> anyhow::Result<()> {
        write(".vimrc", "set number")?;
        let registry = tracked_registry(&[".vimrc"])?;

        sync(&registry, "staging", ".git")?;
        sync(&registry, "staging", ".git")?;

        // One line, not two: the reset wipes the previous ledger.
        assert_eq!(
            read_ledger("staging")?,
            vec![portablize(std::path::absolute(".vimrc")?)]
        );

        Ok(())
    }
}
