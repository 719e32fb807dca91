// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Restore staged entries to their original filesystem locations.
//!
//! Install is the reverse of a mirror pass. Given a cloned staging tree,
//! it walks the two kinds of origin metadata and writes entries back to
//! the live filesystem:
//!
//! - each non-blank ledger line names a top-level __file__ to restore, at
//!   the location the line's template resolves to in the *current*
//!   environment;
//! - each top-level __directory__ carrying a `.original_path` record is
//!   restored recursively, minus the record file itself. A directory
//!   without a record is never installed.
//!
//! Per-entry failures are warnings; the command succeeds as long as the
//! tree itself could be read.

use crate::{
    mirror::{copy_dir, EntryFailure, MirrorError},
    origin::{read_dir_record, read_ledger, resolve, OriginError},
};

use std::{
    fs::{copy, read_dir},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Report of a single install pass.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Live-filesystem destinations that were restored.
    pub installed: Vec<PathBuf>,

    /// Entries that could not be restored, with the failure rendered for
    /// display.
    pub failures: Vec<EntryFailure>,
}

/// Restore every entry of a staging tree to its resolved origin.
///
/// `metadata_dir` names the VCS collaborator's directory inside the tree,
/// which is never treated as a staged entry.
///
/// # Errors
///
/// - Return [`InstallError::Origin`] if the root ledger cannot be read.
/// - Return [`InstallError::Io`] if the tree's top level cannot be listed.
#[instrument(skip(source_tree), level = "debug")]
pub fn install(source_tree: impl AsRef<Path>, metadata_dir: &str) -> Result<InstallReport> {
    let source_tree = source_tree.as_ref();
    let mut report = InstallReport::default();

    for line in read_ledger(source_tree).map_err(InstallError::Origin)? {
        match install_file(source_tree, &line) {
            Ok(dest) => {
                info!("installed {:?}", dest.display());
                report.installed.push(dest);
            }
            Err(error) => {
                warn!("skipping ledger entry {line:?}: {error}");
                report.failures.push(EntryFailure {
                    path: PathBuf::from(line),
                    reason: error.to_string(),
                });
            }
        }
    }

    for entry in read_dir(source_tree).map_err(InstallError::Io)? {
        let entry = entry.map_err(InstallError::Io)?;
        if !entry.file_type().map_err(InstallError::Io)?.is_dir() {
            continue;
        }
        if entry.file_name() == metadata_dir {
            continue;
        }

        match install_dir(&entry.path()) {
            Ok(Some(dest)) => {
                info!("installed {:?}", dest.display());
                report.installed.push(dest);
            }
            Ok(None) => debug!("{:?} carries no origin record, skipped", entry.path().display()),
            Err(error) => {
                warn!("skipping {:?}: {error}", entry.path().display());
                report.failures.push(EntryFailure {
                    path: entry.path(),
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

/// Restore one ledger line to its resolved destination.
fn install_file(source_tree: &Path, template: &str) -> Result<PathBuf> {
    let dest = resolve(template).map_err(InstallError::Origin)?;
    let name = dest
        .file_name()
        .ok_or_else(|| InstallError::NoBasename(dest.clone()))?;
    let staged = source_tree.join(name);

    if let Some(parent) = dest.parent() {
        mkdirp::mkdirp(parent).map_err(InstallError::Io)?;
    }
    copy(staged, &dest).map_err(InstallError::Io)?;

    Ok(dest)
}

/// Restore one staged directory, if it carries an origin record.
fn install_dir(staged_dir: &Path) -> Result<Option<PathBuf>> {
    let Some(template) = read_dir_record(staged_dir).map_err(InstallError::Origin)? else {
        return Ok(None);
    };

    let dest = resolve(&template).map_err(InstallError::Origin)?;
    if let Some(parent) = dest.parent() {
        mkdirp::mkdirp(parent).map_err(InstallError::Io)?;
    }
    copy_dir(staged_dir, &dest).map_err(InstallError::Copy)?;

    Ok(Some(dest))
}

/// Install error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Origin metadata cannot be read or resolved.
    #[error(transparent)]
    Origin(#[from] OriginError),

    /// Recursive directory restore failed.
    #[error(transparent)]
    Copy(#[from] MirrorError),

    /// Resolved destination has no final component.
    #[error("resolved destination {0:?} has no basename")]
    NoBasename(PathBuf),

    /// Filesystem read or copy failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    #[sealed_test(env = [("HOME", "home/alice")])]
    fn ledger_line_restores_file() -> anyhow::Result<()> {
        create_dir_all("tree")?;
        write("tree/.original_path", "$HOME/.vimrc\n")?;
        write("tree/.vimrc", "set number")?;

        let report = install("tree", ".git")?;

        assert_eq!(report.installed, vec![PathBuf::from("home/alice/.vimrc")]);
        assert_eq!(read_to_string("home/alice/.vimrc")?, "set number");

        Ok(())
    }

    #[sealed_test(env = [("HOME", "home/alice")])]
    fn directory_record_restores_tree_without_record_file() -> anyhow::Result<()> {
        create_dir_all("tree/nvim/lua")?;
        write("tree/nvim/.original_path", "$HOME/.config/nvim")?;
        write("tree/nvim/init.lua", "-- init")?;
        write("tree/nvim/lua/opts.lua", "-- opts")?;

        let report = install("tree", ".git")?;

        assert_eq!(
            report.installed,
            vec![PathBuf::from("home/alice/.config/nvim")]
        );
        assert_eq!(
            read_to_string("home/alice/.config/nvim/init.lua")?,
            "-- init"
        );
        assert_eq!(
            read_to_string("home/alice/.config/nvim/lua/opts.lua")?,
            "-- opts"
        );
        assert!(!Path::new("home/alice/.config/nvim/.original_path").exists());

        Ok(())
    }

    #[sealed_test(env = [("HOME", "home/alice")])]
    fn directory_without_record_is_skipped() -> anyhow::Result<()> {
        create_dir_all("tree/mystery")?;
        write("tree/mystery/file", "contents")?;

        let report = install("tree", ".git")?;

        assert!(report.installed.is_empty());
        assert!(report.failures.is_empty());
        assert!(!Path::new("home/alice/mystery").exists());

        Ok(())
    }

    #[sealed_test(env = [("HOME", "home/alice")])]
    fn metadata_dir_is_never_installed() -> anyhow::Result<()> {
        create_dir_all("tree/.git")?;
        write("tree/.git/.original_path", "$HOME/.git-oops")?;

        let report = install("tree", ".git")?;

        assert!(report.installed.is_empty());
        assert!(!Path::new("home/alice/.git-oops").exists());

        Ok(())
    }

    #[sealed_test(env = [("HOME", "home/alice")])]
    fn one_bad_ledger_line_does_not_stop_the_rest() -> anyhow::Result<()> {
        create_dir_all("tree")?;
        // First line names a staged file that does not exist.
        write("tree/.original_path", "$HOME/.gone\n$HOME/.vimrc\n")?;
        write("tree/.vimrc", "set number")?;

        let report = install("tree", ".git")?;

        assert_eq!(report.installed, vec![PathBuf::from("home/alice/.vimrc")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("$HOME/.gone"));

        Ok(())
    }
}
