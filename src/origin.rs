// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Origin metadata for staged entries.
//!
//! Every entry mirrored into the staging tree carries enough metadata to
//! later restore it to its original filesystem location, possibly on a
//! different machine belonging to a different user. The metadata is a
//! __portable template__: the absolute origin path with the current home
//! directory and user name replaced by the symbolic placeholders `$HOME`
//! and `$USER`.
//!
//! # Record Layout
//!
//! Two distinct placements, relied on by the two reconstruction paths of
//! the installer:
//!
//! - A staged __directory__ carries a single-line `.original_path` file
//!   inside itself, rewritten fresh on every mirror pass.
//! - Staged __files__ share one `.original_path` ledger at the tree root,
//!   one template per line in upload order. The ledger is rebuilt from
//!   scratch each mirror pass, so lines are never deduplicated against
//!   prior runs.

use crate::path::{home_dir, user_name};

use std::{
    fs::{read_to_string, write, OpenOptions},
    io::Write as _,
    path::{Path, PathBuf},
};
use tracing::debug;

/// File name used for both the root ledger and per-directory records.
pub const ORIGIN_FILE: &str = ".original_path";

/// Replace home-directory and user-name segments with symbolic placeholders.
///
/// Substitution order matters: the home directory is replaced before the
/// user name, otherwise the user-name substring inside the home path would
/// corrupt the template (`/home/alice` must become `$HOME`, not
/// `/home/$USER`). When home or user cannot be resolved the corresponding
/// substitution is skipped and the path is kept verbatim.
pub fn portablize(abs_path: impl AsRef<Path>) -> String {
    let mut template = abs_path.as_ref().to_string_lossy().into_owned();

    if let Ok(home) = home_dir() {
        template = template.replace(home.to_string_lossy().as_ref(), "$HOME");
    }
    if let Some(user) = user_name() {
        template = template.replace(user.as_str(), "$USER");
    }

    template
}

/// Expand a portable template back into a concrete absolute path.
///
/// Expansion happens against the *current* runtime environment, which may
/// differ from the one that produced the template. That asymmetry is the
/// point: it is how install rehomes entries onto a new machine or user.
///
/// # Errors
///
/// - Return [`OriginError::Expand`] if a placeholder names a variable that
///   is unset in the current environment.
pub fn resolve(template: &str) -> Result<PathBuf> {
    let expanded = shellexpand::env(template).map_err(OriginError::Expand)?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Write the single-line origin record inside a staged directory.
///
/// Overwrites any record already present, so every mirror pass stamps a
/// fresh template.
///
/// # Errors
///
/// - Return [`OriginError::Io`] if the record cannot be written.
pub fn write_dir_record(staged_dir: impl AsRef<Path>, template: &str) -> Result<()> {
    let record = staged_dir.as_ref().join(ORIGIN_FILE);
    debug!("stamp {:?} -> {template}", record.display());
    write(record, template).map_err(OriginError::Io)
}

/// Read the origin record of a staged directory, if one exists.
///
/// Returns [`None`] both when the record file is absent and when it is
/// blank; a directory without a usable record is never installed.
///
/// # Errors
///
/// - Return [`OriginError::Io`] for read failures other than absence.
pub fn read_dir_record(staged_dir: impl AsRef<Path>) -> Result<Option<String>> {
    let record = staged_dir.as_ref().join(ORIGIN_FILE);
    let data = match read_to_string(&record) {
        Ok(data) => data,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(OriginError::Io(error)),
    };

    let template = data.trim();
    if template.is_empty() {
        return Ok(None);
    }

    Ok(Some(template.to_string()))
}

/// Append one template line to the root ledger of the staging tree.
///
/// # Errors
///
/// - Return [`OriginError::Io`] if the ledger cannot be appended to.
pub fn append_ledger_line(staging_root: impl AsRef<Path>, template: &str) -> Result<()> {
    let ledger = staging_root.as_ref().join(ORIGIN_FILE);
    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(ledger)
        .map_err(OriginError::Io)?;
    writeln!(file, "{template}").map_err(OriginError::Io)
}

/// Read the non-blank lines of the root ledger, in upload order.
///
/// An absent ledger yields an empty listing; a tree mirrored from a
/// directory-only tracked set simply has no ledger.
///
/// # Errors
///
/// - Return [`OriginError::Io`] for read failures other than absence.
pub fn read_ledger(staging_root: impl AsRef<Path>) -> Result<Vec<String>> {
    let ledger = staging_root.as_ref().join(ORIGIN_FILE);
    let data = match read_to_string(&ledger) {
        Ok(data) => data,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(OriginError::Io(error)),
    };

    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect())
}

/// Origin metadata error types.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    /// Placeholder expansion failed against the current environment.
    #[error(transparent)]
    Expand(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Record or ledger I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = OriginError> = std::result::Result<T, E>;
