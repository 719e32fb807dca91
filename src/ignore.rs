// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Repository-relative ignore patterns.
//!
//! A tracked directory may contain sub-paths the user never wants uploaded
//! (build output, caches). Those are recorded as repository-relative
//! patterns in the ignore file at the staging root, where the VCS
//! collaborator's own ignore mechanism consumes them.

use std::{
    fs::{read_to_string, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::info;

/// Name of the ignore file at the staging root.
pub const IGNORE_FILE: &str = ".gitignore";

/// Outcome of an ignore-pattern append.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoreOutcome {
    /// Pattern was appended to the ignore file.
    Added(String),

    /// Exact pattern line already present; file left untouched.
    AlreadyIgnored(String),
}

/// Append the ignore pattern for a path inside a tracked directory.
///
/// Among all tracked paths, the longest one that is an ancestor of
/// `abs_path` anchors the pattern: the pattern is the ancestor's basename
/// joined with the path relative to the ancestor, which is exactly where
/// the mirror pass stages that content. The append is skipped when the
/// identical line already exists.
///
/// # Errors
///
/// - Return [`IgnoreError::NotTracked`] if no tracked path is an ancestor
///   of `abs_path`.
/// - Return [`IgnoreError::NoBasename`] if the matched ancestor has no
///   final component.
/// - Return [`IgnoreError::Io`] if the ignore file cannot be read or
///   appended to.
pub fn add_ignore(
    abs_path: impl AsRef<Path>,
    tracked: &[PathBuf],
    staging_root: impl AsRef<Path>,
) -> Result<IgnoreOutcome> {
    let abs_path = abs_path.as_ref();

    let ancestor = tracked
        .iter()
        .filter(|candidate| abs_path.starts_with(candidate))
        .max_by_key(|candidate| candidate.as_os_str().len())
        .ok_or_else(|| IgnoreError::NotTracked(abs_path.to_path_buf()))?;

    let name = ancestor
        .file_name()
        .ok_or_else(|| IgnoreError::NoBasename(ancestor.clone()))?;
    let rel = abs_path
        .strip_prefix(ancestor)
        .expect("ancestor is a verified prefix");
    let pattern = PathBuf::from(name)
        .join(rel)
        .to_string_lossy()
        .into_owned();

    let ignore_file = staging_root.as_ref().join(IGNORE_FILE);
    let existing = match read_to_string(&ignore_file) {
        Ok(data) => data,
        Err(error) if error.kind() == ErrorKind::NotFound => String::new(),
        Err(error) => return Err(IgnoreError::Io(error)),
    };

    if existing.lines().any(|line| line.trim() == pattern) {
        return Ok(IgnoreOutcome::AlreadyIgnored(pattern));
    }

    let mut file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&ignore_file)
        .map_err(IgnoreError::Io)?;
    writeln!(file, "{pattern}").map_err(IgnoreError::Io)?;

    info!("ignoring {pattern}");
    Ok(IgnoreOutcome::Added(pattern))
}

/// Ignore-list error types.
#[derive(Debug, thiserror::Error)]
pub enum IgnoreError {
    /// Target path has no tracked ancestor.
    #[error("path {0:?} is not inside any tracked path")]
    NotTracked(PathBuf),

    /// Matched tracked ancestor has no final component.
    #[error("tracked path {0:?} has no basename")]
    NoBasename(PathBuf),

    /// Ignore file cannot be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = IgnoreError> = std::result::Result<T, E>;
