// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevant path information for the storage directory, the
//! configuration file, and the identity of the user running the tool.

use std::env;
use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// Read straight from the runtime environment so that the value tracks
/// whatever environment performs the call, not whatever was recorded in
/// configuration. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if `$HOME` is unset.
pub fn home_dir() -> Result<PathBuf> {
    env::var_os("HOME").map(PathBuf::from).ok_or(NoWayHome)
}

/// Determine name of the user running the current process.
///
/// Read from `$USER` in the runtime environment. Returns [`None`] when the
/// variable is unset; callers treat that as "no substitution possible"
/// rather than an error.
pub fn user_name() -> Option<String> {
    env::var("USER").ok().filter(|name| !name.is_empty())
}

/// Determine default absolute path to the storage directory.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/rehome` as the default
/// location for the tracked-path list, the hosting token, and the staging
/// tree. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_storage_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("rehome"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to the configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/rehome/config.toml`.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("rehome").join("config.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn home_dir_reads_environment() -> anyhow::Result<()> {
        assert_eq!(home_dir()?, PathBuf::from("/home/blah"));
        Ok(())
    }

    #[sealed_test]
    fn home_dir_fails_without_home() {
        std::env::remove_var("HOME");
        assert!(home_dir().is_err());
    }

    #[sealed_test(env = [("USER", "blah")])]
    fn user_name_reads_environment() {
        assert_eq!(user_name(), Some("blah".to_string()));
    }

    #[sealed_test(env = [("USER", "")])]
    fn user_name_ignores_empty_value() {
        assert_eq!(user_name(), None);
    }
}
