// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the configuration file that rehome uses. The
//! configuration is a plain statically-typed struct with a fixed field
//! list; it is constructed once in `main` and passed explicitly into every
//! entry point that needs it. There is no process-wide configuration state.

use crate::path::{default_config_file, default_storage_dir};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::info;

/// Tool configuration.
///
/// Controls where persisted state lives and what the remote repository is
/// called. Missing files are replaced with defaults on first load, so a
/// fresh machine needs no manual setup beyond `rehome init`.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory holding the tracked-path list, hosting token, and the
    /// staging tree.
    pub storage_path: PathBuf,

    /// Name of the remote repository the staging tree synchronizes with.
    pub upstream_name: String,

    /// Optional override for the remote repository owner. When unset the
    /// authenticated login is used.
    pub username: Option<String>,
}

impl Config {
    /// Load configuration from target path, creating it with defaults when
    /// it does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if defaults cannot be computed.
    /// - Return [`ConfigError::Io`] if the file cannot be read or written.
    /// - Return [`ConfigError::Deserialize`] if the file cannot be parsed.
    pub fn load_or_init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("no configuration at {:?}, writing defaults", path.display());
            let config = Self::try_default()?;
            if let Some(parent) = path.parent() {
                mkdirp::mkdirp(parent).map_err(ConfigError::Io)?;
            }
            write(path, config.to_string()).map_err(ConfigError::Io)?;
            return Ok(config);
        }

        read_to_string(path).map_err(ConfigError::Io)?.parse()
    }

    /// Construct configuration with default values.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if the XDG data directory cannot
    ///   be determined.
    pub fn try_default() -> Result<Self> {
        Ok(Self {
            storage_path: default_storage_dir()?,
            upstream_name: "dotfiles".into(),
            username: None,
        })
    }

    /// Default location of the configuration file itself.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if the XDG config directory
    ///   cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        Ok(default_config_file()?)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on storage path field.
        config.storage_path = PathBuf::from(
            shellexpand::full(config.storage_path.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to read or write the configuration file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Failed to determine default paths.
    #[error(transparent)]
    NoWayHome(#[from] crate::path::NoWayHome),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah/.local/share/rehome")])]
    fn deserialize_config() -> anyhow::Result<()> {
        let result: Config = r#"
            storage_path = "$BLAH"
            upstream_name = "dotfiles"
            username = "blah"
        "#
        .parse()?;

        let expect = Config {
            storage_path: PathBuf::from("/home/blah/.local/share/rehome"),
            upstream_name: "dotfiles".into(),
            username: Some("blah".into()),
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_config() {
        let result = Config {
            storage_path: PathBuf::from("/home/blah/.local/share/rehome"),
            upstream_name: "dotfiles".into(),
            username: None,
        }
        .to_string();

        let expect = indoc! {r#"
            storage_path = "/home/blah/.local/share/rehome"
            upstream_name = "dotfiles"
        "#};

        assert_eq!(result, expect);
    }

    #[sealed_test(env = [("HOME", "/home/blah"), ("XDG_DATA_HOME", "/home/blah/.local/share"), ("XDG_CONFIG_HOME", "/home/blah/.config")])]
    fn load_or_init_creates_default_file() -> anyhow::Result<()> {
        let path = PathBuf::from("config/config.toml");
        let config = Config::load_or_init(&path)?;

        assert!(path.exists());
        assert_eq!(config.upstream_name, "dotfiles");
        assert_eq!(
            config.storage_path,
            PathBuf::from("/home/blah/.local/share/rehome")
        );

        Ok(())
    }
}
