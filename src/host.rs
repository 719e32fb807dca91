// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Remote hosting collaborator.
//!
//! The staging tree pushes to a repository on a hosting service. The core
//! only needs three things from that service, expressed by [`RemoteHost`]:
//! who the token belongs to, whether the upstream repository exists, and
//! the ability to create it (private) before the first push. The GitHub
//! implementation talks to the REST API with a blocking client; all core
//! operations are strictly sequential.

use serde::Deserialize;
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Name of the token file inside the storage directory.
pub const TOKEN_FILE: &str = "token";

const GITHUB_API: &str = "https://api.github.com";

/// Layer of indirection for the hosting service.
pub trait RemoteHost {
    /// Resolve the login the stored credential belongs to.
    fn authenticate(&self) -> Result<String>;

    /// Whether the named repository exists under the given owner.
    fn repo_exists(&self, owner: &str, name: &str) -> Result<bool>;

    /// Create the named repository under the authenticated account.
    fn create_repo(&self, name: &str, private: bool) -> Result<()>;
}

/// Hosting collaborator backed by the GitHub REST API.
#[derive(Debug)]
pub struct GitHubHost {
    token: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
}

impl GitHubHost {
    /// Construct host client from a personal access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Build the authenticated clone URL for a repository.
    pub fn clone_url(&self, owner: &str, name: &str) -> String {
        format!("https://{}@github.com/{owner}/{name}.git", self.token)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", concat!("rehome/", env!("CARGO_PKG_VERSION")))
    }
}

impl RemoteHost for GitHubHost {
    #[instrument(skip(self), level = "debug")]
    fn authenticate(&self) -> Result<String> {
        let response = self
            .request(reqwest::Method::GET, format!("{GITHUB_API}/user"))
            .send()
            .map_err(HostError::Http)?;

        if !response.status().is_success() {
            return Err(api_error(response));
        }

        let user: AuthenticatedUser = response.json().map_err(HostError::Http)?;
        debug!("authenticated as {}", user.login);
        Ok(user.login)
    }

    #[instrument(skip(self), level = "debug")]
    fn repo_exists(&self, owner: &str, name: &str) -> Result<bool> {
        let response = self
            .request(
                reqwest::Method::GET,
                format!("{GITHUB_API}/repos/{owner}/{name}"),
            )
            .send()
            .map_err(HostError::Http)?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            _ => Err(api_error(response)),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn create_repo(&self, name: &str, private: bool) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, format!("{GITHUB_API}/user/repos"))
            .json(&serde_json::json!({ "name": name, "private": private }))
            .send()
            .map_err(HostError::Http)?;

        if !response.status().is_success() {
            return Err(api_error(response));
        }

        Ok(())
    }
}

fn api_error(response: reqwest::blocking::Response) -> HostError {
    let status = response.status();
    let body = response.text().unwrap_or_default();
    HostError::Api { status, body }
}

/// Read the stored hosting token from the storage directory.
///
/// # Errors
///
/// - Return [`HostError::MissingToken`] if no token has been stored yet.
/// - Return [`HostError::Io`] for any other read failure.
pub fn read_token(storage_dir: impl AsRef<Path>) -> Result<String> {
    let path = storage_dir.as_ref().join(TOKEN_FILE);
    match read_to_string(&path) {
        Ok(token) => Ok(token.trim().to_string()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            Err(HostError::MissingToken(path))
        }
        Err(error) => Err(HostError::Io(error)),
    }
}

/// Persist the hosting token under the storage directory.
///
/// # Errors
///
/// - Return [`HostError::Io`] if the token cannot be written.
pub fn write_token(storage_dir: impl AsRef<Path>, token: &str) -> Result<()> {
    let storage_dir = storage_dir.as_ref();
    mkdirp::mkdirp(storage_dir).map_err(HostError::Io)?;
    write(storage_dir.join(TOKEN_FILE), token).map_err(HostError::Io)
}

/// Hosting collaborator error types.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// No token stored yet; the user must run `rehome init` first.
    #[error("no hosting token at {0:?}; run `rehome init` first")]
    MissingToken(PathBuf),

    /// Transport-level HTTP failure.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Hosting API rejected the request; its diagnostic is carried
    /// verbatim.
    #[error("hosting API returned {status}:\n{body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Token file I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = HostError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test]
    fn token_round_trips_through_storage() -> anyhow::Result<()> {
        write_token("storage", "ghp_blahblah\n")?;
        assert_eq!(read_token("storage")?, "ghp_blahblah");
        Ok(())
    }

    #[sealed_test]
    fn missing_token_names_the_expected_path() {
        let result = read_token("storage");
        assert!(matches!(result, Err(HostError::MissingToken(path)) if path.ends_with("token")));
    }

    #[test]
    fn clone_url_embeds_token_owner_and_name() {
        let host = GitHubHost::new("ghp_blahblah");
        assert_eq!(
            host.clone_url("alice", "dotfiles"),
            "https://ghp_blahblah@github.com/alice/dotfiles.git"
        );
    }
}
