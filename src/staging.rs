// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Staging repository lifecycle.
//!
//! The staging tree is synchronized with the remote through an opaque VCS
//! collaborator, reached over the [`Vcs`] trait and implemented by spawning
//! the `git` binary. This module owns three guarantees independent of the
//! collaborator's own behavior:
//!
//! - __Idempotent no-op detection__: a clean working tree after staging
//!   means no commit is created and no push is attempted.
//! - __Deterministic authorship__: every commit is attributed to a fixed
//!   synthetic identity, never the operator's personal one, so history is
//!   self-consistent across machines.
//! - __First-push bootstrap__: before the first push to a freshly created
//!   remote, the local branch is normalized to one well-known name and the
//!   remote is wired up.
//!
//! Collaborator failures are fatal and carry the collaborator's raw
//! diagnostic text; a push that reports "Everything up-to-date" is a
//! success, not an error.

use chrono::Local;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Name of the metadata directory the VCS collaborator owns inside the
/// staging tree. The mirror reset must never delete it.
pub const METADATA_DIR: &str = ".git";

/// The single well-known branch name every staging repository pushes to.
pub const DEFAULT_BRANCH: &str = "main";

/// Synthetic commit identity applied to author and committer alike.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitIdentity {
    fn default() -> Self {
        Self {
            name: "rehome".into(),
            email: "rehome@localhost".into(),
        }
    }
}

/// Outcome of a push attempt that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// New commits landed on the remote.
    Pushed,

    /// Remote already had everything; treated as success.
    UpToDate,
}

/// Outcome of staging and committing the mirrored tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A commit was created and a push is warranted.
    Committed,

    /// Zero net changes versus the last committed state; nothing to do.
    UpToDate,
}

/// Layer of indirection for the version-control collaborator.
pub trait Vcs {
    /// Name of the metadata directory the collaborator keeps inside a
    /// working tree.
    fn metadata_dir(&self) -> &'static str;

    /// Clone a remote repository into a local directory.
    fn clone_repo(&self, url: &str, dir: &Path) -> Result<()>;

    /// Initialize a fresh repository at a local directory.
    fn init(&self, dir: &Path) -> Result<()>;

    /// Stage every change in the working tree.
    fn stage_all(&self, dir: &Path) -> Result<()>;

    /// Whether the working tree shows zero net changes after staging.
    fn status_is_clean(&self, dir: &Path) -> Result<bool>;

    /// Record staged changes as a commit attributed to `identity`.
    fn commit(&self, dir: &Path, message: &str, identity: &CommitIdentity) -> Result<()>;

    /// Force the current branch to carry the given name.
    fn set_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Register the remote the repository pushes to.
    fn add_remote(&self, dir: &Path, url: &str) -> Result<()>;

    /// Push the given branch, setting its upstream.
    fn push(&self, dir: &Path, branch: &str) -> Result<PushOutcome>;
}

/// Staging repository wrapping a VCS collaborator.
#[derive(Debug)]
pub struct StagingRepository<V = GitProcess>
where
    V: Vcs,
{
    root: PathBuf,
    vcs: V,
}

impl<V> StagingRepository<V>
where
    V: Vcs,
{
    /// Construct staging repository rooted at target directory.
    pub fn new(root: impl Into<PathBuf>, vcs: V) -> Self {
        Self {
            root: root.into(),
            vcs,
        }
    }

    /// Root of the staging working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the collaborator's metadata directory.
    pub fn metadata_dir(&self) -> &'static str {
        self.vcs.metadata_dir()
    }

    /// Ensure the local working tree exists.
    ///
    /// An existing tree is reused as-is; the mirror reset makes its content
    /// irrelevant. Otherwise the tree is cloned when the remote already
    /// exists, or initialized fresh when it does not.
    ///
    /// # Errors
    ///
    /// - Return [`StagingError::Vcs`] if clone or init fail.
    /// - Return [`StagingError::Io`] if the tree directory cannot be made.
    #[instrument(skip(self, remote_url), level = "debug")]
    pub fn materialize(&self, remote_exists: bool, remote_url: &str) -> Result<(), StagingError> {
        if self.root.exists() {
            debug!("reusing staging tree at {:?}", self.root.display());
            return Ok(());
        }

        if remote_exists {
            info!("cloning remote into {:?}", self.root.display());
            self.vcs.clone_repo(remote_url, &self.root)?;
        } else {
            info!("initializing fresh staging tree at {:?}", self.root.display());
            mkdirp::mkdirp(&self.root).map_err(StagingError::Io)?;
            self.vcs.init(&self.root)?;
        }

        Ok(())
    }

    /// Stage all changes and commit them under the synthetic identity.
    ///
    /// When the tree shows zero net changes versus the last committed
    /// state, no commit is created and [`CommitOutcome::UpToDate`] is
    /// returned; the caller must then skip the push as well.
    ///
    /// # Errors
    ///
    /// - Return [`StagingError::Vcs`] if staging, status, or commit fail.
    #[instrument(skip(self, identity), level = "debug")]
    pub fn commit_changes(&self, identity: &CommitIdentity) -> Result<CommitOutcome, StagingError> {
        self.vcs.stage_all(&self.root)?;

        if self.vcs.status_is_clean(&self.root)? {
            info!("staging tree unchanged, nothing to commit");
            return Ok(CommitOutcome::UpToDate);
        }

        let message = format!(
            "automatic update {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.vcs.commit(&self.root, &message, identity)?;
        info!("committed: {message}");

        Ok(CommitOutcome::Committed)
    }

    /// Wire up a freshly created remote before the first push.
    ///
    /// Registers the remote and normalizes the local branch to
    /// [`DEFAULT_BRANCH`], in that order.
    ///
    /// # Errors
    ///
    /// - Return [`StagingError::Vcs`] if either collaborator call fails.
    pub fn bootstrap_remote(&self, remote_url: &str) -> Result<(), StagingError> {
        self.vcs.add_remote(&self.root, remote_url)?;
        self.vcs.set_branch(&self.root, DEFAULT_BRANCH)?;
        Ok(())
    }

    /// Push [`DEFAULT_BRANCH`] to the remote.
    ///
    /// # Errors
    ///
    /// - Return [`StagingError::Vcs`] on any push failure that is not the
    ///   collaborator reporting "nothing to push".
    pub fn push(&self) -> Result<PushOutcome, StagingError> {
        Ok(self.vcs.push(&self.root, DEFAULT_BRANCH)?)
    }
}

/// VCS collaborator reached by spawning the `git` binary.
#[derive(Debug, Default)]
pub struct GitProcess;

impl Vcs for GitProcess {
    fn metadata_dir(&self) -> &'static str {
        METADATA_DIR
    }

    fn clone_repo(&self, url: &str, dir: &Path) -> Result<()> {
        let dir = dir.to_string_lossy();
        gitcall(["clone", url, dir.as_ref()])?;
        Ok(())
    }

    fn init(&self, dir: &Path) -> Result<()> {
        gitcall_in(dir, ["init"])?;
        Ok(())
    }

    fn stage_all(&self, dir: &Path) -> Result<()> {
        gitcall_in(dir, ["add", "."])?;
        Ok(())
    }

    fn status_is_clean(&self, dir: &Path) -> Result<bool> {
        let output = gitcall_in(dir, ["status", "--porcelain"])?;
        Ok(output.is_empty())
    }

    fn commit(&self, dir: &Path, message: &str, identity: &CommitIdentity) -> Result<()> {
        // "-c" config covers both author and committer in one stroke.
        let name = format!("user.name={}", identity.name);
        let email = format!("user.email={}", identity.email);
        gitcall_in(
            dir,
            ["-c", name.as_str(), "-c", email.as_str(), "commit", "-m", message],
        )?;
        Ok(())
    }

    fn set_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        gitcall_in(dir, ["branch", "-M", branch])?;
        Ok(())
    }

    fn add_remote(&self, dir: &Path, url: &str) -> Result<()> {
        gitcall_in(dir, ["remote", "add", "origin", url])?;
        Ok(())
    }

    fn push(&self, dir: &Path, branch: &str) -> Result<PushOutcome> {
        match gitcall_in(dir, ["push", "--set-upstream", "origin", branch]) {
            Ok(output) if output.contains("Everything up-to-date") => Ok(PushOutcome::UpToDate),
            Ok(_) => Ok(PushOutcome::Pushed),
            // A racing sync may have landed the same content already; the
            // collaborator still reports it on stderr with a failure code.
            Err(VcsError::Failed { output, .. }) if output.contains("Everything up-to-date") => {
                Ok(PushOutcome::UpToDate)
            }
            Err(error) => Err(error),
        }
    }
}

/// Run git in the given working tree, returning combined output.
fn gitcall_in(dir: &Path, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<String> {
    let mut full_args: Vec<std::ffi::OsString> = vec!["-C".into(), dir.as_os_str().to_owned()];
    full_args.extend(args.into_iter().map(|arg| arg.as_ref().to_owned()));
    gitcall(full_args)
}

/// Run git with the given arguments, returning combined output.
///
/// Stdout and stderr are captured together so that failure diagnostics can
/// be surfaced verbatim, the way the collaborator printed them.
fn gitcall(args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<String> {
    let args: Vec<std::ffi::OsString> = args
        .into_iter()
        .map(|arg| arg.as_ref().to_owned())
        .collect();
    debug!("git {:?}", args);

    let output = Command::new("git")
        .args(&args)
        .output()
        .map_err(VcsError::Spawn)?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();
    message.push_str(stdout.as_str());
    message.push_str(stderr.as_str());

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(VcsError::Failed {
            command: format!("git {}", args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")),
            output: message,
        });
    }

    Ok(message)
}

/// VCS collaborator error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Collaborator exited with failure; its combined output is carried
    /// verbatim.
    #[error("{command} failed:\n{output}")]
    Failed { command: String, output: String },

    /// Collaborator binary could not be spawned.
    #[error(transparent)]
    Spawn(#[from] std::io::Error),
}

/// Staging repository error types.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Collaborator call failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// Staging tree directory could not be created.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = VcsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// Recording fake collaborator for lifecycle tests.
    #[derive(Debug, Default)]
    struct FakeVcs {
        clean: bool,
        push_up_to_date: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeVcs {
        fn record(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl Vcs for FakeVcs {
        fn metadata_dir(&self) -> &'static str {
            ".git"
        }

        fn clone_repo(&self, url: &str, _dir: &Path) -> Result<()> {
            self.record(format!("clone {url}"));
            Ok(())
        }

        fn init(&self, _dir: &Path) -> Result<()> {
            self.record("init");
            Ok(())
        }

        fn stage_all(&self, _dir: &Path) -> Result<()> {
            self.record("stage_all");
            Ok(())
        }

        fn status_is_clean(&self, _dir: &Path) -> Result<bool> {
            self.record("status");
            Ok(self.clean)
        }

        fn commit(&self, _dir: &Path, _message: &str, identity: &CommitIdentity) -> Result<()> {
            self.record(format!("commit as {} <{}>", identity.name, identity.email));
            Ok(())
        }

        fn set_branch(&self, _dir: &Path, branch: &str) -> Result<()> {
            self.record(format!("set_branch {branch}"));
            Ok(())
        }

        fn add_remote(&self, _dir: &Path, url: &str) -> Result<()> {
            self.record(format!("add_remote {url}"));
            Ok(())
        }

        fn push(&self, _dir: &Path, branch: &str) -> Result<PushOutcome> {
            self.record(format!("push {branch}"));
            if self.push_up_to_date {
                Ok(PushOutcome::UpToDate)
            } else {
                Ok(PushOutcome::Pushed)
            }
        }
    }

    #[test]
    fn clean_tree_commits_nothing() -> anyhow::Result<()> {
        let staging = StagingRepository::new(
            "staging",
            FakeVcs {
                clean: true,
                ..FakeVcs::default()
            },
        );

        let outcome = staging.commit_changes(&CommitIdentity::default())?;

        assert_eq!(outcome, CommitOutcome::UpToDate);
        assert_eq!(staging.vcs.calls(), vec!["stage_all", "status"]);

        Ok(())
    }

    #[test]
    fn dirty_tree_commits_with_synthetic_identity() -> anyhow::Result<()> {
        let staging = StagingRepository::new("staging", FakeVcs::default());

        let outcome = staging.commit_changes(&CommitIdentity::default())?;

        assert_eq!(outcome, CommitOutcome::Committed);
        assert_eq!(
            staging.vcs.calls(),
            vec![
                "stage_all",
                "status",
                "commit as rehome <rehome@localhost>"
            ]
        );

        Ok(())
    }

    #[test]
    fn bootstrap_wires_remote_then_normalizes_branch() -> anyhow::Result<()> {
        let staging = StagingRepository::new("staging", FakeVcs::default());

        staging.bootstrap_remote("https://example.org/dotfiles.git")?;

        assert_eq!(
            staging.vcs.calls(),
            vec![
                "add_remote https://example.org/dotfiles.git",
                "set_branch main"
            ]
        );

        Ok(())
    }

    #[test]
    fn up_to_date_push_is_success() -> anyhow::Result<()> {
        let staging = StagingRepository::new(
            "staging",
            FakeVcs {
                push_up_to_date: true,
                ..FakeVcs::default()
            },
        );

        assert_eq!(staging.push()?, PushOutcome::UpToDate);

        Ok(())
    }
}
