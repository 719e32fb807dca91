// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

//! Track dotfiles, mirror them into a staging tree, and sync with a remote.
//!
//! rehome keeps a flat registry of absolute paths the user wants backed up.
//! An upload pass mirrors every tracked path into a staging working tree,
//! stamping each staged entry with a __portable origin template__ (`$HOME`
//! and `$USER` placeholders), and hands the tree to a version-control
//! collaborator for commit and push. An install pass reverses the process
//! on any machine: clone the tree, read the origin metadata, and restore
//! every entry to wherever the templates resolve in the local environment.
//!
//! # Module Map
//!
//! - [`registry`]: the persisted tracked-path list, source of truth.
//! - [`origin`]: portable templates, per-directory records, root ledger.
//! - [`mirror`]: destructive-reset mirror pass into the staging tree.
//! - [`staging`]: staging repository lifecycle over the [`staging::Vcs`]
//!   collaborator.
//! - [`install`]: reconstruction of original locations.
//! - [`ignore`]: repository-relative ignore patterns.
//! - [`host`]: hosting-service collaborator (GitHub implementation).
//! - [`config`], [`path`]: configuration and path resolution.

pub mod config;
pub mod host;
pub mod ignore;
pub mod install;
pub mod mirror;
pub mod origin;
pub mod path;
pub mod registry;
pub mod staging;

pub use config::Config;
pub use host::{GitHubHost, RemoteHost};
pub use ignore::IgnoreOutcome;
pub use install::InstallReport;
pub use mirror::MirrorReport;
pub use registry::{PathRegistry, Registration};
pub use staging::{
    CommitIdentity, CommitOutcome, GitProcess, PushOutcome, StagingRepository, Vcs,
};
