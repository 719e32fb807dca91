// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT

use rehome::{
    host::{self, GitHubHost, RemoteHost},
    ignore::{add_ignore, IgnoreOutcome},
    install, mirror,
    staging::{CommitIdentity, CommitOutcome, GitProcess, PushOutcome, StagingRepository, Vcs},
    Config, PathRegistry, Registration,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use inquire::{MultiSelect, Password, Text};
use std::{path::PathBuf, process::exit, time::Duration};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(about, subcommand_help_heading = "Commands", version)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config_path = Config::default_path()?;
        let config = Config::load_or_init(&config_path)?;

        match self.command {
            Command::Init => run_init(&config, &config_path),
            Command::Add(opts) => run_add(&config, opts),
            Command::List => run_list(&config),
            Command::Remove => run_remove(&config),
            Command::Upload => run_upload(&config),
            Command::Ignore(opts) => run_ignore(&config, opts),
            Command::Install(opts) => run_install(&config, opts),
            Command::Edit => run_edit(&config_path),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Store the hosting token used for upload and repository creation.
    Init,

    /// Track a path for mirroring.
    #[command(override_usage = "rehome add <path>")]
    Add(AddOptions),

    /// List tracked paths in registration order.
    List,

    /// Select tracked paths to stop tracking.
    Remove,

    /// Mirror tracked paths into the staging tree and push to the remote.
    Upload,

    /// Ignore a sub-path of a tracked directory during upload.
    #[command(override_usage = "rehome ignore <path>")]
    Ignore(IgnoreOptions),

    /// Clone a staging tree and restore its entries to their origins.
    #[command(override_usage = "rehome install <url>")]
    Install(InstallOptions),

    /// Open the configuration file in $EDITOR.
    Edit,
}

#[derive(Parser, Clone, Debug)]
struct AddOptions {
    #[arg(value_name = "path")]
    pub path: PathBuf,
}

#[derive(Parser, Clone, Debug)]
struct IgnoreOptions {
    #[arg(value_name = "path")]
    pub path: PathBuf,
}

#[derive(Parser, Clone, Debug)]
struct InstallOptions {
    #[arg(value_name = "url")]
    pub url: String,
}

fn main() {
    let layer = fmt::layer().compact();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_init(config: &Config, config_path: &std::path::Path) -> Result<()> {
    let username = Text::new("hosting username (leave blank to use the token's login):")
        .prompt()
        .context("failed to read username")?;
    let token = Password::new("hosting token:")
        .without_confirmation()
        .prompt()
        .context("failed to read token")?;

    host::write_token(&config.storage_path, &token)?;

    if !username.trim().is_empty() {
        let mut updated = config.clone();
        updated.username = Some(username.trim().to_string());
        std::fs::write(config_path, updated.to_string())
            .context("failed to update configuration")?;
    }

    println!("Token stored under {}", config.storage_path.display());
    Ok(())
}

fn run_add(config: &Config, opts: AddOptions) -> Result<()> {
    let registry = PathRegistry::new(&config.storage_path);
    match registry.register(&opts.path)? {
        Registration::Added(path) => println!("Tracking {}", path.display()),
        Registration::AlreadyTracked(path) => println!("{} is already tracked", path.display()),
    }
    Ok(())
}

fn run_list(config: &Config) -> Result<()> {
    let registry = PathRegistry::new(&config.storage_path);
    let tracked = registry.list()?;

    if tracked.is_empty() {
        println!("No paths are currently being tracked");
        return Ok(());
    }

    println!("Currently tracked paths:");
    for path in tracked {
        println!("  {}", path.display());
    }

    Ok(())
}

fn run_remove(config: &Config) -> Result<()> {
    let registry = PathRegistry::new(&config.storage_path);
    let tracked = registry.list()?;

    if tracked.is_empty() {
        println!("No paths are currently being tracked");
        return Ok(());
    }

    let options: Vec<String> = tracked
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    let picked = MultiSelect::new("select paths to stop tracking:", options)
        .raw_prompt()
        .context("selection aborted")?;
    let indices: Vec<usize> = picked.into_iter().map(|option| option.index).collect();

    let dropped = registry.remove(&indices)?;
    for path in dropped {
        println!("Stopped tracking {}", path.display());
    }

    Ok(())
}

fn run_upload(config: &Config) -> Result<()> {
    let registry = PathRegistry::new(&config.storage_path);
    if registry.list()?.is_empty() {
        println!("No paths are currently being tracked; nothing to upload");
        return Ok(());
    }

    let token = host::read_token(&config.storage_path)?;
    let host = GitHubHost::new(token);
    let login = host.authenticate()?;
    let owner = config.username.clone().unwrap_or(login);
    let remote_exists = host.repo_exists(&owner, &config.upstream_name)?;
    let remote_url = host.clone_url(&owner, &config.upstream_name);

    let staging = StagingRepository::new(
        config.storage_path.join(&config.upstream_name),
        GitProcess,
    );
    spin_while(format!("preparing {}", config.upstream_name), || {
        staging.materialize(remote_exists, &remote_url)
    })?;

    let report = mirror::sync(&registry, staging.root(), staging.metadata_dir())?;
    for failure in &report.failures {
        warn!("failed to mirror {}: {}", failure.path.display(), failure.reason);
    }

    match staging.commit_changes(&CommitIdentity::default())? {
        CommitOutcome::UpToDate => {
            println!("Everything up-to-date");
            return Ok(());
        }
        CommitOutcome::Committed => {}
    }

    if !remote_exists {
        host.create_repo(&config.upstream_name, true)?;
        staging.bootstrap_remote(&remote_url)?;
    }

    let outcome = spin_while("pushing".to_string(), || staging.push())?;
    match outcome {
        PushOutcome::Pushed => println!(
            "Uploaded {} entr(ies) to {owner}/{}",
            report.mirrored.len(),
            config.upstream_name
        ),
        PushOutcome::UpToDate => println!("Everything up-to-date"),
    }

    if !report.failures.is_empty() {
        println!("{} entr(ies) failed to mirror; see warnings above", report.failures.len());
    }

    Ok(())
}

fn run_ignore(config: &Config, opts: IgnoreOptions) -> Result<()> {
    let abs_path = std::path::absolute(&opts.path)?;
    if !abs_path.exists() {
        bail!("path {} does not exist", abs_path.display());
    }

    let registry = PathRegistry::new(&config.storage_path);
    let tracked = registry.list()?;
    let staging_root = config.storage_path.join(&config.upstream_name);
    mkdirp::mkdirp(&staging_root)?;

    match add_ignore(&abs_path, &tracked, &staging_root)? {
        IgnoreOutcome::Added(pattern) => println!("Ignoring {pattern}"),
        IgnoreOutcome::AlreadyIgnored(pattern) => println!("{pattern} is already ignored"),
    }

    Ok(())
}

fn run_install(config: &Config, opts: InstallOptions) -> Result<()> {
    mkdirp::mkdirp(&config.storage_path)?;
    let clone_dir = tempfile::tempdir_in(&config.storage_path)
        .context("failed to create temporary clone directory")?;

    let vcs = GitProcess;
    spin_while(format!("cloning {}", opts.url), || {
        vcs.clone_repo(&opts.url, clone_dir.path())
    })?;

    let report = install::install(clone_dir.path(), vcs.metadata_dir())?;
    for path in &report.installed {
        println!("Installed {}", path.display());
    }
    for failure in &report.failures {
        warn!("failed to install {}: {}", failure.path.display(), failure.reason);
    }

    println!(
        "Installation complete: {} entr(ies) restored, {} failed",
        report.installed.len(),
        report.failures.len()
    );

    Ok(())
}

fn run_edit(config_path: &std::path::Path) -> Result<()> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = std::process::Command::new(&editor)
        .arg(config_path)
        .status()
        .with_context(|| format!("failed to launch {editor}"))?;

    if !status.success() {
        bail!("{editor} exited with failure");
    }

    Ok(())
}

/// Run a collaborator call behind a steady-tick spinner.
fn spin_while<T, E>(message: String, call: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    let result = call();
    bar.finish_and_clear();
    result
}
