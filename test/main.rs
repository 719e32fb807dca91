// SPDX-FileCopyrightText: 2025 rehome contributors
// SPDX-License-Identifier: MIT


use std::fs::{create_dir_all, write};
use std::path::Path;

/// Scaffold a small dotfile layout under `home`: one tracked file and one
/// tracked configuration directory with a nested file.
pub(crate) fn scaffold_dotfiles(home: impl AsRef<Path>) -> anyhow::Result<()> {
    let home = home.as_ref();
    write_file(home.join(".vimrc"), "set number")?;
    write_file(home.join(".config/nvim/init.lua"), "-- init")?;
    write_file(home.join(".config/nvim/lua/opts.lua"), "-- opts")?;
    Ok(())
}

/// Write a file, creating its parent directories first.
pub(crate) fn write_file(path: impl AsRef<Path>, contents: &str) -> anyhow::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    write(path, contents)?;
    Ok(())
}
