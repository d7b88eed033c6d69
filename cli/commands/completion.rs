use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use codedigest_core::AppError;
use colored::*;
use log;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::cli_args::{Cli, CompletionArgs};

pub fn handle_completion_command(args: &CompletionArgs, quiet: bool) -> Result<()> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    if !args.save {
        generate(args.shell, &mut command, bin_name, &mut io::stdout());
        return Ok(());
    }

    let (default_dir, file_name) = install_location(args.shell, &bin_name);
    let save_dir = args
        .dir
        .clone()
        .or(default_dir)
        .ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "No standard completion directory for {}; pass --dir",
                args.shell
            ))
        })?;
    let save_path = save_dir.join(file_name);

    if save_path.exists() && !args.force {
        return Err(AppError::InvalidArgument(format!(
            "{} already exists; pass --force to replace it",
            save_path.display()
        ))
        .into());
    }

    let mut script = Vec::new();
    generate(args.shell, &mut command, bin_name, &mut script);

    fs::create_dir_all(&save_dir).map_err(|e| AppError::DirCreation {
        path: save_dir.clone(),
        source: e,
    })?;
    fs::write(&save_path, script)
        .map_err(|e| AppError::FileWrite {
            path: save_path.clone(),
            source: e,
        })
        .context("Failed to save completion script")?;
    log::debug!("Wrote {} completions to {}", args.shell, save_path.display());

    if !quiet {
        println!(
            "{} completions saved to {}",
            args.shell.to_string().cyan(),
            save_path.display().to_string().blue()
        );
    }
    Ok(())
}

/// Where each shell looks for user completions, and the file name it expects.
fn install_location(shell: Shell, bin_name: &str) -> (Option<PathBuf>, String) {
    match shell {
        Shell::Fish => (
            dirs::config_dir().map(|p| p.join("fish").join("completions")),
            format!("{}.fish", bin_name),
        ),
        Shell::Bash => (
            dirs::data_local_dir().map(|p| p.join("bash-completion").join("completions")),
            bin_name.to_string(),
        ),
        Shell::Zsh => (
            dirs::data_local_dir().map(|p| p.join("zsh").join("site-functions")),
            format!("_{}", bin_name),
        ),
        Shell::Elvish => (None, format!("{}.elv", bin_name)),
        Shell::PowerShell => (None, format!("_{}.ps1", bin_name)),
        _ => (None, bin_name.to_string()),
    }
}
