mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use codedigest_core::config::{parse_file_size_kb, parse_token_limit};
use codedigest_core::{AppError, Config, ErrorKind};
use colored::*;
use log;
use std::path::{Path, PathBuf};
use std::process;

use cli_args::{Cli, Commands, GenerateArgs};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = e
                .downcast_ref::<AppError>()
                .map(|err| exit_code_for(err.kind()))
                .unwrap_or(1);

            if !quiet || exit_code == 1 || exit_code == 5 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }

            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Config => 1,
        ErrorKind::Io => 2,
        ErrorKind::Empty => 3,
        ErrorKind::Argument => 5,
        ErrorKind::Busy | ErrorKind::Internal => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Generate(args) => {
                log::debug!("Executing 'generate' command...");
                commands::generate::handle_generate_command(args, quiet)?;
            }
            Commands::Presets(args) => {
                log::debug!("Executing 'presets' command...");
                commands::presets::handle_presets_command(&args)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
        },
    }
    Ok(())
}

fn merge_config_with_cli_overrides(mut config: Config, args: &GenerateArgs) -> Result<Config> {
    log::trace!("Applying generate command CLI overrides to config...");

    if let Some(name) = &args.project_config.project_name {
        config.general.project_name = Some(name.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.general.output_dir = Some(dir.clone());
    }

    if let Some(format) = &args.format {
        config.output.format = format.parse()?;
    }
    if let Some(limit) = &args.token_limit {
        config.output.token_limit = parse_token_limit(limit)?;
    }
    if args.no_token_count {
        config.output.count_tokens = false;
    }
    if args.skip_tree {
        config.output.skip_tree = true;
    }
    if args.timestamp {
        config.output.include_timestamp = true;
    }

    if args.remove_comments {
        config.transform.remove_comments = true;
    }
    if args.compact {
        config.transform.compact_mode = true;
    }

    config
        .filters
        .exclude
        .extend(args.filters.exclude.iter().cloned());
    config
        .filters
        .presets
        .extend(args.filters.presets.iter().cloned());
    if args.filters.no_gitignore {
        config.filters.use_gitignore = false;
    }
    if let Some(file) = &args.filters.ignore_file {
        config.filters.custom_ignore_file = Some(file.clone());
    }
    if let Some(size) = &args.filters.max_file_size {
        config.filters.max_file_size_kb = parse_file_size_kb(size)?;
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    Ok(config)
}

/// File config (when found) with `generate` flags layered on top. The
/// source root is always set, so the engine never sees an empty one.
pub fn load_config_for_command(project_root: &Path, args: &GenerateArgs) -> Result<Config> {
    let config_dir = if project_root.is_dir() {
        project_root.to_path_buf()
    } else {
        project_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };
    let config_path = Config::resolve_config_path(
        &config_dir,
        args.project_config.config.as_deref(),
        args.project_config.no_config,
    )
    .context("Failed to resolve configuration path")?;

    let mut config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    config = merge_config_with_cli_overrides(config, args)?;
    if args.root.is_some() || config.general.source_root.is_none() {
        config.general.source_root = Some(project_root.to_path_buf());
    }
    Ok(config)
}
