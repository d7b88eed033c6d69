use crate::cli_args::GenerateArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use codedigest_core::config::{DEFAULT_OUTPUT_DIR_NAME, expand_path};
use codedigest_core::{AppError, Config, DigestEngine, ProcessingState};
use log;
use std::env;
use std::path::PathBuf;

pub fn handle_generate_command(args: GenerateArgs, quiet: bool) -> Result<()> {
    let project_root = match &args.root {
        Some(root) => expand_path(root),
        None => env::current_dir().context("Failed to determine current directory")?,
    };
    log::info!("Project root: {}", project_root.display());

    let config =
        load_config_for_command(&project_root, &args).context("Failed to load configuration")?;
    let output_dir = resolve_output_dir(&config)?;
    log::debug!("Digest output directory: {}", output_dir.display());

    let engine = DigestEngine::new(&output_dir);
    let events = engine.process(config);
    let show_progress = !quiet && !args.json;

    for state in events {
        match state {
            ProcessingState::Idle => {}
            ProcessingState::Scanning => {
                if show_progress {
                    output::print_scanning();
                }
            }
            ProcessingState::Processing {
                current_file,
                processed,
                total_files,
                ..
            } => {
                if show_progress {
                    output::print_progress(&current_file, processed, total_files);
                }
            }
            ProcessingState::Success { .. } => {
                if show_progress {
                    output::finish_progress();
                }
                if args.json {
                    output::print_json(&state)?;
                } else if !quiet {
                    output::print_run_summary(&state, &output_dir);
                }
                return Ok(());
            }
            ProcessingState::Error { kind, message } => {
                if show_progress {
                    output::finish_progress();
                }
                return Err(AppError::RunFailed { kind, message })
                    .context("Digest generation failed");
            }
        }
    }

    anyhow::bail!("Digest worker stopped without reporting a result")
}

/// `[general].output_dir` (relative to the working directory), else
/// `<Documents>/CodeDigest`, `<home>/CodeDigest`, `./CodeDigest`.
fn resolve_output_dir(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.general.output_dir {
        let dir = expand_path(dir);
        return if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(env::current_dir()
                .context("Failed to determine current directory")?
                .join(dir))
        };
    }
    let base = dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(base.join(DEFAULT_OUTPUT_DIR_NAME))
}
