use anyhow::{Context, Result};
use codedigest_core::ProcessingState;
use codedigest_core::output_formats::ExcludePreset;
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::env;
use std::io::{self, Write};
use std::path::Path;

pub fn print_scanning() {
    eprintln!("{} Scanning project...", "🔍".cyan());
}

/// Rewrites one status line on stderr.
pub fn print_progress(current_file: &str, processed: usize, total: usize) {
    let percent = if total == 0 {
        100
    } else {
        processed * 100 / total
    };
    eprint!(
        "\r\x1b[2K{} [{:>3}%] {}/{} {}",
        "⏳".yellow(),
        percent,
        processed,
        total,
        current_file.dimmed()
    );
    let _ = io::stderr().flush();
}

pub fn finish_progress() {
    eprint!("\r\x1b[2K");
    let _ = io::stderr().flush();
}

pub fn print_run_summary(state: &ProcessingState, output_dir: &Path) {
    let ProcessingState::Success {
        parts,
        total_source_files,
        skipped_files,
        total_tokens,
        message,
        ..
    } = state
    else {
        return;
    };

    println!("{} {}", "✅".green(), message.green());
    println!(
        "{:<16} {}",
        "Files:".green(),
        total_source_files.to_string().cyan()
    );
    if *skipped_files > 0 {
        println!(
            "{:<16} {}",
            "Unreadable:".yellow(),
            skipped_files.to_string().yellow()
        );
    }
    println!(
        "{:<16} {}",
        "Total tokens:".green(),
        total_tokens.to_string().cyan()
    );
    println!(
        "{:<16} {}",
        "Saved in:".green(),
        output_dir.display().to_string().blue()
    );

    let cwd = env::current_dir().ok();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Part").fg(Color::Green),
        Cell::new("File").fg(Color::Green),
        Cell::new("Sections").fg(Color::Green),
        Cell::new("Tokens").fg(Color::Green),
    ]);
    for part in parts {
        let shown = cwd
            .as_deref()
            .and_then(|base| pathdiff::diff_paths(&part.path, base))
            .filter(|rel| !rel.starts_with(".."))
            .unwrap_or_else(|| part.path.clone());
        table.add_row(vec![
            Cell::new(part.index).set_alignment(CellAlignment::Right),
            Cell::new(shown.display()).fg(Color::Cyan),
            Cell::new(part.sections).set_alignment(CellAlignment::Right),
            Cell::new(part.tokens).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
}

pub fn print_presets_table(presets: &[ExcludePreset]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Preset").fg(Color::Green),
        Cell::new("Aliases").fg(Color::Green),
        Cell::new("Description").fg(Color::Green),
        Cell::new("Patterns").fg(Color::Green),
    ]);
    for preset in presets {
        table.add_row(vec![
            Cell::new(&preset.name).fg(Color::Cyan),
            Cell::new(preset.aliases.join(", ")).fg(Color::DarkGrey),
            Cell::new(&preset.description),
            Cell::new(preset.patterns.join("\n")),
        ]);
    }
    println!("{table}");
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(data).context("Failed to serialize JSON output")?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    handle.write_all(b"\n").context("Failed to write to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}
