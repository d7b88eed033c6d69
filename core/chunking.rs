//! Streams formatted file sections into one or more digest parts.
//!
//! Without a token budget everything lands in a single `<Project>_Digest.txt`.
//! With a budget each part is `<Project>_Digest_Part<N>.txt`; a section that
//! would push the open part over budget starts a fresh part, and a section
//! too large for any part is cut at a character offset estimated from
//! [`CHARS_PER_TOKEN`] and continued in following parts.

use crate::config::OutputFormat;
use crate::error::{AppError, Result};
use crate::output_formats::{
    TRUNCATION_MARKER, continuation_marker, format_footer, format_header,
};
use crate::tokenizer::TokenCounter;
use chrono::{DateTime, Utc};
use log;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Headroom kept free when sizing the first slice of an oversized file.
pub const SAFETY_MARGIN_TOKENS: usize = 500;
/// Below this much usable room a split starts in a fresh part instead.
pub const MIN_USABLE_TOKENS: usize = 1000;
pub const CHARS_PER_TOKEN: usize = 3;

#[derive(Debug, Clone)]
pub struct PartSettings {
    pub out_dir: PathBuf,
    pub project_name: String,
    pub file_count: usize,
    pub format: OutputFormat,
    /// 0 disables splitting.
    pub token_limit: usize,
    /// Already formatted tree block, empty when the tree is skipped.
    pub tree_block: String,
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartSummary {
    pub index: usize,
    pub path: PathBuf,
    pub tokens: usize,
    /// File sections started in this part, continuations included.
    pub sections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartOutcome {
    pub parts: Vec<PartSummary>,
    pub total_tokens: u64,
}

pub struct PartWriter<'a> {
    settings: PartSettings,
    tokenizer: &'a dyn TokenCounter,
    next_index: usize,
    writer: Option<BufWriter<File>>,
    current_part_tokens: usize,
    overhead_tokens: Option<usize>,
    total_tokens: u64,
    parts: Vec<PartSummary>,
}

impl<'a> PartWriter<'a> {
    pub fn new(settings: PartSettings, tokenizer: &'a dyn TokenCounter) -> Result<Self> {
        fs::create_dir_all(&settings.out_dir).map_err(|e| AppError::DirCreation {
            path: settings.out_dir.clone(),
            source: e,
        })?;
        Ok(Self {
            settings,
            tokenizer,
            next_index: 1,
            writer: None,
            current_part_tokens: 0,
            overhead_tokens: None,
            total_tokens: 0,
            parts: Vec::new(),
        })
    }

    fn is_split(&self) -> bool {
        self.settings.token_limit > 0
    }

    pub fn part_file_name(&self, index: usize) -> String {
        let stem = sanitize_file_stem(&self.settings.project_name);
        if self.is_split() {
            format!("{}_Digest_Part{}.txt", stem, index)
        } else {
            format!("{}_Digest.txt", stem)
        }
    }

    pub fn current_part_tokens(&self) -> usize {
        self.current_part_tokens
    }

    /// Tokens of the header plus tree block that opens a part.
    pub fn overhead_tokens(&self) -> usize {
        self.overhead_tokens.unwrap_or(0)
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn parts(&self) -> &[PartSummary] {
        &self.parts
    }

    /// Closes the open part (if any) and opens the next one with its header
    /// and tree block already written.
    pub fn start_new_part(&mut self) -> Result<()> {
        self.close_current_part();

        let index = self.next_index;
        let path = self.settings.out_dir.join(self.part_file_name(index));
        log::debug!("Opening digest part {}: {}", index, path.display());
        let file = File::create(&path).map_err(|e| AppError::FileWrite {
            path: path.clone(),
            source: e,
        })?;
        self.writer = Some(BufWriter::new(file));
        self.parts.push(PartSummary {
            index,
            path,
            tokens: 0,
            sections: 0,
        });
        self.next_index += 1;

        let mut opening = format_header(
            &self.settings.project_name,
            self.settings.file_count,
            self.is_split().then_some(index),
            self.settings.generated_at,
            self.settings.format,
        );
        opening.push_str(&self.settings.tree_block);
        self.write_str(&opening)?;

        let tokens = self.tokenizer.count_tokens(&opening);
        self.current_part_tokens = tokens;
        self.overhead_tokens.get_or_insert(tokens);
        self.sync_summary();
        Ok(())
    }

    /// Appends one formatted file section, rolling over or splitting as the
    /// budget requires. `tokens` always counts toward the run total.
    pub fn write_content(&mut self, path: &str, content: &str, tokens: usize) -> Result<()> {
        if self.writer.is_none() {
            self.start_new_part()?;
        }
        let limit = self.settings.token_limit;

        if limit == 0 || self.current_part_tokens + tokens <= limit {
            self.append_section(content, tokens)?;
        } else if tokens > limit.saturating_sub(self.overhead_tokens()) {
            log::debug!(
                "{} ({} tokens) cannot fit in any part of {} tokens, splitting",
                path,
                tokens,
                limit
            );
            self.write_large_file_split(path, content)?;
        } else {
            log::trace!("Rolling over before {} ({} tokens)", path, tokens);
            self.start_new_part()?;
            self.append_section(content, tokens)?;
        }

        self.total_tokens += tokens as u64;
        Ok(())
    }

    fn append_section(&mut self, content: &str, tokens: usize) -> Result<()> {
        self.write_str(content)?;
        self.current_part_tokens += tokens;
        if let Some(summary) = self.parts.last_mut() {
            summary.sections += 1;
        }
        self.sync_summary();
        Ok(())
    }

    fn write_large_file_split(&mut self, path: &str, content: &str) -> Result<()> {
        let limit = self.settings.token_limit;
        let usable = limit
            .saturating_sub(self.current_part_tokens)
            .saturating_sub(SAFETY_MARGIN_TOKENS);
        if usable < MIN_USABLE_TOKENS {
            self.start_new_part()?;
        }

        let mut remaining = content;
        let mut marker = String::new();
        loop {
            let char_limit = limit.saturating_sub(self.current_part_tokens) * CHARS_PER_TOKEN;
            let cut = remaining
                .char_indices()
                .nth(char_limit)
                .map(|(offset, _)| offset)
                .filter(|offset| *offset > 0);

            let Some(offset) = cut else {
                let piece = format!("{}{}", marker, remaining);
                let tokens = self.tokenizer.count_tokens(&piece);
                return self.append_section(&piece, tokens);
            };

            let (head, tail) = remaining.split_at(offset);
            let piece = format!("{}{}{}", marker, head, TRUNCATION_MARKER);
            let tokens = self.tokenizer.count_tokens(&piece);
            self.append_section(&piece, tokens)?;

            self.start_new_part()?;
            marker = continuation_marker(path);
            remaining = tail;
        }
    }

    /// Flushes and closes the open part. Safe to call repeatedly; failures
    /// are logged, never returned.
    pub fn close_current_part(&mut self) {
        let Some(mut writer) = self.writer.take() else {
            return;
        };
        let footer = format_footer(self.settings.format);
        if !footer.is_empty() {
            if let Err(e) = writer.write_all(footer.as_bytes()) {
                log::warn!("Failed to write part footer: {}", e);
            }
        }
        if let Err(e) = writer.flush() {
            log::warn!("Failed to flush digest part: {}", e);
        }
        log::trace!(
            "Closed part with {} tokens",
            self.current_part_tokens
        );
    }

    pub fn finish(mut self) -> PartOutcome {
        self.close_current_part();
        PartOutcome {
            parts: std::mem::take(&mut self.parts),
            total_tokens: self.total_tokens,
        }
    }

    fn write_str(&mut self, text: &str) -> Result<()> {
        let path = self
            .parts
            .last()
            .map(|p| p.path.clone())
            .unwrap_or_default();
        let writer = self.writer.as_mut().ok_or_else(|| AppError::FileWrite {
            path: path.clone(),
            source: std::io::Error::other("no digest part is open"),
        })?;
        writer
            .write_all(text.as_bytes())
            .map_err(|e| AppError::FileWrite { path, source: e })
    }

    fn sync_summary(&mut self) {
        if let Some(summary) = self.parts.last_mut() {
            summary.tokens = self.current_part_tokens;
        }
    }
}

impl Drop for PartWriter<'_> {
    fn drop(&mut self) {
        self.close_current_part();
    }
}

/// Replaces characters that are unsafe in file names.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        crate::config::FALLBACK_PROJECT_NAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count_tokens(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    fn settings(dir: &TempDir, token_limit: usize) -> PartSettings {
        PartSettings {
            out_dir: dir.path().join("out"),
            project_name: "demo".to_string(),
            file_count: 2,
            format: OutputFormat::Plain,
            token_limit,
            tree_block: String::new(),
            generated_at: None,
        }
    }

    #[test]
    fn unlimited_budget_writes_single_unnumbered_part() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartWriter::new(settings(&dir, 0), &WordCounter).unwrap();
        writer.start_new_part().unwrap();
        writer.write_content("a", "alpha\n", 1).unwrap();
        writer.write_content("b", "beta\n", 1).unwrap();
        let outcome = writer.finish();

        assert_eq!(outcome.parts.len(), 1);
        assert_eq!(outcome.total_tokens, 2);
        let path = &outcome.parts[0].path;
        assert!(path.ends_with("demo_Digest.txt"));
        let text = fs::read_to_string(path).unwrap();
        assert!(text.ends_with("alpha\nbeta\n"));
        assert!(!text.contains("Part:"));
    }

    #[test]
    fn rollover_opens_numbered_part_with_fresh_header() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartWriter::new(settings(&dir, 40), &WordCounter).unwrap();
        writer.start_new_part().unwrap();
        let overhead = writer.current_part_tokens();
        let section = "w ".repeat(20);
        writer.write_content("a", &section, 20).unwrap();
        writer.write_content("b", &section, 20).unwrap();
        let outcome = writer.finish();

        assert!(overhead + 20 <= 40);
        assert_eq!(outcome.parts.len(), 2);
        assert!(outcome.parts[0].path.ends_with("demo_Digest_Part1.txt"));
        assert!(outcome.parts[1].path.ends_with("demo_Digest_Part2.txt"));
        let second = fs::read_to_string(&outcome.parts[1].path).unwrap();
        assert!(second.contains("Project: demo"));
        assert!(second.contains("Part: 2"));
        assert_eq!(outcome.total_tokens, 40);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartWriter::new(settings(&dir, 0), &WordCounter).unwrap();
        writer.start_new_part().unwrap();
        writer.close_current_part();
        writer.close_current_part();
        assert_eq!(writer.parts().len(), 1);
    }

    #[test]
    fn split_cuts_on_char_boundaries() {
        let dir = TempDir::new().unwrap();
        let mut writer = PartWriter::new(settings(&dir, 2000), &WordCounter).unwrap();
        writer.start_new_part().unwrap();
        // Multi-byte characters, no whitespace: the word counter sees one token,
        // so the claimed count drives the split.
        let content = "é".repeat(20_000);
        writer.write_content("wide.txt", &content, 10_000).unwrap();
        let outcome = writer.finish();
        assert!(outcome.parts.len() >= 2);
        for part in &outcome.parts {
            assert!(fs::read_to_string(&part.path).is_ok());
        }
    }

    #[test]
    fn sanitizes_project_names_for_file_names() {
        assert_eq!(sanitize_file_stem("my/app: v2"), "my_app_ v2");
        assert_eq!(sanitize_file_stem("   "), "Project");
    }
}
