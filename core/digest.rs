//! End-to-end digest runs.
//!
//! A run resolves the source root, assembles ignore rules, walks the tree,
//! then transforms, counts and writes each collected file in traversal order.
//! Callers observe it as a stream of [`ProcessingState`] values that always
//! ends in exactly one terminal `Success` or `Error`.

use crate::chunking::{PartSettings, PartSummary, PartWriter};
use crate::config::{Config, expand_path};
use crate::error::{AppError, ErrorKind, Result};
use crate::filter::ContentClassifier;
use crate::gather::gather_files_and_tree;
use crate::lister::{DirectoryLister, find_child, resolve_source_root};
use crate::output_formats::format_tree;
use crate::rules::{GITIGNORE_FILE_NAME, IgnoreRuleSet, parse_ignore_lines, read_ignore_rules};
use crate::tokenizer::{Cl100kTokenizer, DisabledTokenizer, TokenCounter};
use crate::transform::transform_and_format;
use chrono::Utc;
use log;
use serde::Serialize;
use std::any::Any;
use std::fs::File;
use std::io::BufReader;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;

/// A `Processing` event is emitted after every this many files.
pub const PROGRESS_INTERVAL: usize = 10;

const UNEXPECTED_FAILURE: &str = "Unexpected error while generating digest";

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessingState {
    #[default]
    Idle,
    Scanning,
    Processing {
        current_file: String,
        /// Fraction of collected files handled so far, in `0.0..=1.0`.
        progress: f32,
        total_files: usize,
        processed: usize,
    },
    Success {
        files: Vec<PathBuf>,
        parts: Vec<PartSummary>,
        total_source_files: usize,
        skipped_files: usize,
        total_tokens: u64,
        message: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ProcessingState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingState::Success { .. } | ProcessingState::Error { .. }
        )
    }

    fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ProcessingState::Error {
            kind,
            message: message.into(),
        }
    }

    fn from_app_error(err: &AppError) -> Self {
        Self::error(err.kind(), err.to_string())
    }
}

/// Runs digests into one output directory. Clones share the busy flag, so
/// only one run per engine (and its clones) is active at a time.
#[derive(Clone)]
pub struct DigestEngine {
    output_dir: PathBuf,
    tokenizer: Arc<dyn TokenCounter>,
    busy: Arc<AtomicBool>,
}

struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl DigestEngine {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_tokenizer(output_dir, Arc::new(Cl100kTokenizer::new()))
    }

    pub fn with_tokenizer(output_dir: impl Into<PathBuf>, tokenizer: Arc<dyn TokenCounter>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tokenizer,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.busy)))
    }

    /// Starts a run on a background thread and returns its event stream.
    pub fn process(&self, config: Config) -> Receiver<ProcessingState> {
        let (tx, rx) = mpsc::channel();

        let Some(guard) = self.try_acquire() else {
            log::debug!("Rejected digest request: a run is already active");
            let _ = tx.send(ProcessingState::from_app_error(&AppError::RunInProgress));
            return rx;
        };

        let engine = self.clone();
        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("digest-worker".to_string())
            .spawn(move || {
                let _guard = guard;
                engine.run_guarded(&config, &mut |state| {
                    // A dropped receiver means the caller stopped listening.
                    let _ = worker_tx.send(state);
                });
            });

        if let Err(e) = spawned {
            log::debug!("Failed to spawn digest worker: {}", e);
            let _ = tx.send(ProcessingState::error(ErrorKind::Internal, format!(
                "Failed to start digest worker: {}",
                e
            )));
        }
        rx
    }

    /// Runs on the calling thread, handing every state to `on_state`.
    pub fn run(&self, config: &Config, on_state: &mut dyn FnMut(ProcessingState)) {
        let Some(_guard) = self.try_acquire() else {
            on_state(ProcessingState::from_app_error(&AppError::RunInProgress));
            return;
        };
        self.run_guarded(config, on_state);
    }

    fn run_guarded(&self, config: &Config, on_state: &mut dyn FnMut(ProcessingState)) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(config, on_state)));
        let terminal = match outcome {
            Ok(Ok(success)) => success,
            Ok(Err(e)) => {
                log::debug!("Digest run failed: {}", e);
                ProcessingState::from_app_error(&e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::debug!("Digest worker panicked: {}", message);
                ProcessingState::error(ErrorKind::Internal, message)
            }
        };
        on_state(terminal);
    }

    fn execute(
        &self,
        config: &Config,
        on_state: &mut dyn FnMut(ProcessingState),
    ) -> Result<ProcessingState> {
        on_state(ProcessingState::Scanning);
        let source = config
            .general
            .source_root
            .as_deref()
            .ok_or(AppError::MissingSource)?;

        let lister = resolve_source_root(source)?;
        let root_name = lister.root_name();
        let project_name = config.effective_project_name(root_name.as_deref());
        log::info!(
            "Generating digest for '{}' ({} access)",
            project_name,
            lister.strategy()
        );

        let rules = build_ignore_rules(config, lister.as_ref())?;
        let traversal = gather_files_and_tree(
            lister.as_ref(),
            config,
            &rules,
            &ContentClassifier::new(),
            root_name.as_deref().unwrap_or(&project_name),
        )?;
        if traversal.files.is_empty() {
            return Err(AppError::NothingToDigest);
        }

        let tokenizer: &dyn TokenCounter = if config.output.count_tokens {
            self.tokenizer.as_ref()
        } else {
            if config.is_split_enabled() {
                log::warn!(
                    "Token counting is disabled; the {} token limit will never split output",
                    config.output.token_limit
                );
            }
            &DisabledTokenizer
        };

        let total_files = traversal.files.len();
        let settings = PartSettings {
            out_dir: expand_path(&self.output_dir),
            project_name: project_name.clone(),
            file_count: total_files,
            format: config.output.format,
            token_limit: config.output.token_limit,
            tree_block: format_tree(&traversal.tree, config.output.format),
            generated_at: config.output.include_timestamp.then(Utc::now),
        };
        let mut writer = PartWriter::new(settings, tokenizer)?;
        writer.start_new_part()?;

        let mut skipped = 0;
        for (index, file) in traversal.files.iter().enumerate() {
            match lister.read_to_string(&file.handle) {
                Ok(raw) => {
                    let section = transform_and_format(&file.path, &raw, config);
                    let tokens = tokenizer.count_tokens(&section);
                    log::trace!("{}: {} tokens", file.path, tokens);
                    writer.write_content(&file.path, &section, tokens)?;
                }
                Err(e) => {
                    log::warn!("Skipping unreadable file {}: {}", file.path, e);
                    skipped += 1;
                }
            }

            let processed = index + 1;
            if processed % PROGRESS_INTERVAL == 0 {
                on_state(ProcessingState::Processing {
                    current_file: file.path.clone(),
                    progress: processed as f32 / total_files as f32,
                    total_files,
                    processed,
                });
            }
        }

        let outcome = writer.finish();
        let message = format!(
            "Saved {} part(s) for {} ({} tokens)",
            outcome.parts.len(),
            project_name,
            outcome.total_tokens
        );
        log::info!("{}", message);
        Ok(ProcessingState::Success {
            files: outcome.parts.iter().map(|p| p.path.clone()).collect(),
            parts: outcome.parts,
            total_source_files: total_files,
            skipped_files: skipped,
            total_tokens: outcome.total_tokens,
            message,
        })
    }
}

/// Config patterns first, then the root `.gitignore` (when enabled), then the
/// custom ignore file. Ignore files that cannot be read contribute nothing.
pub fn build_ignore_rules(config: &Config, lister: &dyn DirectoryLister) -> Result<IgnoreRuleSet> {
    let mut patterns = config.effective_exclude_patterns()?;

    if config.filters.use_gitignore {
        match find_child(lister, &lister.root(), GITIGNORE_FILE_NAME) {
            Some(entry) if !entry.is_dir => {
                patterns.extend(read_ignore_rules(lister, &entry.handle));
            }
            _ => log::debug!("No {} at source root", GITIGNORE_FILE_NAME),
        }
    }

    if let Some(custom) = &config.filters.custom_ignore_file {
        patterns.extend(read_custom_ignore_file(custom));
    }

    log::debug!("Ignore rules assembled: {} patterns", patterns.len());
    Ok(IgnoreRuleSet::new(patterns))
}

fn read_custom_ignore_file(path: &Path) -> Vec<String> {
    let path = expand_path(path);
    match File::open(&path) {
        Ok(file) => {
            let rules = parse_ignore_lines(BufReader::new(file));
            log::debug!("Loaded {} rules from {}", rules.len(), path.display());
            rules
        }
        Err(e) => {
            log::warn!("Could not read ignore file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNEXPECTED_FAILURE.to_string()
    }
}
