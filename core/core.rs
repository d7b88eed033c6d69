pub mod chunking;
pub mod config;
pub mod digest;
pub mod error;
pub mod filter;
pub mod gather;
pub mod lister;
pub mod output_formats;
pub mod rules;
pub mod tokenizer;
pub mod transform;

pub use chunking::{PartOutcome, PartSettings, PartSummary, PartWriter};
pub use config::{Config, OutputFormat, parse_file_size_kb, parse_token_limit};
pub use digest::{DigestEngine, ProcessingState};
pub use error::{AppError, ErrorKind, Result};
pub use filter::ContentClassifier;
pub use gather::{FileEntry, Traversal, TreeRenderer, gather_files_and_tree};
pub use lister::{
    DirectoryLister, EntryHandle, FsLister, Snapshot, SnapshotFile, SnapshotLister,
    resolve_source_root,
};
pub use output_formats::{ExcludePreset, find_exclude_preset, get_exclude_presets};
pub use rules::{IgnoreRuleSet, should_ignore};
pub use tokenizer::{Cl100kTokenizer, DisabledTokenizer, TokenCounter};
