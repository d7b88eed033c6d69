//! Exclusion patterns applied to root-relative paths during traversal.
//!
//! Patterns are loose: `.` is literal, `*` matches any run of
//! characters (slashes included) and a pattern matches when it is found
//! anywhere inside the path. `build` therefore also excludes `rebuild.rs`.
//! Patterns that do not compile as regular expressions never match. An empty
//! rule set ignores nothing; `.git` directories are pruned by the traversal.

use crate::error::Result;
use crate::lister::{DirectoryLister, EntryHandle};
use log;
use regex::Regex;
use std::io::{BufRead, BufReader};

pub const GIT_DIR_NAME: &str = ".git";
pub const GITIGNORE_FILE_NAME: &str = ".gitignore";

#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    raw: Vec<String>,
    compiled: Vec<Regex>,
}

impl IgnoreRuleSet {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let raw: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let compiled = raw
            .iter()
            .filter_map(|pattern| match compile_pattern(pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    log::warn!("Ignoring invalid exclude pattern \"{}\": {}", pattern, e);
                    None
                }
            })
            .collect();
        Self { raw, compiled }
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// True when any pattern is found inside `relative_path`.
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        self.compiled.iter().any(|re| re.is_match(relative_path))
    }
}

/// One-shot form of [`IgnoreRuleSet::is_ignored`] for callers holding raw patterns.
pub fn should_ignore(relative_path: &str, patterns: &[String]) -> bool {
    IgnoreRuleSet::new(patterns.iter().cloned()).is_ignored(relative_path)
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    let translated = pattern.replace('.', "\\.").replace('*', ".*");
    Ok(Regex::new(&translated)?)
}

/// Reads ignore lines from `reader`: trimmed, blank lines and `#` comments dropped.
pub fn parse_ignore_lines<R: BufRead>(reader: R) -> Vec<String> {
    reader
        .lines()
        .map_while(|line| line.ok())
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Lines of an ignore file reached through `lister`. Unreadable files yield
/// no patterns.
pub fn read_ignore_rules(lister: &dyn DirectoryLister, handle: &EntryHandle) -> Vec<String> {
    match lister.open(handle) {
        Ok(reader) => {
            let rules = parse_ignore_lines(BufReader::new(reader));
            log::debug!("Loaded {} ignore rules from {}", rules.len(), handle);
            rules
        }
        Err(e) => {
            log::warn!("Could not read ignore file {}: {}", handle, e);
            Vec::new()
        }
    }
}
