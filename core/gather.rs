use crate::config::Config;
use crate::error::Result;
use crate::filter::ContentClassifier;
use crate::lister::{DirectoryLister, EntryHandle, ListedEntry};
use crate::rules::{GIT_DIR_NAME, IgnoreRuleSet};
use log;

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE_PREFIX: &str = "│   ";
const SPACE_PREFIX: &str = "    ";

/// A file selected for content inclusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Root-relative, `/`-separated.
    pub path: String,
    pub name: String,
    pub handle: EntryHandle,
    pub size_kb: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Traversal {
    pub files: Vec<FileEntry>,
    /// Empty when tree output is skipped.
    pub tree: String,
    pub oversized: usize,
    pub content_excluded: usize,
}

/// Accumulates the box-drawing tree while the traversal runs.
#[derive(Debug, Clone)]
pub struct TreeRenderer {
    enabled: bool,
    text: String,
}

impl TreeRenderer {
    pub fn new(root_name: &str, enabled: bool) -> Self {
        let text = if enabled {
            format!("{}\n", root_name)
        } else {
            String::new()
        };
        Self { enabled, text }
    }

    pub fn push_entry(&mut self, prefix: &str, name: &str, is_last: bool) {
        if !self.enabled {
            return;
        }
        self.text.push_str(prefix);
        self.text
            .push_str(if is_last { LAST_BRANCH } else { BRANCH });
        self.text.push_str(name);
        self.text.push('\n');
    }

    pub fn child_prefix(prefix: &str, is_last: bool) -> String {
        format!("{}{}", prefix, if is_last { SPACE_PREFIX } else { PIPE_PREFIX })
    }

    pub fn finish(self) -> String {
        self.text
    }
}

struct Walker<'a> {
    lister: &'a dyn DirectoryLister,
    config: &'a Config,
    rules: &'a IgnoreRuleSet,
    classifier: &'a ContentClassifier,
    tree: TreeRenderer,
    result: Traversal,
}

/// Depth-first walk from the lister's root. Children are visited in
/// case-insensitive name order; ignored entries are pruned before they are
/// rendered or descended into. Files over the size limit or with excluded
/// content still appear in the tree.
pub fn gather_files_and_tree(
    lister: &dyn DirectoryLister,
    config: &Config,
    rules: &IgnoreRuleSet,
    classifier: &ContentClassifier,
    root_name: &str,
) -> Result<Traversal> {
    log::debug!(
        "Starting {} traversal (tree: {}, {} ignore patterns)",
        lister.strategy(),
        !config.output.skip_tree,
        rules.patterns().len()
    );
    let mut walker = Walker {
        lister,
        config,
        rules,
        classifier,
        tree: TreeRenderer::new(root_name, !config.output.skip_tree),
        result: Traversal::default(),
    };

    let root_entries = lister.list(&lister.root())?;
    walker.walk_entries(root_entries, "", "");

    let Walker {
        tree, mut result, ..
    } = walker;
    result.tree = tree.finish();
    log::info!(
        "Traversal complete: {} files collected, {} over size limit, {} content-excluded",
        result.files.len(),
        result.oversized,
        result.content_excluded
    );
    Ok(result)
}

impl Walker<'_> {
    fn walk_dir(&mut self, dir: &EntryHandle, prefix: &str, relative_dir: &str) {
        match self.lister.list(dir) {
            Ok(entries) => self.walk_entries(entries, prefix, relative_dir),
            Err(e) => log::warn!("Skipping unreadable directory {}: {}", relative_dir, e),
        }
    }

    fn walk_entries(&mut self, mut entries: Vec<ListedEntry>, prefix: &str, relative_dir: &str) {
        entries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });

        let visible: Vec<(ListedEntry, String)> = entries
            .into_iter()
            .filter_map(|entry| {
                let path = join_relative(relative_dir, &entry.name);
                if entry.name == GIT_DIR_NAME || self.rules.is_ignored(&path) {
                    log::trace!("Ignored: {}", path);
                    None
                } else {
                    Some((entry, path))
                }
            })
            .collect();

        let count = visible.len();
        for (index, (entry, path)) in visible.into_iter().enumerate() {
            let is_last = index + 1 == count;
            self.tree.push_entry(prefix, &entry.name, is_last);

            if entry.is_dir {
                let child_prefix = TreeRenderer::child_prefix(prefix, is_last);
                self.walk_dir(&entry.handle, &child_prefix, &path);
            } else {
                self.visit_file(entry, path);
            }
        }
    }

    fn visit_file(&mut self, entry: ListedEntry, path: String) {
        let size_kb = entry.size_bytes / 1024;
        let max_kb = self.config.filters.max_file_size_kb;
        if max_kb > 0 && size_kb > max_kb {
            log::trace!("Over size limit ({} KB > {} KB): {}", size_kb, max_kb, path);
            self.result.oversized += 1;
            return;
        }
        if self
            .classifier
            .is_content_excluded(&path, &entry.handle, self.lister)
        {
            self.result.content_excluded += 1;
            return;
        }
        log::trace!("Collected: {}", path);
        self.result.files.push(FileEntry {
            path,
            name: entry.name,
            handle: entry.handle,
            size_kb,
        });
    }
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}
