//! Access strategies for a source tree.
//!
//! A run picks exactly one [`DirectoryLister`] when the root is resolved:
//! [`FsLister`] for a directory on disk, [`SnapshotLister`] for a JSON
//! snapshot whose files are only reachable through opaque node handles.
//! Traversal and content reads go through the trait, so both strategies
//! render the same tree and collect the same files.

use crate::config::expand_path;
use crate::error::{AppError, Result};
use log;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryHandle {
    Path(PathBuf),
    Node(usize),
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryHandle::Path(path) => write!(f, "{}", path.display()),
            EntryHandle::Node(id) => write!(f, "snapshot node #{}", id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListedEntry {
    pub name: String,
    pub handle: EntryHandle,
    pub is_dir: bool,
    pub size_bytes: u64,
}

pub trait DirectoryLister: Send + Sync {
    fn root(&self) -> EntryHandle;

    /// Display name of the root, used as the default project name.
    fn root_name(&self) -> Option<String>;

    /// Immediate children of `dir`, in no particular order.
    fn list(&self, dir: &EntryHandle) -> Result<Vec<ListedEntry>>;

    fn open(&self, file: &EntryHandle) -> io::Result<Box<dyn Read + '_>>;

    /// Whole file as UTF-8; invalid UTF-8 is an `InvalidData` error.
    fn read_to_string(&self, file: &EntryHandle) -> io::Result<String> {
        let mut text = String::new();
        self.open(file)?.read_to_string(&mut text)?;
        Ok(text)
    }

    fn strategy(&self) -> &'static str;
}

/// Looks up a direct child of `dir` by exact name.
pub fn find_child(
    lister: &dyn DirectoryLister,
    dir: &EntryHandle,
    name: &str,
) -> Option<ListedEntry> {
    match lister.list(dir) {
        Ok(entries) => entries.into_iter().find(|entry| entry.name == name),
        Err(e) => {
            log::debug!("Could not list {} while looking for {}: {}", dir, name, e);
            None
        }
    }
}

fn wrong_handle(handle: &EntryHandle, strategy: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("{} is not addressable by the {} lister", handle, strategy),
    )
}

// --- Direct filesystem access ---

#[derive(Debug, Clone)]
pub struct FsLister {
    root: PathBuf,
}

impl FsLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }
}

impl DirectoryLister for FsLister {
    fn root(&self) -> EntryHandle {
        EntryHandle::Path(self.root.clone())
    }

    fn root_name(&self) -> Option<String> {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }

    fn list(&self, dir: &EntryHandle) -> Result<Vec<ListedEntry>> {
        let EntryHandle::Path(dir_path) = dir else {
            return Err(AppError::Io(wrong_handle(dir, self.strategy())));
        };
        if !dir_path.is_dir() {
            return Err(AppError::SourceAccess {
                path: dir_path.clone(),
                reason: "not a readable directory".to_string(),
            });
        }

        let mut entries = Vec::new();
        for entry_result in WalkDir::new(dir_path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
        {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    if e.depth() == 0 {
                        return Err(e.into());
                    }
                    log::warn!("Error listing entry in {}: {}", dir_path.display(), e);
                    continue;
                }
            };
            let (is_dir, size_bytes) = if entry.path_is_symlink() {
                // Sizes come from the target; linked directories are not walked.
                match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_dir() => {
                        log::debug!("Skipping symlinked directory {}", entry.path().display());
                        continue;
                    }
                    Ok(meta) => (false, meta.len()),
                    Err(e) => {
                        log::warn!("Skipping broken symlink {}: {}", entry.path().display(), e);
                        continue;
                    }
                }
            } else if entry.file_type().is_dir() {
                (true, 0)
            } else {
                (false, entry.metadata().map(|m| m.len()).unwrap_or(0))
            };
            entries.push(ListedEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                handle: EntryHandle::Path(entry.into_path()),
                is_dir,
                size_bytes,
            });
        }
        Ok(entries)
    }

    fn open(&self, file: &EntryHandle) -> io::Result<Box<dyn Read + '_>> {
        match file {
            EntryHandle::Path(path) => Ok(Box::new(File::open(path)?)),
            other => Err(wrong_handle(other, self.strategy())),
        }
    }

    fn strategy(&self) -> &'static str {
        "direct"
    }
}

// --- Snapshot access ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub name: Option<String>,
    pub files: Vec<SnapshotFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug)]
enum NodeKind {
    Dir(BTreeMap<String, usize>),
    File(Vec<u8>),
}

#[derive(Debug)]
struct Node {
    name: String,
    kind: NodeKind,
}

/// In-memory tree built from a [`Snapshot`]. Node 0 is the root.
#[derive(Debug)]
pub struct SnapshotLister {
    name: Option<String>,
    nodes: Vec<Node>,
}

impl SnapshotLister {
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let mut lister = Self {
            name: snapshot.name,
            nodes: vec![Node {
                name: String::new(),
                kind: NodeKind::Dir(BTreeMap::new()),
            }],
        };
        for file in snapshot.files {
            lister.insert_file(&file.path, file.content.into_bytes())?;
        }
        log::debug!(
            "Snapshot tree built with {} nodes",
            lister.nodes.len()
        );
        Ok(lister)
    }

    pub fn from_json_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| AppError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut snapshot: Snapshot = serde_json::from_str(&text).map_err(|e| {
            AppError::Snapshot(format!("Invalid snapshot '{}': {}", path.display(), e))
        })?;
        if snapshot.name.is_none() {
            snapshot.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Self::from_snapshot(snapshot)
    }

    fn insert_file(&mut self, raw_path: &str, content: Vec<u8>) -> Result<()> {
        let segments: Vec<&str> = raw_path
            .split(['/', '\\'])
            .filter(|s| !s.is_empty() && *s != ".")
            .collect();
        if segments.is_empty() || segments.contains(&"..") {
            return Err(AppError::Snapshot(format!(
                "Invalid snapshot path \"{}\"",
                raw_path
            )));
        }

        let mut current = 0;
        let (file_name, dirs) = segments
            .split_last()
            .ok_or_else(|| AppError::Snapshot(format!("Empty snapshot path \"{}\"", raw_path)))?;
        for dir_name in dirs {
            current = self.child_dir(current, dir_name, raw_path)?;
        }

        let new_id = self.nodes.len();
        let NodeKind::Dir(children) = &mut self.nodes[current].kind else {
            return Err(AppError::Snapshot(format!(
                "Snapshot path \"{}\" descends into a file",
                raw_path
            )));
        };
        if children.contains_key(*file_name) {
            return Err(AppError::Snapshot(format!(
                "Duplicate snapshot path \"{}\"",
                raw_path
            )));
        }
        children.insert(file_name.to_string(), new_id);
        self.nodes.push(Node {
            name: file_name.to_string(),
            kind: NodeKind::File(content),
        });
        Ok(())
    }

    fn child_dir(&mut self, parent: usize, name: &str, raw_path: &str) -> Result<usize> {
        let new_id = self.nodes.len();
        let NodeKind::Dir(children) = &mut self.nodes[parent].kind else {
            return Err(AppError::Snapshot(format!(
                "Snapshot path \"{}\" descends into a file",
                raw_path
            )));
        };
        if let Some(&existing) = children.get(name) {
            return match self.nodes[existing].kind {
                NodeKind::Dir(_) => Ok(existing),
                NodeKind::File(_) => Err(AppError::Snapshot(format!(
                    "Snapshot path \"{}\" descends into a file",
                    raw_path
                ))),
            };
        }
        children.insert(name.to_string(), new_id);
        self.nodes.push(Node {
            name: name.to_string(),
            kind: NodeKind::Dir(BTreeMap::new()),
        });
        Ok(new_id)
    }

    fn node(&self, handle: &EntryHandle) -> io::Result<&Node> {
        match handle {
            EntryHandle::Node(id) => self.nodes.get(*id).ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{} does not exist", handle))
            }),
            other => Err(wrong_handle(other, self.strategy())),
        }
    }
}

impl DirectoryLister for SnapshotLister {
    fn root(&self) -> EntryHandle {
        EntryHandle::Node(0)
    }

    fn root_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn list(&self, dir: &EntryHandle) -> Result<Vec<ListedEntry>> {
        let node = self.node(dir)?;
        let NodeKind::Dir(children) = &node.kind else {
            return Err(AppError::Snapshot(format!("{} is not a directory", dir)));
        };
        Ok(children
            .values()
            .map(|&id| {
                let child = &self.nodes[id];
                let (is_dir, size_bytes) = match &child.kind {
                    NodeKind::Dir(_) => (true, 0),
                    NodeKind::File(bytes) => (false, bytes.len() as u64),
                };
                ListedEntry {
                    name: child.name.clone(),
                    handle: EntryHandle::Node(id),
                    is_dir,
                    size_bytes,
                }
            })
            .collect())
    }

    fn open(&self, file: &EntryHandle) -> io::Result<Box<dyn Read + '_>> {
        match &self.node(file)?.kind {
            NodeKind::File(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            NodeKind::Dir(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", file),
            )),
        }
    }

    fn strategy(&self) -> &'static str {
        "snapshot"
    }
}

/// Chooses the access strategy for `path`: directories are read directly,
/// `.json` files are loaded as snapshots.
pub fn resolve_source_root(path: &Path) -> Result<Box<dyn DirectoryLister>> {
    let expanded = expand_path(path);
    if expanded.is_dir() {
        let canonical = expanded
            .canonicalize()
            .map_err(|e| AppError::SourceAccess {
                path: expanded.clone(),
                reason: e.to_string(),
            })?;
        log::debug!("Using direct filesystem access for {}", canonical.display());
        return Ok(Box::new(FsLister::new(canonical)));
    }

    let is_json = expanded
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if expanded.is_file() && is_json {
        log::debug!("Using snapshot access for {}", expanded.display());
        return Ok(Box::new(SnapshotLister::from_json_path(&expanded)?));
    }

    Err(AppError::SourceAccess {
        path: expanded,
        reason: "not a directory or JSON snapshot".to_string(),
    })
}
