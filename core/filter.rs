//! Decides whether a file's *content* belongs in a digest.
//!
//! Excluded files are still listed in the directory tree; only their bodies
//! are left out. Checks run cheapest first and stop at the first hit:
//! exact file name, extension, asset directory, then a bounded content peek
//! for XML that lives in a drawable directory.

use crate::lister::{DirectoryLister, EntryHandle};
use log;
use std::collections::HashSet;
use std::io::Read;

pub const PEEK_BYTES: usize = 512;

const SKIPPABLE_FILENAMES: &[&str] = &[
    "gradle-wrapper.jar",
    "gradlew",
    "gradlew.bat",
    "local.properties",
    ".ds_store",
    "thumbs.db",
];

const SKIPPABLE_EXTENSIONS: &[&str] = &[
    // images and media
    "png", "jpg", "jpeg", "webp", "gif", "bmp", "svg", "ico", "tiff", "mp4", "mkv", "avi", "mov",
    "mp3", "wav", "flac", "ogg",
    // archives, binaries, office documents
    "zip", "tar", "gz", "rar", "7z", "jar", "apk", "aab", "dex", "class", "so", "o", "a", "pdf",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "exe", "dll", "bin", "dat", "db", "sqlite", "pdb",
    // keystores and certificates
    "jks", "keystore", "pem", "crt", "der", "p12",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
];

const ASSET_DIR_SEGMENTS: &[&str] = &["/res/mipmap", "/res/font", "/res/raw"];

const GRAPHIC_DIR_SEGMENT: &str = "/res/drawable";

const MARKUP_EXTENSIONS: &[&str] = &["xml"];

/// Root tags of XML files that describe graphics rather than code.
const ASSET_XML_TAGS: &[&str] = &[
    "<vector",
    "<animated-vector",
    "<bitmap",
    "<aapt:attr",
    "<shape",
    "<selector",
    "<ripple",
    "<layer-list",
    "<nine-patch",
];

#[derive(Debug, Clone)]
pub struct ContentClassifier {
    filenames: HashSet<&'static str>,
    extensions: HashSet<&'static str>,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentClassifier {
    pub fn new() -> Self {
        Self {
            filenames: SKIPPABLE_FILENAMES.iter().copied().collect(),
            extensions: SKIPPABLE_EXTENSIONS.iter().copied().collect(),
        }
    }

    pub fn is_content_excluded(
        &self,
        relative_path: &str,
        handle: &EntryHandle,
        lister: &dyn DirectoryLister,
    ) -> bool {
        let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
        let lower_name = name.to_lowercase();

        if self.filenames.contains(lower_name.as_str()) {
            log::trace!("Content excluded by file name: {}", relative_path);
            return true;
        }

        let extension = extension_of(&lower_name);
        if self.extensions.contains(extension) {
            log::trace!("Content excluded by extension: {}", relative_path);
            return true;
        }

        let anchored = format!("/{}", relative_path.to_lowercase());
        if ASSET_DIR_SEGMENTS.iter().any(|seg| anchored.contains(seg)) {
            log::trace!("Content excluded by asset directory: {}", relative_path);
            return true;
        }

        if anchored.contains(GRAPHIC_DIR_SEGMENT) && MARKUP_EXTENSIONS.contains(&extension) {
            let excluded = peek_is_graphic_asset(handle, lister);
            if excluded {
                log::trace!("Content excluded by asset markup: {}", relative_path);
            }
            return excluded;
        }

        false
    }
}

fn extension_of(lower_name: &str) -> &str {
    match lower_name.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

// Unreadable files count as code.
fn peek_is_graphic_asset(handle: &EntryHandle, lister: &dyn DirectoryLister) -> bool {
    let mut buffer = [0u8; PEEK_BYTES];
    let read = match lister.open(handle).and_then(|mut reader| read_up_to(&mut reader, &mut buffer)) {
        Ok(n) => n,
        Err(e) => {
            log::debug!("Content peek failed for {}, keeping it: {}", handle, e);
            return false;
        }
    };
    if read == 0 {
        return false;
    }
    let header = String::from_utf8_lossy(&buffer[..read]).to_lowercase();
    let header = header.trim();
    ASSET_XML_TAGS.iter().any(|tag| header.contains(tag))
}

fn read_up_to(reader: &mut dyn Read, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lister::{Snapshot, SnapshotFile, SnapshotLister};

    fn lister_with(files: &[(&str, &str)]) -> SnapshotLister {
        SnapshotLister::from_snapshot(Snapshot {
            name: None,
            files: files
                .iter()
                .map(|(p, c)| SnapshotFile {
                    path: p.to_string(),
                    content: c.to_string(),
                })
                .collect(),
        })
        .unwrap()
    }

    fn handle_of(lister: &SnapshotLister, path: &str) -> EntryHandle {
        let mut current = lister.root();
        for segment in path.split('/') {
            current = lister
                .list(&current)
                .unwrap()
                .into_iter()
                .find(|e| e.name == segment)
                .unwrap()
                .handle;
        }
        current
    }

    fn excluded(files: &[(&str, &str)], path: &str) -> bool {
        let lister = lister_with(files);
        let handle = handle_of(&lister, path);
        ContentClassifier::new().is_content_excluded(path, &handle, &lister)
    }

    #[test]
    fn deny_listed_names_and_extensions() {
        assert!(excluded(&[("gradlew", "#!/bin/sh")], "gradlew"));
        assert!(excluded(&[("sub/.DS_Store", "")], "sub/.DS_Store"));
        assert!(excluded(&[("img/Logo.PNG", "x")], "img/Logo.PNG"));
        assert!(excluded(&[("fonts/a.woff2", "x")], "fonts/a.woff2"));
        assert!(!excluded(&[("src/main.rs", "fn main() {}")], "src/main.rs"));
        assert!(!excluded(&[("Makefile", "all:")], "Makefile"));
    }

    #[test]
    fn asset_directories_are_excluded() {
        assert!(excluded(
            &[("app/src/main/res/mipmap-hdpi/ic.xml", "<x/>")],
            "app/src/main/res/mipmap-hdpi/ic.xml"
        ));
        assert!(excluded(&[("res/raw/data.txt", "hi")], "res/raw/data.txt"));
    }

    #[test]
    fn drawable_xml_is_peeked() {
        let vector = "<?xml version=\"1.0\"?>\n<vector android:width=\"24dp\"/>";
        assert!(excluded(&[("res/drawable/icon.xml", vector)], "res/drawable/icon.xml"));

        let code_like = "<?xml version=\"1.0\"?>\n<resources><string name=\"a\">b</string></resources>";
        assert!(!excluded(
            &[("res/drawable/strings.xml", code_like)],
            "res/drawable/strings.xml"
        ));
    }

    #[test]
    fn layout_xml_outside_drawable_is_not_peeked() {
        let shape = "<shape android:shape=\"rectangle\"/>";
        assert!(!excluded(&[("res/layout/bg.xml", shape)], "res/layout/bg.xml"));
    }

    #[test]
    fn unreadable_peek_keeps_content() {
        let lister = lister_with(&[("res/drawable/x.xml", "<vector/>")]);
        let bogus = EntryHandle::Node(999);
        assert!(!ContentClassifier::new().is_content_excluded("res/drawable/x.xml", &bogus, &lister));
    }
}
