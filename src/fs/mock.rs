// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir,
}

/// In-memory filesystem. Clones share the same entries, so a test can keep
/// one handle and hand another to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut entries = self.entries.lock().unwrap();
        if let Some(parent) = path.parent() {
            add_parents(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.entries.lock().unwrap();
        add_parents(&mut entries, path.as_ref());
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|p, _| !p.starts_with(path));
    }
}

fn add_parents(entries: &mut HashMap<PathBuf, MockEntry>, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        entries
            .entry(ancestor.to_path_buf())
            .or_insert(MockEntry::Dir);
    }
}

impl FileSystem for MockFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let entries = self.entries.lock().unwrap();
        match entries.get(path) {
            Some(MockEntry::File(content)) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            Some(MockEntry::Dir) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries.lock().unwrap().get(path), Some(MockEntry::Dir))
    }
}
