use super::{TreeEntry, TreeProvider};
use crate::pattern::join_path;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

/// In-memory tree of directories and files.
///
/// Paths are `/`-separated. `""` and `"/"` both name the root, and leading or
/// trailing separators are ignored, so `"a/b"` and `"/a/b/"` are the same node.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    /// Directory path → child name → is_dir
    dirs: BTreeMap<String, BTreeMap<String, bool>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Create a tree holding only the root directory
    pub fn new() -> Self {
        let mut dirs = BTreeMap::new();
        dirs.insert(String::new(), BTreeMap::new());
        Self { dirs }
    }

    /// Build a tree from file paths, creating parent directories as needed
    pub fn from_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        files
            .into_iter()
            .fold(Self::new(), |tree, path| tree.with_file(path.as_ref()))
    }

    /// Add a file, creating parent directories as needed
    pub fn with_file(mut self, path: &str) -> Self {
        self.insert(path, false);
        self
    }

    /// Add a directory, creating parent directories as needed
    pub fn with_dir(mut self, path: &str) -> Self {
        self.insert(path, true);
        self
    }

    /// All directory paths in the tree, root included as `""`
    pub fn dirs(&self) -> BTreeSet<&str> {
        self.dirs.keys().map(String::as_str).collect()
    }

    /// All file paths in the tree
    pub fn files(&self) -> BTreeSet<String> {
        self.dirs
            .iter()
            .flat_map(|(dir, children)| {
                children
                    .iter()
                    .filter(|(_, is_dir)| !**is_dir)
                    .map(move |(name, _)| join_path(dir, name))
            })
            .collect()
    }

    fn insert(&mut self, path: &str, is_dir: bool) {
        let path = normalize(path);
        if path.is_empty() {
            return;
        }

        let mut parent = String::new();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        for (ix, segment) in segments.iter().enumerate() {
            let last = ix + 1 == segments.len();
            let child_is_dir = !last || is_dir;
            self.dirs
                .entry(parent.clone())
                .or_default()
                .insert((*segment).to_string(), child_is_dir);

            parent = join_path(&parent, segment);
            if child_is_dir {
                self.dirs.entry(parent.clone()).or_default();
            }
        }
    }
}

impl TreeProvider for MemoryTree {
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>> {
        let key = normalize(dir);
        if let Some(children) = self.dirs.get(key) {
            return Ok(children
                .iter()
                .map(|(name, is_dir)| TreeEntry {
                    name: name.clone(),
                    is_dir: *is_dir,
                })
                .collect());
        }

        let (parent, name) = key.rsplit_once('/').unwrap_or(("", key));
        let kind = match self.dirs.get(parent).and_then(|children| children.get(name)) {
            Some(false) => io::ErrorKind::NotADirectory,
            _ => io::ErrorKind::NotFound,
        };
        Err(io::Error::new(kind, format!("cannot list '{dir}'")))
    }
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}
