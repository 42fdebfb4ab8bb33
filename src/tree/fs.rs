use super::{TreeEntry, TreeProvider};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Physical directory tree rooted at a local path.
///
/// Scanner paths are resolved relative to the root; `""` and `"/"` both list the
/// root itself. Symbolic links are not followed, so a link to a directory is
/// reported as a file.
#[derive(Debug, Clone)]
pub struct FsTree {
    root: PathBuf,
}

impl FsTree {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, dir: &str) -> PathBuf {
        dir.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

impl TreeProvider for FsTree {
    fn list(&self, dir: &str) -> io::Result<Vec<TreeEntry>> {
        let path = self.resolve(dir);
        let mut entries = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            entries.push(TreeEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_dir(),
            });
        }
        Ok(entries)
    }
}
