//! Temporary directory trees for filesystem-backed tests.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tempfile::TempDir;

/// A temporary directory removed on drop.
#[derive(Debug)]
pub struct TempTree {
    _tmp: TempDir,
    root: Utf8PathBuf,
    dir: Dir,
}

impl TempTree {
    /// Create an empty tree.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or its path is
    /// not UTF-8.
    pub fn new() -> Result<Self> {
        let tmp = TempDir::new().context("create temp dir")?;
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
            .map_err(|path| anyhow::anyhow!("non-UTF-8 temp dir {}", path.display()))?;
        let dir = Dir::open_ambient_dir(&root, ambient_authority()).context("open temp dir")?;
        Ok(Self {
            _tmp: tmp,
            root,
            dir,
        })
    }

    /// Absolute path of the tree.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of `rel` inside the tree.
    pub fn path(&self, rel: &str) -> Utf8PathBuf {
        self.root.join(rel)
    }

    /// Create the directory `rel` and its parents.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn dir(&self, rel: &str) -> Result<Utf8PathBuf> {
        self.dir
            .create_dir_all(rel)
            .with_context(|| format!("create dir {rel}"))?;
        Ok(self.path(rel))
    }

    /// Write `contents` to the file `rel`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn file(&self, rel: &str, contents: &str) -> Result<Utf8PathBuf> {
        if let Some(parent) = Utf8Path::new(rel).parent().filter(|p| !p.as_str().is_empty()) {
            self.dir(parent.as_str())?;
        }
        self.dir
            .write(rel, contents)
            .with_context(|| format!("write file {rel}"))?;
        Ok(self.path(rel))
    }
}
