use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::traits::{InputStream, StorageBackend};

/// Storage backend mapping each resource to one file under a root directory.
pub struct DirectoryBackend {
    root: PathBuf,
    closed: bool,
}

impl DirectoryBackend {
    /// Create the root directory (and parents) if needed and open it.
    pub fn create(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        tracing::debug!(root = %root.display(), "created directory backend");
        Ok(Self {
            root,
            closed: false,
        })
    }

    /// Open an existing directory; fails if it does not exist.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StoreError::NotFound(root.display().to_string()));
        }
        Ok(Self {
            root,
            closed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl StorageBackend for DirectoryBackend {
    fn open_for_read(&self, path: &str) -> StoreResult<Box<dyn InputStream>> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(Box::new(File::open(full)?))
    }

    fn open_for_write(&mut self, path: &str) -> StoreResult<Box<dyn Write>> {
        // A sealed backend still accepts rewrites of existing paths.
        if self.closed && !self.resolve(path).is_file() {
            return Err(StoreError::Closed);
        }
        let file = File::create(self.resolve(path))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn remove(&mut self, path: &str) -> StoreResult<()> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        fs::remove_file(full)?;
        Ok(())
    }

    fn serializable(&self) -> bool {
        true
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for DirectoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryBackend")
            .field("root", &self.root)
            .field("closed", &self.closed)
            .finish()
    }
}
