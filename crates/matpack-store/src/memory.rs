use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use std::rc::Rc;

use crate::error::{StoreError, StoreResult};
use crate::traits::{InputStream, StorageBackend};

type FileMap = Rc<RefCell<BTreeMap<String, Vec<u8>>>>;

/// In-memory, `BTreeMap`-based storage backend.
///
/// Intended for tests, scratch packages, and merge output. Never
/// serializable: a package finalized onto this backend fails at the
/// manifest-write step by design.
pub struct InMemoryBackend {
    files: FileMap,
    closed: bool,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            files: Rc::new(RefCell::new(BTreeMap::new())),
            closed: false,
        }
    }

    /// Number of stored paths.
    pub fn len(&self) -> usize {
        self.files.borrow().len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.files.borrow().is_empty()
    }

    /// Sorted list of all stored paths.
    pub fn paths(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer that commits its buffer into the file map on flush or drop.
struct MemoryWriter {
    path: String,
    buf: Vec<u8>,
    files: FileMap,
    committed: bool,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.files
            .borrow_mut()
            .insert(self.path.clone(), self.buf.clone());
        self.committed = true;
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.flush();
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn open_for_read(&self, path: &str) -> StoreResult<Box<dyn InputStream>> {
        let files = self.files.borrow();
        let bytes = files
            .get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(Box::new(Cursor::new(bytes.clone())))
    }

    fn open_for_write(&mut self, path: &str) -> StoreResult<Box<dyn Write>> {
        // A sealed backend still accepts rewrites of existing paths.
        if self.closed && !self.files.borrow().contains_key(path) {
            return Err(StoreError::Closed);
        }
        Ok(Box::new(MemoryWriter {
            path: path.to_string(),
            buf: Vec::new(),
            files: Rc::clone(&self.files),
            committed: false,
        }))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn remove(&mut self, path: &str) -> StoreResult<()> {
        self.files
            .borrow_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn serializable(&self) -> bool {
        false
    }

    fn close(&mut self) -> StoreResult<()> {
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("paths", &self.len())
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn write_then_read_back() {
        let mut backend = InMemoryBackend::new();
        {
            let mut w = backend.open_for_write("a.bin").unwrap();
            w.write_all(b"payload").unwrap();
            w.flush().unwrap();
        }
        assert!(backend.exists("a.bin"));

        let mut stream = backend.open_for_read("a.bin").unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
    }

    #[test]
    fn writer_commits_on_drop() {
        let mut backend = InMemoryBackend::new();
        {
            let mut w = backend.open_for_write("b.bin").unwrap();
            w.write_all(b"xyz").unwrap();
            // no explicit flush
        }
        assert!(backend.exists("b.bin"));
    }

    #[test]
    fn streams_rewind() {
        use std::io::{Seek, SeekFrom};
        let mut backend = InMemoryBackend::new();
        backend
            .open_for_write("c.bin")
            .unwrap()
            .write_all(b"abc")
            .unwrap();

        let mut stream = backend.open_for_read("c.bin").unwrap();
        let mut first = String::new();
        stream.read_to_string(&mut first).unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        let mut second = String::new();
        stream.read_to_string(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn remove_and_missing_paths() {
        let mut backend = InMemoryBackend::new();
        backend
            .open_for_write("d.bin")
            .unwrap()
            .write_all(b"1")
            .unwrap();
        backend.remove("d.bin").unwrap();
        assert!(!backend.exists("d.bin"));
        assert!(matches!(
            backend.remove("d.bin"),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            backend.open_for_read("d.bin"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn never_serializable() {
        let mut backend = InMemoryBackend::new();
        assert!(!backend.serializable());
        backend.close().unwrap();
        assert!(matches!(
            backend.open_for_write("late.bin"),
            Err(StoreError::Closed)
        ));
    }

    #[test]
    fn sealed_backend_still_rewrites_existing_paths() {
        let mut backend = InMemoryBackend::new();
        backend
            .open_for_write("e.bin")
            .unwrap()
            .write_all(b"old")
            .unwrap();
        backend.close().unwrap();

        backend
            .open_for_write("e.bin")
            .unwrap()
            .write_all(b"new")
            .unwrap();
        let mut out = Vec::new();
        backend
            .open_for_read("e.bin")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"new");
    }
}
