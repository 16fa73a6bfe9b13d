use std::io::{Read, Seek, Write};

use crate::error::StoreResult;

/// A readable, rewindable byte stream.
///
/// Proxies seek back to offset 0 before every invocation, so every stream a
/// backend hands out must support seeking.
pub trait InputStream: Read + Seek {}

impl<T: Read + Seek> InputStream for T {}

/// Byte-stream storage owned by a datapackage.
///
/// All implementations must satisfy these invariants:
/// - Paths are backend-relative and flat; the engine never asks for
///   directories.
/// - `open_for_read` streams are independent: reading one does not disturb
///   another, and each can be rewound to offset 0.
/// - Writes become visible to `open_for_read`/`exists` once the returned
///   writer has been flushed or dropped.
/// - `close` seals the backend against structural additions: existing paths
///   may still be rewritten (so modified payloads can be flushed), but
///   writing a new path fails with `StoreError::Closed`.
pub trait StorageBackend {
    /// Open a path for repeatable reading.
    ///
    /// Returns `StoreError::NotFound` if the path does not exist.
    fn open_for_read(&self, path: &str) -> StoreResult<Box<dyn InputStream>>;

    /// Open a path for writing, replacing any existing content.
    fn open_for_write(&mut self, path: &str) -> StoreResult<Box<dyn Write>>;

    /// Check whether a path exists.
    fn exists(&self, path: &str) -> bool;

    /// Remove a path. Removing a missing path is an error.
    fn remove(&mut self, path: &str) -> StoreResult<()>;

    /// Whether a manifest can be persisted to this backend.
    ///
    /// In-memory backends return `false`; `finalize_serialization` consults
    /// this before the manifest-write step.
    fn serializable(&self) -> bool;

    /// Seal the backend against new paths after the manifest has been
    /// written. Rewrites of already-stored paths stay permitted.
    fn close(&mut self) -> StoreResult<()>;
}
