//! Storage backends and payload codecs for matpack datapackages.
//!
//! A datapackage owns exactly one [`StorageBackend`]: a byte-stream store
//! with open-for-read/open-for-write/exists/remove/close primitives. This
//! crate ships the two realizations the engine itself needs:
//!
//! - [`InMemoryBackend`] -- `BTreeMap`-backed store for tests, scratch
//!   packages, and merge output; never serializable.
//! - [`DirectoryBackend`] -- one file per resource under a root directory.
//!
//! Archive (write-once zip) backends are external collaborators; the
//! [`StorageBackend`] trait is their contract.
//!
//! # Design Rules
//!
//! 1. Backends store opaque bytes; they never interpret payloads.
//! 2. Reads are repeatable: streams support seeking back to offset 0.
//! 3. A backend that cannot persist a manifest reports
//!    `serializable() == false` and the engine refuses to finalize onto it.
//! 4. All I/O errors are propagated, never silently ignored.
//!
//! The [`codec`] module maps payloads to bytes: bincode for numeric arrays,
//! CSV for tables, JSON for free-form metadata, with CRC32 checksums for
//! integrity checking on load.

pub mod codec;
pub mod directory;
pub mod error;
pub mod memory;
pub mod traits;

pub use directory::DirectoryBackend;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBackend;
pub use traits::{InputStream, StorageBackend};
