//! Deferred, repeatable reads bound to an open stream.

use std::cell::RefCell;
use std::io::{Read, Seek, SeekFrom};
use std::rc::Rc;

use matpack_store::{codec, InputStream, StoreError};
use matpack_types::Mediatype;

use crate::error::{PackageError, PackageResult};
use crate::payload::Payload;

/// A deferred read operation bound to an open stream.
///
/// Invoking the proxy seeks the stream back to offset 0, reads it to the
/// end, verifies the checksum when one was supplied, and decodes per the
/// resource's mediatype. The rewind makes invocations repeatable from one
/// handle; it also makes the shared cursor unsafe for overlapping use, so
/// callers must serialize access per stream.
pub struct ReadProxy {
    stream: Rc<RefCell<Box<dyn InputStream>>>,
    mediatype: Mediatype,
    path: String,
    expected_hash: Option<String>,
}

impl ReadProxy {
    pub fn new(
        stream: Box<dyn InputStream>,
        mediatype: Mediatype,
        path: String,
        expected_hash: Option<String>,
    ) -> Self {
        Self {
            stream: Rc::new(RefCell::new(stream)),
            mediatype,
            path,
            expected_hash,
        }
    }

    /// Backend-relative path this proxy reads from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Rewind, read, verify, decode.
    pub fn invoke(&self) -> PackageResult<Payload> {
        let mut stream = self.stream.borrow_mut();
        stream
            .seek(SeekFrom::Start(0))
            .map_err(StoreError::from)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).map_err(StoreError::from)?;

        if let Some(expected) = &self.expected_hash {
            let computed = codec::checksum(&bytes);
            if &computed != expected {
                return Err(PackageError::FileIntegrity {
                    path: self.path.clone(),
                    expected: expected.clone(),
                    computed,
                });
            }
        }

        let payload = match self.mediatype {
            Mediatype::Binary => Payload::Array(codec::decode_array(&bytes)?),
            Mediatype::Csv => Payload::Table(codec::decode_table(&bytes)?),
            Mediatype::Json => Payload::Json(codec::decode_json(&bytes)?),
        };
        Ok(payload)
    }
}

impl std::fmt::Debug for ReadProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadProxy")
            .field("path", &self.path)
            .field("mediatype", &self.mediatype)
            .field("checked", &self.expected_hash.is_some())
            .finish()
    }
}
