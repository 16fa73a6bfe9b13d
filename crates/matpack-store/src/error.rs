/// Errors from storage backend and codec operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested path does not exist in the backend.
    #[error("no such path in backend: {0:?}")]
    NotFound(String),

    /// The backend has been closed and rejects further writes.
    #[error("backend is closed")]
    Closed,

    /// The backend cannot persist a manifest (pure in-memory store).
    #[error("this backend cannot be serialized")]
    NotSerializable,

    /// Payload encoding or decoding failure.
    #[error("codec error: {0}")]
    Codec(String),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
