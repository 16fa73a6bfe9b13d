/// Errors from foundation type construction and validation.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// The name fails the datapackage naming pattern.
    #[error("invalid name {0:?}: only alphanumerics, '.', '_' and '-' are allowed")]
    InvalidName(String),

    /// Matrix dimensions do not match the value buffer.
    #[error("matrix shape mismatch: {nrows} x {ncols} declared, {len} values given")]
    MatrixShape {
        nrows: usize,
        ncols: usize,
        len: usize,
    },

    /// A table row has the wrong number of cells.
    #[error("ragged table: row {row} has {got} cells, expected {expected}")]
    RaggedTable {
        row: usize,
        got: usize,
        expected: usize,
    },

    /// A referenced table column does not exist.
    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    /// The mediatype string is not one of the recognized encodings.
    #[error("unrecognized mediatype {0:?}")]
    UnknownMediatype(String),

    /// The resource name does not end in a recognized kind suffix.
    #[error("resource name {0:?} has no recognized kind suffix")]
    UnknownKindSuffix(String),
}

/// Result alias for type-level operations.
pub type TypeResult<T> = Result<T, TypeError>;
