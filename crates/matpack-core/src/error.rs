use matpack_store::StoreError;
use matpack_types::TypeError;

/// Errors from datapackage operations.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Structural mutation or re-finalization after sealing.
    #[error("datapackage already finalized")]
    Closed,

    /// The resource and data lists have drifted apart.
    #[error("number of resources ({resources}) doesn't match number of data objects ({data})")]
    LengthMismatch { resources: usize, data: usize },

    /// Duplicate name or group label, or an ambiguous lookup.
    #[error("non-unique: {0}")]
    NonUnique(String),

    /// Integer index outside the resource list.
    #[error("index {index} given, but only {len} resources available")]
    IndexOutOfRange { index: usize, len: usize },

    /// No resource with the given name.
    #[error("resource {0:?} not found")]
    MissingResource(String),

    /// A required field is absent from a resource record.
    #[error("resource is missing required field {0:?}")]
    MissingField(String),

    /// Unrecognized resource encoding on load.
    #[error("resource {resource:?} has unrecognized mediatype {mediatype:?}")]
    InvalidMimetype { resource: String, mediatype: String },

    /// Structural delete attempted while in-place edits are pending.
    #[error("dirty resources pending; call write_modified() or discard edits first")]
    PotentialInconsistency,

    /// A group member has the wrong dimensions.
    #[error("{member} has {got} rows, expected {expected}")]
    ShapeMismatch {
        member: &'static str,
        expected: usize,
        got: usize,
    },

    /// A payload has the wrong type for the requested operation.
    #[error("wrong datatype: {0}")]
    WrongDatatype(String),

    /// Checksum mismatch on load.
    #[error("file integrity failure for {path:?}: stored {expected}, computed {computed}")]
    FileIntegrity {
        path: String,
        expected: String,
        computed: String,
    },

    /// The referenced resource is not an interface.
    #[error("resource {0:?} is not an interface")]
    NotInterface(String),

    /// Foundation type validation failure (naming, shapes, mediatype).
    #[error(transparent)]
    Types(#[from] TypeError),

    /// Storage backend failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for datapackage operations.
pub type PackageResult<T> = Result<T, PackageError>;
