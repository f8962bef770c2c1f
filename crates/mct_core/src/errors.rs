use thiserror::Error;

/// Error surface of the whole store stack.
///
/// The four top-level kinds match what callers can act on; everything a
/// backing store can get wrong is folded into `BackingStore`.
#[derive(Debug, Error)]
pub enum McError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("backing store: {0}")]
    BackingStore(#[from] BackingStoreError),
}

#[derive(Debug, Error)]
pub enum BackingStoreError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata JSON: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("persist: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("bad magic or version")]
    BadHeader,

    #[error("corrupt data: {0}")]
    Corrupt(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}

// Shortcuts so `?` lifts low-level failures straight to `McError`.
impl From<std::io::Error> for McError {
    fn from(e: std::io::Error) -> Self {
        BackingStoreError::Io(e).into()
    }
}

impl From<serde_json::Error> for McError {
    fn from(e: serde_json::Error) -> Self {
        BackingStoreError::Meta(e).into()
    }
}

impl From<tempfile::PersistError> for McError {
    fn from(e: tempfile::PersistError) -> Self {
        BackingStoreError::Persist(e).into()
    }
}

pub type Result<T> = std::result::Result<T, McError>;
