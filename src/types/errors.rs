use std::fmt;

// === TabError ===

/// Errors related to tab manager operations.
#[derive(Debug)]
pub enum TabError {
    /// Tab with the given ID was not found.
    TabNotFound(String),
    /// Space with the given ID was not found.
    SpaceNotFound(String),
    /// Profile with the given ID was not found.
    ProfileNotFound(String),
}

impl fmt::Display for TabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabError::TabNotFound(id) => write!(f, "Tab not found: {}", id),
            TabError::SpaceNotFound(id) => write!(f, "Space not found: {}", id),
            TabError::ProfileNotFound(id) => write!(f, "Profile not found: {}", id),
        }
    }
}

impl std::error::Error for TabError {}

// === PersistError ===

/// Write-layer failure classification used by the snapshot persister.
///
/// These are never surfaced to callers; the persister absorbs them through
/// its degrade path and reports only a boolean. The classification steers
/// logging and the fallback decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// Another connection held a lock on the store (busy/locked).
    ConcurrencyConflict(String),
    /// The store reported corrupted or malformed content.
    DataCorruption(String),
    /// Any other storage-engine failure.
    StorageFailure(String),
    /// A transaction rollback itself failed.
    RollbackFailed(String),
    /// The snapshot violated a model invariant before any I/O.
    InvalidModelState(String),
}

impl PersistError {
    /// Classifies a storage error by inspecting its message for known
    /// substrings, mirroring the SQLite error vocabulary.
    pub fn classify(err: &rusqlite::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("rollback") {
            PersistError::RollbackFailed(msg)
        } else if lower.contains("lock") || lower.contains("busy") {
            PersistError::ConcurrencyConflict(msg)
        } else if lower.contains("corrupt") || lower.contains("malformed") {
            PersistError::DataCorruption(msg)
        } else {
            PersistError::StorageFailure(msg)
        }
    }
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::ConcurrencyConflict(msg) => {
                write!(f, "Store concurrency conflict: {}", msg)
            }
            PersistError::DataCorruption(msg) => write!(f, "Store data corruption: {}", msg),
            PersistError::StorageFailure(msg) => write!(f, "Store write failure: {}", msg),
            PersistError::RollbackFailed(msg) => write!(f, "Store rollback failed: {}", msg),
            PersistError::InvalidModelState(msg) => write!(f, "Invalid model state: {}", msg),
        }
    }
}

impl std::error::Error for PersistError {}

// === StoreOpenError ===

/// Store-open failure classification used by the bootstrap path.
///
/// Unlike write-layer errors these are not absorbed: aside from the
/// schema-mismatch auto-recovery, every classification is fatal.
#[derive(Debug)]
pub enum StoreOpenError {
    /// The on-disk schema version is ahead of this build.
    SchemaMismatch(String),
    /// The disk is full; the store must not be touched.
    DiskFull(String),
    /// The store looks corrupted; the store must not be touched.
    Corruption(String),
    /// Unclassified open failure; treated like corruption.
    Other(String),
}

impl StoreOpenError {
    /// Classifies a storage error observed while opening the store.
    pub fn classify(err: &rusqlite::Error) -> Self {
        let msg = err.to_string();
        let lower = msg.to_lowercase();
        if lower.contains("corrupt")
            || lower.contains("malformed")
            || lower.contains("not a database")
        {
            StoreOpenError::Corruption(msg)
        } else if lower.contains("disk") && lower.contains("full") {
            StoreOpenError::DiskFull(msg)
        } else {
            StoreOpenError::Other(msg)
        }
    }

    /// Whether the bootstrap path may attempt automatic recovery.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreOpenError::SchemaMismatch(_))
    }
}

impl fmt::Display for StoreOpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreOpenError::SchemaMismatch(msg) => write!(f, "Store schema mismatch: {}", msg),
            StoreOpenError::DiskFull(msg) => write!(f, "Disk full opening store: {}", msg),
            StoreOpenError::Corruption(msg) => write!(f, "Store corruption: {}", msg),
            StoreOpenError::Other(msg) => write!(f, "Store open failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreOpenError {}
