//! Unit tests for error classification and display.

use nimbus_session::types::errors::{PersistError, StoreOpenError, TabError};
use rstest::rstest;

fn sqlite_error(code: std::os::raw::c_int, message: &str) -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(code),
        Some(message.to_string()),
    )
}

// ---------------------------------------------------------------------------
// Write-layer classification
// ---------------------------------------------------------------------------

/// Classification is driven by the SQLite message vocabulary: lock/busy
/// means another writer, corrupt/malformed means bad bytes, rollback
/// failures get their own bucket, everything else is a storage failure.
#[rstest]
#[case(rusqlite::ffi::SQLITE_BUSY, "database is locked", "concurrency")]
#[case(rusqlite::ffi::SQLITE_BUSY, "database table is busy", "concurrency")]
#[case(rusqlite::ffi::SQLITE_CORRUPT, "database disk image is malformed", "corruption")]
#[case(rusqlite::ffi::SQLITE_ERROR, "cannot rollback - no transaction is active", "rollback")]
#[case(rusqlite::ffi::SQLITE_IOERR, "disk I/O error", "storage")]
fn test_persist_error_classification(
    #[case] code: std::os::raw::c_int,
    #[case] message: &str,
    #[case] expected: &str,
) {
    let classified = PersistError::classify(&sqlite_error(code, message));
    let matched = match (&classified, expected) {
        (PersistError::ConcurrencyConflict(_), "concurrency") => true,
        (PersistError::DataCorruption(_), "corruption") => true,
        (PersistError::RollbackFailed(_), "rollback") => true,
        (PersistError::StorageFailure(_), "storage") => true,
        _ => false,
    };
    assert!(matched, "'{}' classified as {:?}", message, classified);
}

// ---------------------------------------------------------------------------
// Open-time classification
// ---------------------------------------------------------------------------

#[rstest]
#[case(rusqlite::ffi::SQLITE_NOTADB, "file is not a database", "corruption")]
#[case(rusqlite::ffi::SQLITE_CORRUPT, "database disk image is malformed", "corruption")]
#[case(rusqlite::ffi::SQLITE_FULL, "database or disk is full", "disk_full")]
#[case(rusqlite::ffi::SQLITE_AUTH, "authorization denied", "other")]
fn test_store_open_error_classification(
    #[case] code: std::os::raw::c_int,
    #[case] message: &str,
    #[case] expected: &str,
) {
    let classified = StoreOpenError::classify(&sqlite_error(code, message));
    let matched = match (&classified, expected) {
        (StoreOpenError::Corruption(_), "corruption") => true,
        (StoreOpenError::DiskFull(_), "disk_full") => true,
        (StoreOpenError::Other(_), "other") => true,
        _ => false,
    };
    assert!(matched, "'{}' classified as {:?}", message, classified);
}

#[test]
fn test_only_schema_mismatch_is_recoverable() {
    assert!(StoreOpenError::SchemaMismatch("v9 > v1".to_string()).is_recoverable());
    assert!(!StoreOpenError::DiskFull("full".to_string()).is_recoverable());
    assert!(!StoreOpenError::Corruption("bad".to_string()).is_recoverable());
    assert!(!StoreOpenError::Other("huh".to_string()).is_recoverable());
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_persist_error_display() {
    let err = PersistError::InvalidModelState("duplicate tab id t1".to_string());
    assert_eq!(err.to_string(), "Invalid model state: duplicate tab id t1");

    let err = PersistError::ConcurrencyConflict("database is locked".to_string());
    assert!(err.to_string().contains("concurrency conflict"));
}

#[test]
fn test_store_open_error_display() {
    let err = StoreOpenError::SchemaMismatch("version 9 > 1".to_string());
    assert!(err.to_string().contains("schema mismatch"));

    let err = StoreOpenError::Corruption("malformed".to_string());
    assert!(err.to_string().contains("corruption"));
}

#[test]
fn test_tab_error_display() {
    assert_eq!(
        TabError::TabNotFound("t1".to_string()).to_string(),
        "Tab not found: t1"
    );
    assert_eq!(
        TabError::SpaceNotFound("s1".to_string()).to_string(),
        "Space not found: s1"
    );
    assert_eq!(
        TabError::ProfileNotFound("p1".to_string()).to_string(),
        "Profile not found: p1"
    );
}
