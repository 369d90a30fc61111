//! Store bootstrap: opens the session store at startup and performs
//! bounded recovery when the open fails.
//!
//! Recovery policy: a schema mismatch gets an automatic
//! backup-then-reset (the data was written by a newer build and is
//! preserved in the backup); disk-full, corruption, and unclassified
//! failures leave the store untouched and are fatal to the caller.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::errors::StoreOpenError;

use super::backup;
use super::connection::Database;

/// Default store filename inside the application-support directory.
const STORE_FILE_NAME: &str = "nimbus-session.sqlite3";

/// Application namespace for the support directory.
const BUNDLE_ID: &str = "com.nimbus.browser";

/// Default store location: `<data dir>/com.nimbus.browser/nimbus-session.sqlite3`.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(BUNDLE_ID)
        .join(STORE_FILE_NAME)
}

/// Opens the session store, attempting bounded recovery on failure.
///
/// # Errors
/// Returns the classified open error once recovery is exhausted (or was
/// never permitted). Callers must treat this as fatal: continuing with a
/// store of unknown integrity is worse than stopping.
pub fn open_store(store_path: &Path) -> Result<Database, StoreOpenError> {
    if let Some(parent) = store_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match Database::open(store_path) {
        Ok(db) => Ok(db),
        Err(err) => recover(store_path, err),
    }
}

fn recover(store_path: &Path, err: StoreOpenError) -> Result<Database, StoreOpenError> {
    if !err.is_recoverable() {
        log::error!("store open failed, leaving store untouched: {}", err);
        return Err(err);
    }

    log::warn!("store open failed ({}), attempting backup-and-reset", err);

    match backup::create_backup(store_path) {
        Ok(dest) => log::info!("backed up store files to {}", dest.display()),
        // Best-effort: a failed backup does not block the reset.
        Err(e) => log::warn!("store backup failed: {}", e),
    }

    if let Err(e) = backup::remove_store_files(store_path) {
        log::error!("failed to remove store files during recovery: {}", e);
        return Err(err);
    }

    match Database::open(store_path) {
        Ok(db) => {
            log::info!("recovered with a fresh store at {}", store_path.display());
            Ok(db)
        }
        Err(second) => {
            // Fresh store still failed to open. Put the newest backup back
            // so no data is lost, then report fatal regardless.
            match backup::restore_latest_backup(store_path) {
                Ok(true) => log::error!(
                    "fresh store open failed ({}); restored latest backup over store location",
                    second
                ),
                Ok(false) => log::error!(
                    "fresh store open failed ({}); no backup available to restore",
                    second
                ),
                Err(e) => log::error!(
                    "fresh store open failed ({}); backup restore also failed: {}",
                    second,
                    e
                ),
            }
            Err(second)
        }
    }
}
