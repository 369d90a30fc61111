//! Backup and restore mechanics for the session store files.
//!
//! A backup is a directory named with a fixed prefix plus a sortable
//! timestamp, holding copies of the store file and its WAL/SHM sidecars.
//! Restore picks the most recently modified matching directory and copies
//! its contents back over the store location.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Subdirectory (next to the store file) holding all backups.
pub const BACKUPS_DIR_NAME: &str = "Backups";

/// Name prefix for individual backup directories.
pub const BACKUP_PREFIX: &str = "nimbus-store-backup-";

/// Sortable timestamp suffix, e.g. `2026-08-23T14-03-59`.
const TIMESTAMP_FORMAT: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]");

/// Returns the backups directory for a given store path.
pub fn backups_dir(store_path: &Path) -> PathBuf {
    store_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(BACKUPS_DIR_NAME)
}

/// The store file plus the SQLite sidecar files (`<store>-wal`, `<store>-shm`).
pub fn store_files(store_path: &Path) -> Vec<PathBuf> {
    let name = store_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = store_path.parent().unwrap_or_else(|| Path::new("."));
    vec![
        store_path.to_path_buf(),
        dir.join(format!("{}-wal", name)),
        dir.join(format!("{}-shm", name)),
    ]
}

/// Copies the store file and any existing sidecars into a fresh
/// timestamped backup directory. Absence of a store file is not an error;
/// the backup directory is created either way so recovery always has a
/// marker of when it ran.
pub fn create_backup(store_path: &Path) -> io::Result<PathBuf> {
    let stamp = OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let dest = backups_dir(store_path).join(format!("{}{}", BACKUP_PREFIX, stamp));
    fs::create_dir_all(&dest)?;

    for file in store_files(store_path) {
        if file.exists() {
            if let Some(name) = file.file_name() {
                fs::copy(&file, dest.join(name))?;
            }
        }
    }
    Ok(dest)
}

/// Deletes the store file and its sidecars. Missing files are skipped.
pub fn remove_store_files(store_path: &Path) -> io::Result<()> {
    for file in store_files(store_path) {
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Restores the most recently modified backup directory over the store
/// location: deletes the current store files, then copies the backup's
/// files back into place. Returns `false` when no backup exists.
pub fn restore_latest_backup(store_path: &Path) -> io::Result<bool> {
    let Some(backup) = latest_backup(store_path)? else {
        return Ok(false);
    };

    remove_store_files(store_path)?;

    let store_dir = store_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    for entry in fs::read_dir(&backup)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), store_dir.join(entry.file_name()))?;
        }
    }
    Ok(true)
}

/// Finds the backup directory with the latest modification time among all
/// directories matching the expected naming prefix.
fn latest_backup(store_path: &Path) -> io::Result<Option<PathBuf>> {
    let dir = backups_dir(store_path);
    if !dir.exists() {
        return Ok(None);
    }

    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(BACKUP_PREFIX) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().map_or(true, |(t, _)| modified > *t) {
            latest = Some((modified, entry.path()));
        }
    }
    Ok(latest.map(|(_, path)| path))
}
