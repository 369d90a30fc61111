//! App Core for the Nimbus session subsystem.
//!
//! Wires the startup sequence together: bootstrap-open the store, read the
//! last persisted snapshot, spawn the persister worker, and rebuild the
//! live tab/space graph from the snapshot.

use std::path::Path;

use crate::database::bootstrap;
use crate::database::connection::Database;
use crate::database::store;
use crate::managers::tab_manager::TabManager;
use crate::services::persister::PersisterHandle;
use crate::types::errors::StoreOpenError;

/// Profile used until profile management grows a surface of its own.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Central struct owning the session subsystem.
///
/// UI-layer consumers interact only through `tab_manager`; the persister
/// and store are internal to it.
pub struct App {
    pub tab_manager: TabManager,
}

impl App {
    /// Opens (or recovers) the store at `store_path` and restores the live
    /// graph from it.
    ///
    /// # Errors
    /// Propagates fatal store-open failures; callers are expected to stop
    /// the process rather than continue without a store.
    pub fn new(store_path: &Path) -> Result<Self, StoreOpenError> {
        let db = bootstrap::open_store(store_path)?;
        let snapshot =
            store::read_snapshot(db.connection()).map_err(|e| StoreOpenError::classify(&e))?;

        let persister =
            PersisterHandle::spawn(db).map_err(|e| StoreOpenError::Other(e.to_string()))?;
        let tab_manager = TabManager::from_snapshot(&snapshot, DEFAULT_PROFILE_ID, persister);

        log::info!(
            "session store loaded: {} spaces, {} tabs",
            snapshot.spaces.len(),
            snapshot.tabs.len()
        );
        Ok(Self { tab_manager })
    }

    /// Opens the store at its default platform location.
    pub fn open_default() -> Result<Self, StoreOpenError> {
        Self::new(&bootstrap::default_store_path())
    }

    /// Shutdown sequence: blocking flush of the final snapshot, then stop
    /// the persister worker. Returns the store handle for inspection.
    pub fn shutdown(self) -> Option<Database> {
        self.tab_manager.shutdown()
    }
}
