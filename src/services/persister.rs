//! Snapshot persister for the Nimbus session store.
//!
//! [`SnapshotPersister`] is the only writer to the store. Its `persist`
//! contract degrades gracefully through three tiers: an atomic
//! transaction, a non-transactional best-effort replay, and finally a
//! replay of the serialized backup captured before the write began.
//! Callers only ever see a boolean: `true` means the atomic path
//! committed, `false` means anything else (including a successful
//! fallback, where the data is safe but the preferred path was not taken).
//!
//! [`PersisterHandle`] wraps the persister in a dedicated worker thread so
//! writes are serialized by construction: one request runs to completion
//! before the next queued request begins.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use crate::database::connection::Database;
use crate::database::store;
use crate::types::errors::PersistError;
use crate::types::snapshot::Snapshot;

/// Serializes snapshots to the store with coalescing, validation, and the
/// three-tier degrade path.
pub struct SnapshotPersister {
    db: Database,
    highest_generation: u64,
    /// Encoded copy of the incoming snapshot, captured before each write
    /// attempt and overwritten on the next one.
    backup: Option<Vec<u8>>,
    forced_failure: Option<PersistError>,
}

impl SnapshotPersister {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            highest_generation: 0,
            backup: None,
            forced_failure: None,
        }
    }

    /// Read access to the store, for startup loading and tests.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Releases the store handle.
    pub fn into_database(self) -> Database {
        self.db
    }

    /// Highest generation accepted so far.
    pub fn highest_generation(&self) -> u64 {
        self.highest_generation
    }

    /// Forces the next atomic write attempt to fail with the given
    /// classification. Fault injection for exercising the fallback tiers.
    #[doc(hidden)]
    pub fn fail_next_atomic(&mut self, err: PersistError) {
        self.forced_failure = Some(err);
    }

    /// Persists a snapshot tagged with its generation.
    ///
    /// Returns `true` only when the atomic transaction committed. A stale
    /// generation, a validation failure, or any degraded write returns
    /// `false`; underlying errors are absorbed and logged, never surfaced.
    pub fn persist(&mut self, snapshot: &Snapshot, generation: u64) -> bool {
        // Tier 0: coalescing. A generation below the highest seen was
        // superseded before it got a chance to run; writing it would
        // clobber newer state.
        if generation < self.highest_generation {
            log::debug!(
                "discarding stale snapshot generation {} (highest seen {})",
                generation,
                self.highest_generation
            );
            return false;
        }
        self.highest_generation = generation;

        // Capture the backup before any write so a mid-write failure has a
        // known-good copy to replay.
        match serde_json::to_vec(snapshot) {
            Ok(encoded) => self.backup = Some(encoded),
            Err(e) => log::warn!("snapshot backup encoding failed: {}", e),
        }

        if let Err(e) = snapshot.validate() {
            log::warn!("rejecting snapshot generation {}: {}", generation, e);
            return false;
        }

        match self.write_atomic(snapshot) {
            Ok(()) => return true,
            Err(e) => log::warn!(
                "atomic persist of generation {} failed ({}), trying best-effort write",
                generation,
                e
            ),
        }

        // Tier 2: same upsert/delete sequence without a transaction or the
        // post-write integrity re-check.
        match store::apply_snapshot(self.db.connection(), snapshot) {
            Ok(()) => {
                log::warn!(
                    "best-effort persist of generation {} succeeded without atomicity",
                    generation
                );
            }
            Err(e) => {
                log::error!(
                    "best-effort persist of generation {} failed: {}",
                    generation,
                    e
                );
                self.restore_backup();
            }
        }

        false
    }

    fn write_atomic(&mut self, snapshot: &Snapshot) -> Result<(), PersistError> {
        if let Some(err) = self.forced_failure.take() {
            return Err(err);
        }

        let tx = self
            .db
            .transaction()
            .map_err(|e| PersistError::classify(&e))?;
        store::apply_snapshot(&tx, snapshot).map_err(|e| PersistError::classify(&e))?;

        let consistent =
            store::verify_references(&tx).map_err(|e| PersistError::classify(&e))?;
        if !consistent {
            // Dropping the transaction rolls it back.
            return Err(PersistError::InvalidModelState(
                "tab space references failed the in-transaction check".to_string(),
            ));
        }

        tx.commit().map_err(|e| PersistError::classify(&e))
    }

    /// Tier 3: replay the pre-write backup so the store is not left
    /// mid-corrupted relative to a last-known-good state.
    fn restore_backup(&mut self) {
        let Some(encoded) = self.backup.as_deref() else {
            log::error!("no snapshot backup available to restore");
            return;
        };
        match serde_json::from_slice::<Snapshot>(encoded) {
            Ok(snapshot) => match store::apply_snapshot(self.db.connection(), &snapshot) {
                Ok(()) => log::warn!("restored store from in-memory snapshot backup"),
                Err(e) => log::error!("snapshot backup restore failed: {}", e),
            },
            Err(e) => log::error!("snapshot backup decode failed: {}", e),
        }
    }
}

enum PersistRequest {
    Persist {
        snapshot: Snapshot,
        generation: u64,
        ack: Option<SyncSender<bool>>,
    },
    Shutdown,
}

/// Handle to the persister worker thread.
///
/// The worker owns the only write-capable store handle; requests are
/// processed strictly one at a time in arrival order.
pub struct PersisterHandle {
    tx: Sender<PersistRequest>,
    worker: Option<JoinHandle<Database>>,
}

impl PersisterHandle {
    /// Spawns the worker thread that owns the store.
    pub fn spawn(db: Database) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("nimbus-persister".to_string())
            .spawn(move || run_worker(SnapshotPersister::new(db), rx))?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Fire-and-forget persist request. The caller does not learn the
    /// outcome; degradation is logged inside the worker.
    pub fn request_persist(&self, snapshot: Snapshot, generation: u64) {
        let request = PersistRequest::Persist {
            snapshot,
            generation,
            ack: None,
        };
        if self.tx.send(request).is_err() {
            log::error!("persister worker is gone; dropping persist request");
        }
    }

    /// Blocking persist, used on the shutdown path so the process is not
    /// killed mid-write. Returns the persist outcome.
    pub fn persist_blocking(&self, snapshot: Snapshot, generation: u64) -> bool {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        let request = PersistRequest::Persist {
            snapshot,
            generation,
            ack: Some(ack_tx),
        };
        if self.tx.send(request).is_err() {
            log::error!("persister worker is gone; blocking persist dropped");
            return false;
        }
        ack_rx.recv().unwrap_or(false)
    }

    /// Drains queued requests, stops the worker, and returns the store
    /// handle.
    pub fn shutdown(mut self) -> Option<Database> {
        let _ = self.tx.send(PersistRequest::Shutdown);
        self.worker.take().and_then(|w| w.join().ok())
    }
}

impl Drop for PersisterHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(PersistRequest::Shutdown);
            let _ = worker.join();
        }
    }
}

fn run_worker(mut persister: SnapshotPersister, rx: Receiver<PersistRequest>) -> Database {
    while let Ok(request) = rx.recv() {
        match request {
            PersistRequest::Persist {
                snapshot,
                generation,
                ack,
            } => {
                let ok = persister.persist(&snapshot, generation);
                if let Some(ack) = ack {
                    let _ = ack.send(ok);
                }
            }
            PersistRequest::Shutdown => break,
        }
    }
    persister.into_database()
}
