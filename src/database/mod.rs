//! Nimbus durable-store layer.
//!
//! Provides SQLite connection management, schema migrations, the
//! snapshot reconciliation queries, and the bootstrap/backup machinery
//! used to open and recover the store at startup.
//!
//! # Usage
//!
//! ```no_run
//! use nimbus_session::database::{bootstrap, Database};
//!
//! // Open (or recover) the store at its default location
//! let db = bootstrap::open_store(&bootstrap::default_store_path())
//!     .expect("store open failed");
//!
//! // Or use an in-memory store for testing
//! let db = Database::open_in_memory().expect("failed to open in-memory store");
//!
//! let conn = db.connection();
//! ```

pub mod backup;
pub mod bootstrap;
pub mod connection;
pub mod migrations;
pub mod store;

pub use connection::Database;
