//! Persistence for the Microcosm world engine.
//!
//! A background worker owns the SQLite connection and the simulation
//! talks to it through channels, so storage never blocks a tick. The
//! JSONL archive is an optional flat transcript alongside the database.

pub mod archive;
pub mod error;
pub mod storage;

pub use archive::EventArchive;
pub use error::{IoError, Result};
pub use storage::{Controls, EventQuery, SqliteLedger, StorageEventSink, StorageManager};
