//! # Storage Module
//!
//! Database adapters for backup snapshots.
//!
//! The merge engine works on in-memory [`Snapshot`](crate::snapshot::Snapshot)s;
//! this module moves them in and out of the SQLite file carried by a backup
//! container.
//!
//! ## Adapters
//!
//! - `sqlite`: SQLite-backed `userData.db` via `rusqlite`

pub mod sqlite;

pub use sqlite::{LoadedDatabase, load_database, render_database};
