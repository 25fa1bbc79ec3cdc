//! # jwsync
//!
//! The application layer of jwsync - THE BINARY.
//!
//! - `cli`: clap commands (`merge`, `inspect`, `verify`, `server`)
//! - `api`: axum upload API over the same merge engine
//! - `config`: TOML configuration with environment overrides
//!
//! All merge semantics live in `jwsync-core`; this crate only moves bytes
//! between files, sockets and the engine.

pub mod api;
pub mod cli;
pub mod config;
