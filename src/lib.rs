//! `markdir`: a durable bookmark store with a small query language.
//!
//! - `store` owns the authoritative bookmark set and its timestamp rules.
//! - `query` compiles `action:arg` terms into pipelines over a snapshot.
//! - `server` and `cli` are thin surfaces over both.

pub mod cli;
pub mod logging;
pub mod models;
pub mod query;
pub mod server;
pub mod store;
