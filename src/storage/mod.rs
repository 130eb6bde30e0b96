//! Storage Layer - SQLite-backed node persistence
//!
//! System of record is SQLite with tables:
//! - nodes(id, parent, lb, rb, type, created, updated, key, deleted, published, attributes)
//! - nodes_{type}_idx(id, field_1..field_n) per indexed type
//! - nodes_history(node_id, updated, contents, compression)
//! - node_counters(name, value)

pub mod codec;
pub mod history;
pub mod index;
pub mod repository;
pub mod schema;

pub use history::{Compression, HistoryEntry};
pub use repository::{NodeRepository, OnMissing, SaveOutcome, Saved, StoreStats};
