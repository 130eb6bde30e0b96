//! # Nodestore - type-tagged node storage over SQLite
//!
//! Every content kind of the application (wiki pages, uploaded files, user
//! accounts, short links, logged errors) is persisted as a *node*: a
//! type-tagged attribute map stored as one row of the `nodes` table.
//!
//! Nodestore provides:
//! - An attribute packing codec (fixed columns plus one JSON overflow column)
//! - Per-type secondary index tables kept in sync on every save
//! - Append-only history of pre-update snapshots for configured types
//! - A repository surface: `get`, `get_by_key`, `find_where`, `count`, `save`
//! - Key-based find-or-create helpers for the consuming domains

pub mod node;
pub mod config;
pub mod registry;
pub mod storage;
pub mod keys;
pub mod domain;
pub mod ui;

// Re-exports for convenient access
pub use node::{Node, NodeId, NodeType, Value};
pub use config::StoreConfig;
pub use registry::{TypeProfile, TypeRegistry};
pub use storage::{NodeRepository, OnMissing, SaveOutcome, Saved};

/// Result type alias for Nodestore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Nodestore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Attribute is reserved for a fixed column: {0}")]
    ReservedAttribute(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User already exists: {0}")]
    UserExists(String),
}
