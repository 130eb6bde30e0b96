//! History recorder - append-only pre-update snapshots
//!
//! Before a node of a tracked type is overwritten, its currently stored
//! version is serialized (as the flat JSON form of [`Node`]), optionally
//! compressed, and appended to `nodes_history` keyed by the node id and the
//! snapshot's own `updated` timestamp.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::node::{Node, NodeId};
use crate::{Error, Result};

use super::repository::fetch;

#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 3;

/// Compression applied to history payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd,
}

impl Compression {
    /// One-character tag stored next to the payload
    pub fn tag(&self) -> &'static str {
        match self {
            Compression::None => "n",
            Compression::Zstd => "z",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "n" => Ok(Compression::None),
            "z" => Ok(Compression::Zstd),
            _ => Err(Error::Codec(format!("unknown history compression tag '{}'", tag))),
        }
    }

    /// Resolve a configured algorithm name.
    ///
    /// Unknown names, and `zstd` when the crate is built without the `zstd`
    /// feature, degrade to [`Compression::None`] with a warning.
    pub fn resolve(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "" | "none" | "off" => Compression::None,
            "zstd" | "zst" => {
                if cfg!(feature = "zstd") {
                    Compression::Zstd
                } else {
                    tracing::warn!("zstd history compression is not available in this build, storing uncompressed");
                    Compression::None
                }
            }
            other => {
                tracing::warn!("Unknown history compression '{}', storing uncompressed", other);
                Compression::None
            }
        }
    }

    fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data),
            #[cfg(feature = "zstd")]
            Compression::Zstd => Ok(zstd::encode_all(data.as_slice(), ZSTD_LEVEL)?),
            #[cfg(not(feature = "zstd"))]
            Compression::Zstd => Err(Error::Codec("zstd support is not compiled in".to_string())),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            #[cfg(feature = "zstd")]
            Compression::Zstd => zstd::decode_all(data)
                .map_err(|e| Error::Codec(format!("corrupt zstd history payload: {}", e))),
            #[cfg(not(feature = "zstd"))]
            Compression::Zstd => Err(Error::Codec("zstd support is not compiled in".to_string())),
        }
    }
}

/// Append a snapshot of the stored version of `id`.
///
/// Returns `false` without writing when no row exists for `id` yet.
pub fn record(conn: &Connection, id: NodeId, compression: Compression) -> Result<bool> {
    let Some(prior) = fetch(conn, id)? else {
        return Ok(false);
    };

    let payload = serde_json::to_vec(&prior)?;
    let contents = compression.compress(payload)?;

    conn.execute(
        r#"
        INSERT INTO nodes_history (node_id, updated, contents, compression)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![id, prior.updated, contents, compression.tag()],
    )?;

    tracing::debug!("Recorded history for {} node {}", prior.node_type, id);
    Ok(true)
}

/// One stored snapshot
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub node_id: NodeId,
    /// `updated` timestamp of the version captured
    pub updated: DateTime<Utc>,
    pub contents: Vec<u8>,
    pub compression: String,
}

impl HistoryEntry {
    /// Decompress and deserialize the captured node
    pub fn decode(&self) -> Result<Node> {
        let compression = Compression::from_tag(&self.compression)?;
        let raw = compression.decompress(&self.contents)?;
        serde_json::from_slice(&raw).map_err(|e| {
            Error::Codec(format!("corrupt history entry {}: {}", self.id, e))
        })
    }
}

/// Snapshots of a node, newest first
pub fn entries(conn: &Connection, node_id: NodeId) -> Result<Vec<HistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, node_id, updated, contents, compression FROM nodes_history WHERE node_id = ?1 ORDER BY id DESC",
    )?;

    let entries = stmt
        .query_map([node_id], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                node_id: row.get(1)?,
                updated: row.get(2)?,
                contents: row.get(3)?,
                compression: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries)
}

/// Count all history rows
pub fn count(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes_history", [], |row| row.get(0))?;
    Ok(count as usize)
}
