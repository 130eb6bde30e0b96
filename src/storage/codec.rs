//! Attribute packing codec
//!
//! Splits a [`Node`] into the fixed columns of the `nodes` table plus one
//! JSON overflow column (`attributes`), and reverses the split on read.
//! Fixed attributes can never be shadowed by overflow keys: reserved names
//! are kept out of the overflow map in both directions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::node::{is_fixed_field, Node, NodeId, NodeType, Value};
use crate::{Error, Result};

/// Column list matching [`NodeRow::from_row`]
pub const NODE_COLUMNS: &str =
    r#"id, parent, lb, rb, type, created, updated, "key", deleted, published, attributes"#;

/// A node in its stored shape: one value per column
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRow {
    pub id: Option<NodeId>,
    pub parent: Option<NodeId>,
    pub lb: Option<i64>,
    pub rb: Option<i64>,
    pub node_type: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub key: Option<String>,
    pub deleted: bool,
    pub published: bool,
    /// JSON object of overflow attributes, `None` when there are none
    pub attributes: Option<String>,
}

impl NodeRow {
    /// Read a row selected with [`NODE_COLUMNS`]
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent: row.get(1)?,
            lb: row.get(2)?,
            rb: row.get(3)?,
            node_type: row.get(4)?,
            created: row.get(5)?,
            updated: row.get(6)?,
            key: row.get(7)?,
            deleted: row.get(8)?,
            published: row.get(9)?,
            attributes: row.get(10)?,
        })
    }
}

/// Pack a node into its row form.
///
/// Empty-string and null overflow values are dropped, an empty key becomes
/// NULL, and an empty overflow map becomes a NULL column.
pub fn encode(node: &Node) -> Result<NodeRow> {
    let mut overflow: BTreeMap<&str, &Value> = BTreeMap::new();
    for (name, value) in &node.attrs {
        if is_fixed_field(name) {
            tracing::warn!(
                "Dropping overflow attribute '{}' on {} node: name is a fixed column",
                name,
                node.node_type
            );
            continue;
        }
        if is_empty(value) {
            continue;
        }
        overflow.insert(name.as_str(), value);
    }

    let attributes = if overflow.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&overflow)?)
    };

    Ok(NodeRow {
        id: node.id,
        parent: node.parent,
        lb: node.lb,
        rb: node.rb,
        node_type: node.node_type.as_str().to_string(),
        created: node.created,
        updated: node.updated,
        key: node.key.clone().filter(|k| !k.is_empty()),
        deleted: node.deleted,
        published: node.published,
        attributes,
    })
}

/// Unpack a stored row into a node.
///
/// A blob that is not a JSON object cannot be turned back into the node's
/// attributes, so it is reported as a fatal [`Error::Codec`].
pub fn decode(row: NodeRow) -> Result<Node> {
    let node_type: NodeType = row.node_type.parse()?;

    let mut attrs = BTreeMap::new();
    if let Some(blob) = row.attributes.as_deref() {
        let parsed: Value = serde_json::from_str(blob).map_err(|e| {
            Error::Codec(format!("corrupt attributes on node {:?}: {}", row.id, e))
        })?;
        let Value::Object(map) = parsed else {
            return Err(Error::Codec(format!(
                "attributes on node {:?} are not an object",
                row.id
            )));
        };
        attrs.extend(map.into_iter().filter(|(name, _)| !is_fixed_field(name)));
    }

    Ok(Node {
        id: row.id,
        parent: row.parent,
        lb: row.lb,
        rb: row.rb,
        node_type,
        created: row.created,
        updated: row.updated,
        key: row.key,
        deleted: row.deleted,
        published: row.published,
        attrs,
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
