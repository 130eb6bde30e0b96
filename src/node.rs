//! Node types - the generic record every content kind is stored as
//!
//! A node is a type-tagged attribute map. A fixed set of attributes maps onto
//! real columns of the `nodes` table; everything else is *overflow* and
//! round-trips through one JSON column:
//! - Fixed: `id`, `parent`, `lb`, `rb`, `type`, `created`, `updated`, `key`,
//!   `deleted`, `published`
//! - Overflow: any other attribute name

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

pub use serde_json::Value;

/// Store-assigned node identity, never reused
pub type NodeId = i64;

/// Attribute names backed by a fixed column of the `nodes` table.
pub const FIXED_FIELDS: &[&str] = &[
    "id",
    "parent",
    "lb",
    "rb",
    "type",
    "created",
    "updated",
    "key",
    "deleted",
    "published",
];

/// Whether `name` is one of the fixed column attributes
pub fn is_fixed_field(name: &str) -> bool {
    FIXED_FIELDS.contains(&name)
}

/// The closed set of content kinds stored as nodes.
///
/// Per-type behavior (indexed fields, history tracking) is resolved once from
/// configuration into a [`crate::TypeProfile`] rather than matched on ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Wiki page, addressed by its normalized name
    Wiki,
    /// Uploaded file, addressed by the hash of its bytes
    File,
    /// User account, looked up by email through the secondary index
    User,
    /// Short link, addressed by the hash of its destination URL
    Link,
    /// Logged application error
    Error,
}

impl NodeType {
    /// Get the string representation stored in the `type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Wiki => "wiki",
            NodeType::File => "file",
            NodeType::User => "user",
            NodeType::Link => "link",
            NodeType::Error => "error",
        }
    }

    /// Get all node types
    pub fn all() -> &'static [NodeType] {
        &[
            NodeType::Wiki,
            NodeType::File,
            NodeType::User,
            NodeType::Link,
            NodeType::Error,
        ]
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wiki" | "page" => Ok(NodeType::Wiki),
            "file" | "upload" => Ok(NodeType::File),
            "user" | "account" => Ok(NodeType::User),
            "link" | "shortlink" => Ok(NodeType::Link),
            "error" | "err" => Ok(NodeType::Error),
            _ => Err(Error::UnknownNodeType(s.to_string())),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node: fixed attributes plus an open overflow map.
///
/// Serialized (for history payloads and JSON output) as a single flat object
/// where fixed and overflow attributes sit side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Assigned on first insert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    pub parent: Option<NodeId>,
    /// Interval bounds, allocated from a global counter on first save
    pub lb: Option<i64>,
    pub rb: Option<i64>,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    /// Opaque identity hash; not unique, lowest id wins on lookup
    pub key: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub published: bool,
    /// Overflow attributes
    #[serde(flatten)]
    pub attrs: BTreeMap<String, Value>,
}

impl Node {
    /// Create an unsaved node of the given type
    pub fn new(node_type: NodeType) -> Self {
        Self {
            id: None,
            parent: None,
            lb: None,
            rb: None,
            node_type,
            created: None,
            updated: None,
            key: None,
            deleted: false,
            published: false,
            attrs: BTreeMap::new(),
        }
    }

    /// Set an overflow attribute (builder form).
    ///
    /// Reserved names are kept out of the overflow column by the codec; use
    /// [`Node::set`] when the name comes from outside.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the identity key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the parent node
    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set an overflow attribute, rejecting fixed column names
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if is_fixed_field(name) {
            return Err(Error::ReservedAttribute(name.to_string()));
        }
        self.attrs.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Remove an overflow attribute
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attrs.remove(name)
    }

    /// Get an overflow attribute
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    /// Get an overflow attribute as a string slice
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(Value::as_str)
    }

    /// Get an overflow attribute as an integer
    pub fn int_attr(&self, name: &str) -> Option<i64> {
        self.attrs.get(name).and_then(Value::as_i64)
    }

    /// Look up any attribute, fixed or overflow, as a JSON value.
    ///
    /// Absent attributes come back as `Value::Null`.
    pub fn field(&self, name: &str) -> Value {
        match name {
            "id" => or_null(self.id),
            "parent" => or_null(self.parent),
            "lb" => or_null(self.lb),
            "rb" => or_null(self.rb),
            "type" => Value::from(self.node_type.as_str()),
            "created" => or_null(self.created.map(|t| t.to_rfc3339())),
            "updated" => or_null(self.updated.map(|t| t.to_rfc3339())),
            "key" => or_null(self.key.clone()),
            "deleted" => Value::Bool(self.deleted),
            "published" => Value::Bool(self.published),
            _ => self.attrs.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Whether the node has never been saved
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Drop empty-string and null attributes, and an empty key.
    ///
    /// This is the form a node takes after a trip through the store.
    pub fn canonicalize(mut self) -> Self {
        self.attrs.retain(|_, v| match v {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        });
        if self.key.as_deref() == Some("") {
            self.key = None;
        }
        self
    }
}

fn or_null<T: Into<Value>>(value: Option<T>) -> Value {
    value.map(Into::into).unwrap_or(Value::Null)
}
