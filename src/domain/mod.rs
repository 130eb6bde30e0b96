//! Domain helpers - the key-based identity convention
//!
//! Each content kind implements find-or-create on top of the repository:
//! - Wiki pages: key = hash of the normalized page name
//! - Files: key = hash of the raw bytes, so repeated uploads de-duplicate
//! - Short links: key = hash of the destination URL, one code per target
//! - Users: looked up by email through the `nodes_user_idx` table
//! - Errors: key = hash of the message, repeats counted on one node

pub mod errors;
pub mod files;
pub mod links;
pub mod users;
pub mod wiki;

use rusqlite::params;

use crate::node::{Node, NodeType};
use crate::storage::NodeRepository;
use crate::Result;

/// Lowest-id node of `node_type` carrying `key`.
///
/// Keys are shared across types, so a hit of another type falls back to a
/// typed query.
pub fn find_by_key(repo: &NodeRepository, key: &str, node_type: NodeType) -> Result<Option<Node>> {
    match repo.get_by_key(key)? {
        Some(node) if node.node_type == node_type => Ok(Some(node)),
        Some(_) => {
            let nodes = repo.find_where(
                r#""key" = ?1 AND type = ?2 ORDER BY id LIMIT 1"#,
                params![key, node_type.as_str()],
            )?;
            Ok(nodes.into_iter().next())
        }
        None => Ok(None),
    }
}
