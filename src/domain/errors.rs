//! Logged application errors
//!
//! Repeats of the same message are folded into one node whose
//! `occurrences` counter and `last_context` are refreshed.

use crate::domain::find_by_key;
use crate::keys::content_key;
use crate::node::{Node, NodeType, Value};
use crate::storage::NodeRepository;
use crate::Result;

/// Record an error occurrence
pub fn log_error(repo: &mut NodeRepository, message: &str, context: Value) -> Result<Node> {
    let key = content_key(message.as_bytes());
    let mut node = match find_by_key(repo, &key, NodeType::Error)? {
        Some(node) => node,
        None => Node::new(NodeType::Error)
            .with_key(key)
            .with("message", message),
    };

    let occurrences = node.int_attr("occurrences").unwrap_or(0) + 1;
    node.set("occurrences", occurrences)?;
    node.set("last_context", context)?;
    repo.save(node)
}

/// Live error nodes, most frequent first
pub fn recent_errors(repo: &NodeRepository, limit: usize) -> Result<Vec<Node>> {
    let mut errors = repo.find_where(
        "type = ?1 AND deleted = 0 ORDER BY updated DESC",
        [NodeType::Error.as_str()],
    )?;
    errors.sort_by_key(|n| std::cmp::Reverse(n.int_attr("occurrences").unwrap_or(0)));
    errors.truncate(limit);
    Ok(errors)
}
