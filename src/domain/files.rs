//! Uploaded files, addressed by the hash of their bytes
//!
//! Only metadata is stored here; the bytes themselves live in object storage
//! under the same key.

use crate::domain::find_by_key;
use crate::keys::content_key;
use crate::node::{Node, NodeType};
use crate::storage::NodeRepository;
use crate::Result;

/// Record an upload, returning the existing node when the same bytes were
/// uploaded before. A deleted node for the same bytes is restored.
pub fn add_file(
    repo: &mut NodeRepository,
    name: &str,
    content: &[u8],
    mime_type: Option<&str>,
) -> Result<Node> {
    let key = content_key(content);
    if let Some(mut existing) = find_by_key(repo, &key, NodeType::File)? {
        tracing::debug!("Upload '{}' matches file node {:?}", name, existing.id);
        if !existing.deleted {
            return Ok(existing);
        }
        // Re-uploading deleted bytes restores the node under the new name.
        existing.deleted = false;
        existing.set("name", name)?;
        if let Some(mime_type) = mime_type {
            existing.set("mime_type", mime_type)?;
        }
        return repo.save(existing);
    }

    let mut file = Node::new(NodeType::File)
        .with_key(key)
        .with("name", name)
        .with("size", content.len() as u64);
    if let Some(mime_type) = mime_type {
        file.set("mime_type", mime_type)?;
    }
    repo.save(file)
}

/// Find the file node holding exactly these bytes
pub fn find_file(repo: &NodeRepository, content: &[u8]) -> Result<Option<Node>> {
    find_by_key(repo, &content_key(content), NodeType::File)
}
