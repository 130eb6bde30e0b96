//! Short links, one canonical code per destination URL
//!
//! The code is the node id in base 36, so it never changes once issued.

use crate::domain::find_by_key;
use crate::keys::link_key;
use crate::node::{Node, NodeId, NodeType};
use crate::storage::NodeRepository;
use crate::Result;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Short code of a link node id
pub fn encode_code(id: NodeId) -> String {
    if id <= 0 {
        return "0".to_string();
    }
    let mut n = id as u64;
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).to_string()
}

/// Node id of a short code, `None` when it is not valid base 36
pub fn decode_code(code: &str) -> Option<NodeId> {
    if code.is_empty() {
        return None;
    }
    i64::from_str_radix(&code.to_lowercase(), 36).ok()
}

/// Get or create the link for `url`, returning it with its short code.
///
/// A deleted link for the same URL is revived, so its old code works again.
pub fn shorten(repo: &mut NodeRepository, url: &str) -> Result<(Node, String)> {
    let key = link_key(url);
    let link = match find_by_key(repo, &key, NodeType::Link)? {
        Some(link) if !link.deleted => link,
        Some(mut link) => {
            tracing::debug!("Reviving deleted link {:?} for {}", link.id, url);
            link.deleted = false;
            repo.save(link)?
        }
        None => repo.save(
            Node::new(NodeType::Link)
                .with_key(key)
                .with("url", url)
                .with("hits", 0),
        )?,
    };

    let code = link.id.map(encode_code).unwrap_or_default();
    Ok((link, code))
}

/// Look up a live link by code
pub fn resolve(repo: &NodeRepository, code: &str) -> Result<Option<Node>> {
    let Some(id) = decode_code(code) else {
        return Ok(None);
    };
    Ok(repo
        .get(id)?
        .filter(|n| n.node_type == NodeType::Link && !n.deleted))
}

/// Resolve a code, count the visit, and return the destination URL
pub fn follow(repo: &mut NodeRepository, code: &str) -> Result<Option<String>> {
    let Some(mut link) = resolve(repo, code)? else {
        return Ok(None);
    };
    let hits = link.int_attr("hits").unwrap_or(0) + 1;
    link.set("hits", hits)?;
    let link = repo.save(link)?;
    Ok(link.str_attr("url").map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn repo() -> NodeRepository {
        NodeRepository::open_in_memory(&StoreConfig::default().with_index("link", &["url"])).unwrap()
    }

    #[test]
    fn test_code_roundtrip() {
        assert_eq!(encode_code(1), "1");
        assert_eq!(encode_code(35), "z");
        assert_eq!(encode_code(36), "10");
        assert_eq!(decode_code("10"), Some(36));
        assert_eq!(decode_code("Z"), Some(35));
        assert_eq!(decode_code("not-a-code"), None);
        assert_eq!(decode_code(""), None);
    }

    #[test]
    fn test_one_code_per_url() {
        let mut repo = repo();
        let (a, code_a) = shorten(&mut repo, "https://example.com/a").unwrap();
        let (again, code_again) = shorten(&mut repo, "https://example.com/a").unwrap();
        let (_, code_b) = shorten(&mut repo, "https://example.com/b").unwrap();

        assert_eq!(a.id, again.id);
        assert_eq!(code_a, code_again);
        assert_ne!(code_a, code_b);
    }

    #[test]
    fn test_follow_counts_hits() {
        let mut repo = repo();
        let (_, code) = shorten(&mut repo, "https://example.com").unwrap();

        assert_eq!(follow(&mut repo, &code).unwrap().as_deref(), Some("https://example.com"));
        follow(&mut repo, &code).unwrap();

        let link = resolve(&repo, &code).unwrap().unwrap();
        assert_eq!(link.int_attr("hits"), Some(2));
        assert!(follow(&mut repo, "zzzz").unwrap().is_none());
    }

    #[test]
    fn test_shorten_revives_deleted_link() {
        let mut repo = repo();
        let (mut link, code) = shorten(&mut repo, "https://example.com/gone").unwrap();
        link.deleted = true;
        repo.save(link).unwrap();
        assert!(resolve(&repo, &code).unwrap().is_none());

        let (revived, again) = shorten(&mut repo, "https://example.com/gone").unwrap();
        assert_eq!(again, code);
        assert!(!revived.deleted);
        assert!(resolve(&repo, &code).unwrap().is_some());
    }
}
