//! Wiki pages, addressed by normalized name

use crate::domain::find_by_key;
use crate::keys::page_key;
use crate::node::{Node, NodeType};
use crate::storage::NodeRepository;
use crate::Result;

/// Find a page by name (case and outer whitespace ignored)
pub fn find_page(repo: &NodeRepository, name: &str) -> Result<Option<Node>> {
    find_by_key(repo, &page_key(name), NodeType::Wiki)
}

/// Create the page or replace its source.
///
/// The first spelling of the name is kept as the display name.
pub fn save_page(repo: &mut NodeRepository, name: &str, source: &str) -> Result<Node> {
    let mut page = match find_page(repo, name)? {
        Some(page) => page,
        None => Node::new(NodeType::Wiki)
            .with_key(page_key(name))
            .with("name", name.trim()),
    };
    page.set("source", source)?;
    page.deleted = false;
    repo.save(page)
}

/// Display names of all live pages, in creation order
pub fn list_pages(repo: &NodeRepository) -> Result<Vec<String>> {
    repo.find_map("type = ?1 AND deleted = 0 ORDER BY id", [NodeType::Wiki.as_str()], |page| {
        page.str_attr("name").map(str::to_string)
    })
}
