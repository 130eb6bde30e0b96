//! Identity keys - content hashes used for find-or-create
//!
//! The store never enforces key uniqueness; these helpers only make sure
//! every domain derives keys the same way.

/// blake3 hex digest of raw bytes
pub fn content_key(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Wiki page names are matched case-insensitively, ignoring outer whitespace
pub fn normalize_page_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Key of a wiki page
pub fn page_key(name: &str) -> String {
    content_key(normalize_page_name(name).as_bytes())
}

/// Key of a short link: the destination URL as given
pub fn link_key(url: &str) -> String {
    content_key(url.as_bytes())
}
