//! Terminal rendering of nodes, history entries and status lines

use crate::node::{Node, Value};
use crate::storage::HistoryEntry;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

/// Attributes tried in order for a node's one-line label
const LABEL_ATTRS: [&str; 4] = ["name", "url", "email", "message"];

pub fn header(text: &str) {
    println!("{}", text.style(theme().heading.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warning.clone()));
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().heading.clone()));
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().label.clone()), value);
}

/// `📄 [type] #id label`, with deleted nodes struck through
pub fn node_line(node: &Node) -> String {
    let id = node.id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let label = LABEL_ATTRS
        .iter()
        .find_map(|name| node.str_attr(name))
        .unwrap_or("");
    let label = if node.deleted {
        format!("{} (deleted)", label.style(theme().deleted.clone()))
    } else {
        label.to_string()
    };
    format!(
        "{} [{}] {} {}",
        Icons::NODE,
        node.node_type.style(theme().node_type.clone()),
        format!("#{}", id).style(theme().muted.clone()),
        label
    )
}

/// Print a node with its metadata and every overflow attribute
pub fn print_node(node: &Node) {
    println!("{}", node_line(node));
    if let Some(key) = &node.key {
        summary_row(&format!("{} key", Icons::KEY), key);
    }
    if let Some(parent) = node.parent {
        summary_row("parent", &parent.to_string());
    }
    if let Some(created) = node.created {
        summary_row("created", &created.to_rfc3339());
    }
    if let Some(updated) = node.updated {
        summary_row("updated", &updated.to_rfc3339());
    }
    summary_row("published", &node.published.to_string());
    for (name, value) in &node.attrs {
        summary_row(name, &attr_text(value));
    }
}

/// One line per stored version: timestamp, stored size and compression tag
pub fn history_line(entry: &HistoryEntry) -> String {
    format!(
        "  {} {} ({} bytes, {})",
        Icons::HISTORY,
        entry.updated.to_rfc3339(),
        entry.contents.len(),
        entry.compression.style(theme().muted.clone())
    )
}

/// Strings unquoted, everything else as JSON
pub fn attr_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
