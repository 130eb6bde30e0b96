//! Secondary index synchronizer
//!
//! Each indexed node type owns a `nodes_{type}_idx(id, field_1..field_n)`
//! table: a denormalized projection of configured attributes so callers can
//! filter on them in SQL without decoding overflow blobs. Rows are replaced
//! wholesale (delete, then insert) after every save.

use std::collections::HashSet;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

use crate::node::{Node, NodeType, Value};
use crate::registry::TypeProfile;
use crate::Result;

use super::repository::fetch_where;
use super::schema;

/// Name of the index table for a type
pub fn index_table(node_type: NodeType) -> String {
    format!("nodes_{}_idx", node_type.as_str())
}

/// Create the index table, adding any columns a config change introduced
pub fn ensure_table(conn: &Connection, node_type: NodeType, fields: &[String]) -> Result<()> {
    let table = index_table(node_type);
    conn.execute(&schema::create_index_table(&table, fields), [])?;

    let existing = existing_columns(conn, &table)?;
    for field in fields.iter().filter(|f| !existing.contains(*f)) {
        conn.execute(&format!("ALTER TABLE {} ADD COLUMN \"{}\"", table, field), [])?;
        tracing::info!("Added column '{}' to {}", field, table);
    }
    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(columns)
}

/// Replace the index row of a saved node.
///
/// Types without index fields are skipped. Absent attributes are stored as
/// NULL.
pub fn sync(conn: &Connection, node: &Node, profile: &TypeProfile) -> Result<()> {
    if !profile.is_indexed() {
        return Ok(());
    }
    let Some(id) = node.id else {
        return Ok(());
    };

    let table = index_table(node.node_type);
    conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;

    let columns: Vec<String> = profile
        .index_fields
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} (id, {}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut values = vec![SqlValue::Integer(id)];
    values.extend(profile.index_fields.iter().map(|f| to_sql_value(&node.field(f))));
    conn.execute(&sql, params_from_iter(values))?;

    Ok(())
}

/// Drop a node's row from the index table of `node_type`.
///
/// Used when an update moves a node to another type.
pub fn remove(conn: &Connection, node_type: NodeType, id: i64, profile: &TypeProfile) -> Result<()> {
    if profile.is_indexed() {
        let table = index_table(node_type);
        conn.execute(&format!("DELETE FROM {} WHERE id = ?1", table), [id])?;
        tracing::debug!("Removed node {} from {}", id, table);
    }
    Ok(())
}

/// Rebuild the whole index table of a type from the `nodes` table.
///
/// Repairs rows left stale by writes that bypassed `save`. Returns the
/// number of rows written.
pub fn rebuild(conn: &Connection, node_type: NodeType, profile: &TypeProfile) -> Result<usize> {
    if !profile.is_indexed() {
        return Ok(0);
    }

    conn.execute(&format!("DELETE FROM {}", index_table(node_type)), [])?;

    let nodes = fetch_where(conn, "type = ?1 ORDER BY id", [node_type.as_str()])?;
    for node in &nodes {
        sync(conn, node, profile)?;
    }

    tracing::info!("Rebuilt {} with {} rows", index_table(node_type), nodes.len());
    Ok(nodes.len())
}

/// Map an attribute onto the SQLite storage class it is compared as.
///
/// Lists and maps are stored as their JSON text.
pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::storage::NodeRepository;
    use rusqlite::OptionalExtension;
    use serde_json::json;

    fn user_repo() -> NodeRepository {
        let config = StoreConfig::default().with_index("user", &["email", "login"]);
        NodeRepository::open_in_memory(&config).unwrap()
    }

    fn index_row(repo: &NodeRepository, id: i64) -> Option<(Option<String>, Option<String>)> {
        repo.connection()
            .query_row(
                "SELECT email, login FROM nodes_user_idx WHERE id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .unwrap()
    }

    #[test]
    fn test_index_row_reflects_latest_save() {
        let mut repo = user_repo();
        let user = repo
            .save(Node::new(NodeType::User).with("email", "a@example.com").with("login", "alice"))
            .unwrap();
        let id = user.id.unwrap();

        assert_eq!(
            index_row(&repo, id),
            Some((Some("a@example.com".into()), Some("alice".into())))
        );

        let mut user = user.with("email", "alice@example.com");
        user.remove("login");
        repo.save(user).unwrap();

        assert_eq!(
            index_row(&repo, id),
            Some((Some("alice@example.com".into()), None))
        );
        let rows: i64 = repo
            .connection()
            .query_row("SELECT COUNT(*) FROM nodes_user_idx", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_type_change_drops_old_index_row() {
        let mut repo = user_repo();
        let mut node = repo
            .save(Node::new(NodeType::User).with("email", "a@example.com"))
            .unwrap();
        let id = node.id.unwrap();
        assert!(index_row(&repo, id).is_some());

        node.node_type = NodeType::Wiki;
        let node = repo.save(node).unwrap();

        assert_eq!(node.node_type, NodeType::Wiki);
        assert_eq!(index_row(&repo, id), None);
    }

    #[test]
    fn test_unindexed_type_has_no_table() {
        let mut repo = user_repo();
        repo.save(Node::new(NodeType::Wiki).with("name", "Home")).unwrap();

        let tables: i64 = repo
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'nodes_wiki_idx'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[test]
    fn test_rebuild_repairs_stale_rows() {
        let mut repo = user_repo();
        let user = repo
            .save(Node::new(NodeType::User).with("email", "a@example.com"))
            .unwrap();
        let id = user.id.unwrap();

        repo.connection()
            .execute("DELETE FROM nodes_user_idx", [])
            .unwrap();
        assert_eq!(index_row(&repo, id), None);

        assert_eq!(repo.reindex(NodeType::User).unwrap(), 1);
        assert_eq!(index_row(&repo, id), Some((Some("a@example.com".into()), None)));
    }

    #[test]
    fn test_config_change_adds_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.db");

        let config = StoreConfig::default().with_index("link", &["url"]);
        let mut repo = NodeRepository::open(&path, &config).unwrap();
        let link = repo
            .save(Node::new(NodeType::Link).with("url", "https://example.com").with("hits", 4))
            .unwrap();
        drop(repo);

        let config = StoreConfig::default().with_index("link", &["url", "hits"]);
        let mut repo = NodeRepository::open(&path, &config).unwrap();
        repo.reindex(NodeType::Link).unwrap();

        let hits: i64 = repo
            .connection()
            .query_row(
                "SELECT hits FROM nodes_link_idx WHERE id = ?1",
                [link.id.unwrap()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 4);
    }

    #[test]
    fn test_sql_value_mapping() {
        assert_eq!(to_sql_value(&json!(null)), SqlValue::Null);
        assert_eq!(to_sql_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(to_sql_value(&json!(12)), SqlValue::Integer(12));
        assert_eq!(to_sql_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(to_sql_value(&json!("x")), SqlValue::Text("x".into()));
        assert_eq!(to_sql_value(&json!(["a"])), SqlValue::Text(r#"["a"]"#.into()));
    }
}
