//! SQLite node repository
//!
//! The one CRUD surface the rest of the application talks to. Reads decode
//! rows through the packing codec; `save` composes the codec, the history
//! recorder and the index synchronizer inside a savepoint.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params};

use crate::config::StoreConfig;
use crate::node::{Node, NodeId, NodeType};
use crate::registry::TypeRegistry;
use crate::{Error, Result};

use super::codec::{self, NodeRow, NODE_COLUMNS};
use super::history::{self, HistoryEntry};
use super::{index, schema};

/// What to do when an update by id finds no row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMissing {
    /// Write nothing and report [`SaveOutcome::NotFound`]
    #[default]
    Fail,
    /// Insert the node under its existing id
    Reinsert,
}

/// Result of a write, tagged by what actually happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(NodeId),
    Updated(NodeId),
    /// The id had no row and was inserted again ([`OnMissing::Reinsert`])
    Reinserted(NodeId),
    /// The id had no row and nothing was written ([`OnMissing::Fail`])
    NotFound(NodeId),
}

impl SaveOutcome {
    pub fn id(&self) -> NodeId {
        match self {
            SaveOutcome::Inserted(id)
            | SaveOutcome::Updated(id)
            | SaveOutcome::Reinserted(id)
            | SaveOutcome::NotFound(id) => *id,
        }
    }

    pub fn is_written(&self) -> bool {
        !matches!(self, SaveOutcome::NotFound(_))
    }
}

/// A node after [`NodeRepository::save_with`], with the write outcome
#[derive(Debug, Clone)]
pub struct Saved {
    pub node: Node,
    pub outcome: SaveOutcome,
}

/// SQLite-backed node storage
pub struct NodeRepository {
    conn: Connection,
    registry: TypeRegistry,
}

impl NodeRepository {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, config)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: &StoreConfig) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        let store = Self {
            conn,
            registry: TypeRegistry::from_config(config),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema, including index tables for configured types
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        for (node_type, profile) in self.registry.indexed_types() {
            index::ensure_table(&self.conn, node_type, &profile.index_fields)?;
        }
        Ok(())
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Underlying connection, for callers that query index tables directly
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ========== Reads ==========

    /// Get a node by id
    pub fn get(&self, id: NodeId) -> Result<Option<Node>> {
        fetch(&self.conn, id)
    }

    /// Get the node with the given key; the lowest id wins on duplicates
    pub fn get_by_key(&self, key: &str) -> Result<Option<Node>> {
        let nodes = fetch_where(&self.conn, r#""key" = ?1 ORDER BY id ASC LIMIT 1"#, [key])?;
        Ok(nodes.into_iter().next())
    }

    /// Find nodes matching a raw SQL predicate over the `nodes` columns.
    ///
    /// The predicate may end in `ORDER BY`/`LIMIT` clauses; an empty
    /// predicate matches every row. Overflow attributes are not columns; filter
    /// on them through an index table subquery.
    pub fn find_where<P: Params>(&self, predicate: &str, params: P) -> Result<Vec<Node>> {
        fetch_where(&self.conn, predicate, params)
    }

    /// Like [`find_where`](Self::find_where), mapping each node and dropping `None`s
    pub fn find_map<P, T, F>(&self, predicate: &str, params: P, mapper: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(Node) -> Option<T>,
    {
        let nodes = fetch_where(&self.conn, predicate, params)?;
        Ok(nodes.into_iter().filter_map(mapper).collect())
    }

    /// Count nodes matching a raw SQL predicate
    pub fn count<P: Params>(&self, predicate: &str, params: P) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM nodes WHERE {}", where_clause(predicate));
        let count: i64 = self.conn.query_row(&sql, params, |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Snapshots recorded for a node, newest first
    pub fn history(&self, id: NodeId) -> Result<Vec<HistoryEntry>> {
        history::entries(&self.conn, id)
    }

    // ========== Writes ==========

    /// Insert or update a node and return it as stored.
    ///
    /// An update whose id has no row fails with [`Error::NodeNotFound`] and
    /// writes nothing; use [`save_with`](Self::save_with) to choose another
    /// policy.
    pub fn save(&mut self, node: Node) -> Result<Node> {
        let saved = self.save_with(node, OnMissing::Fail)?;
        match saved.outcome {
            SaveOutcome::NotFound(id) => Err(Error::NodeNotFound(id)),
            _ => Ok(saved.node),
        }
    }

    /// Insert or update a node.
    ///
    /// - `created` comes from the stored row on update; new nodes keep the
    ///   caller's value or get now
    /// - `updated` is refreshed and always moves past its previous value
    /// - `lb`/`rb` are allocated from the interval counter when absent
    /// - tracked types append a snapshot of the stored version before the update
    /// - the index row of the type is replaced after the write
    ///
    /// All steps run in one savepoint; an error, or a
    /// [`SaveOutcome::NotFound`], leaves the database untouched.
    pub fn save_with(&mut self, node: Node, on_missing: OnMissing) -> Result<Saved> {
        let incoming = node.canonicalize();
        let mut node = incoming.clone();
        let profile = self.registry.profile(node.node_type);
        let compression = self.registry.compression();

        let sp = self.conn.savepoint()?;

        let stored = match node.id {
            Some(id) => stored_header(&sp, id)?,
            None => None,
        };

        let updated = advance(node.updated, Utc::now());
        node.updated = Some(updated);
        node.created = match stored {
            Some((created, _)) => Some(created),
            None => node.created.or(Some(updated)),
        };
        if node.lb.is_none() || node.rb.is_none() {
            let (lb, rb) = allocate_interval(&sp)?;
            node.lb = Some(lb);
            node.rb = Some(rb);
        }

        let outcome = match node.id {
            None => {
                let id = insert_row(&sp, &codec::encode(&node)?)?;
                node.id = Some(id);
                SaveOutcome::Inserted(id)
            }
            Some(id) => {
                if profile.tracks_history {
                    history::record(&sp, id, compression)?;
                }
                let row = codec::encode(&node)?;
                if update_row(&sp, &row)? > 0 {
                    SaveOutcome::Updated(id)
                } else {
                    match on_missing {
                        OnMissing::Fail => {
                            tracing::warn!("Update of {} node {} matched no row", node.node_type, id);
                            // Dropping the savepoint rolls back the interval allocation.
                            return Ok(Saved {
                                node: incoming,
                                outcome: SaveOutcome::NotFound(id),
                            });
                        }
                        OnMissing::Reinsert => {
                            tracing::warn!("Re-inserting missing {} node {}", node.node_type, id);
                            insert_row(&sp, &row)?;
                            SaveOutcome::Reinserted(id)
                        }
                    }
                }
            }
        };

        if let Some((_, previous_type)) = stored {
            if previous_type != node.node_type {
                index::remove(&sp, previous_type, outcome.id(), self.registry.profile(previous_type))?;
            }
        }
        index::sync(&sp, &node, profile)?;
        sp.commit()?;

        tracing::debug!("Saved {} node {} ({:?})", node.node_type, outcome.id(), outcome);
        Ok(Saved { node, outcome })
    }

    /// Rebuild the secondary index table of a type; returns rows written
    pub fn reindex(&mut self, node_type: NodeType) -> Result<usize> {
        let profile = self.registry.profile(node_type);
        let sp = self.conn.savepoint()?;
        let rows = index::rebuild(&sp, node_type, profile)?;
        sp.commit()?;
        Ok(rows)
    }

    // ========== Transactions ==========

    /// Begin a transaction around several saves
    pub fn begin_transaction(&mut self) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", [])?;
        Ok(())
    }

    /// Commit a transaction
    pub fn commit(&mut self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }

    /// Rollback a transaction
    pub fn rollback(&mut self) -> Result<()> {
        self.conn.execute("ROLLBACK", [])?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        let mut by_type = Vec::new();
        for node_type in NodeType::all() {
            let count = self.count("type = ?1", [node_type.as_str()])?;
            by_type.push((*node_type, count));
        }

        Ok(StoreStats {
            nodes: self.count("", [])?,
            deleted: self.count("deleted = 1", [])?,
            by_type,
            history: history::count(&self.conn)?,
        })
    }
}

/// Fetch and decode one node
pub(crate) fn fetch(conn: &Connection, id: NodeId) -> Result<Option<Node>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
            [id],
            NodeRow::from_row,
        )
        .optional()?;
    row.map(codec::decode).transpose()
}

/// Fetch and decode every node matching a predicate
pub(crate) fn fetch_where<P: Params>(conn: &Connection, predicate: &str, params: P) -> Result<Vec<Node>> {
    let sql = format!("SELECT {} FROM nodes WHERE {}", NODE_COLUMNS, where_clause(predicate));
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params, NodeRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter().map(codec::decode).collect()
}

/// Turn a caller predicate into a WHERE body.
///
/// `""` and clause-only predicates like `"ORDER BY id LIMIT 5"` get a
/// match-all condition in front.
fn where_clause(predicate: &str) -> String {
    let trimmed = predicate.trim();
    let upper = trimmed.to_uppercase();
    if trimmed.is_empty() {
        "1".to_string()
    } else if upper.starts_with("ORDER ") || upper.starts_with("LIMIT ") {
        format!("1 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Next `updated` value: now, but strictly after the previous one
fn advance(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if prev >= now => prev + chrono::Duration::microseconds(1),
        _ => now,
    }
}

/// `created` and type of the stored row, if there is one
fn stored_header(conn: &Connection, id: NodeId) -> Result<Option<(DateTime<Utc>, NodeType)>> {
    let header = conn
        .query_row("SELECT created, type FROM nodes WHERE id = ?1", [id], |row| {
            Ok((row.get::<_, DateTime<Utc>>(0)?, row.get::<_, String>(1)?))
        })
        .optional()?;
    match header {
        Some((created, node_type)) => Ok(Some((created, node_type.parse()?))),
        None => Ok(None),
    }
}

/// Take the next `(lb, rb)` pair from the interval counter.
///
/// The increment and read are one statement, so concurrent writers can never
/// be handed the same pair.
fn allocate_interval(conn: &Connection) -> Result<(i64, i64)> {
    let rb: i64 = conn.query_row(
        "UPDATE node_counters SET value = value + 2 WHERE name = 'interval' RETURNING value",
        [],
        |row| row.get(0),
    )?;
    Ok((rb - 1, rb))
}

fn insert_row(conn: &Connection, row: &NodeRow) -> Result<NodeId> {
    conn.execute(
        r#"
        INSERT INTO nodes (id, parent, lb, rb, type, created, updated, "key", deleted, published, attributes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            row.id,
            row.parent,
            row.lb,
            row.rb,
            row.node_type,
            row.created,
            row.updated,
            row.key,
            row.deleted,
            row.published,
            row.attributes,
        ],
    )?;
    Ok(row.id.unwrap_or_else(|| conn.last_insert_rowid()))
}

/// Update every column except `id` and `created`; returns rows affected
fn update_row(conn: &Connection, row: &NodeRow) -> Result<usize> {
    let changed = conn.execute(
        r#"
        UPDATE nodes
        SET parent = ?2, lb = ?3, rb = ?4, type = ?5, updated = ?6, "key" = ?7,
            deleted = ?8, published = ?9, attributes = ?10
        WHERE id = ?1
        "#,
        params![
            row.id,
            row.parent,
            row.lb,
            row.rb,
            row.node_type,
            row.updated,
            row.key,
            row.deleted,
            row.published,
            row.attributes,
        ],
    )?;
    Ok(changed)
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub nodes: usize,
    pub deleted: usize,
    pub by_type: Vec<(NodeType, usize)>,
    pub history: usize,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Nodes: {} ({} deleted)", self.nodes, self.deleted)?;
        for (node_type, count) in &self.by_type {
            writeln!(f, "    {}: {}", node_type, count)?;
        }
        write!(f, "  History entries: {}", self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryTypes;

    fn repo() -> NodeRepository {
        let config = StoreConfig::default()
            .with_index("user", &["email"])
            .with_history(HistoryTypes::Types(vec!["wiki".into()]), "none");
        NodeRepository::open_in_memory(&config).unwrap()
    }

    fn wiki(name: &str) -> Node {
        Node::new(NodeType::Wiki).with("name", name).with("source", "# Hi")
    }

    #[test]
    fn test_new_node_creation() {
        let mut repo = repo();
        let saved = repo.save(wiki("Test")).unwrap();

        let id = saved.id.unwrap();
        assert_eq!(saved.created, saved.updated);
        assert!(saved.created.is_some());

        let fetched = repo.get(id).unwrap().unwrap();
        assert_eq!(fetched, saved);
        assert_eq!(fetched.str_attr("name"), Some("Test"));
        assert_eq!(fetched.str_attr("source"), Some("# Hi"));
        assert!(!fetched.deleted);
        assert!(!fetched.published);

        let second = repo.save(wiki("Other")).unwrap();
        assert!(second.id.unwrap() > id);
    }

    #[test]
    fn test_get_missing_is_none() {
        let repo = repo();
        assert!(repo.get(12345).unwrap().is_none());
        assert!(repo.get_by_key("nope").unwrap().is_none());
    }

    #[test]
    fn test_idempotent_resave_only_touches_updated() {
        let mut repo = repo();
        let first = repo.save(wiki("Test")).unwrap();
        let second = repo.save(first.clone()).unwrap();

        assert!(second.updated > first.updated);
        let mut expected = first.clone();
        expected.updated = second.updated;
        assert_eq!(second, expected);
        assert_eq!(repo.get(first.id.unwrap()).unwrap().unwrap(), second);
    }

    #[test]
    fn test_update_keeps_created() {
        let mut repo = repo();
        let first = repo.save(wiki("Test")).unwrap();

        let mut changed = first.clone().with("source", "# Changed");
        changed.created = None;
        let second = repo.save(changed).unwrap();

        assert_eq!(second.created, first.created);
        assert!(second.updated > first.updated);
        assert_eq!(second.lb, first.lb);
        assert_eq!(second.rb, first.rb);
        assert_eq!(
            repo.get(first.id.unwrap()).unwrap().unwrap().str_attr("source"),
            Some("# Changed")
        );
    }

    #[test]
    fn test_update_ignores_caller_created() {
        let mut repo = repo();
        let first = repo.save(wiki("Test")).unwrap();

        let mut changed = first.clone().with("source", "# Backdated");
        changed.created = first.created.map(|c| c - chrono::Duration::days(30));
        let returned = repo.save(changed).unwrap();

        assert_eq!(returned.created, first.created);
        assert_eq!(repo.get(first.id.unwrap()).unwrap().unwrap(), returned);
    }

    #[test]
    fn test_duplicate_key_returns_lowest_id() {
        let mut repo = repo();
        let a = repo.save(wiki("A").with_key("same")).unwrap();
        let b = repo.save(wiki("B").with_key("same")).unwrap();
        assert!(a.id < b.id);

        let found = repo.get_by_key("same").unwrap().unwrap();
        assert_eq!(found.id, a.id);
        assert_eq!(repo.count(r#""key" = ?1"#, ["same"]).unwrap(), 2);
    }

    #[test]
    fn test_history_for_tracked_type() {
        let mut repo = repo();
        let original = repo.save(wiki("Test")).unwrap();
        assert!(repo.history(original.id.unwrap()).unwrap().is_empty());

        repo.save(original.clone().with("source", "# Edited")).unwrap();

        let entries = repo.history(original.id.unwrap()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].decode().unwrap(), original);
    }

    #[test]
    fn test_no_history_for_untracked_type() {
        let mut repo = repo();
        let link = repo
            .save(Node::new(NodeType::Link).with("url", "https://example.com"))
            .unwrap();
        repo.save(link.clone().with("hits", 1)).unwrap();

        assert!(repo.history(link.id.unwrap()).unwrap().is_empty());
        assert_eq!(repo.stats().unwrap().history, 0);
    }

    #[test]
    fn test_update_of_missing_row_fails_without_writing() {
        let mut repo = repo();
        let before = repo.stats().unwrap();

        let mut ghost = wiki("Ghost");
        ghost.id = Some(777);

        let saved = repo.save_with(ghost.clone(), OnMissing::Fail).unwrap();
        assert_eq!(saved.outcome, SaveOutcome::NotFound(777));
        assert!(!saved.outcome.is_written());
        assert_eq!(saved.node, ghost);
        assert!(repo.get(777).unwrap().is_none());

        assert!(matches!(repo.save(ghost), Err(Error::NodeNotFound(777))));
        assert_eq!(repo.stats().unwrap().nodes, before.nodes);

        // The rolled back savepoint must not have consumed an interval.
        let next = repo.save(wiki("Next")).unwrap();
        assert_eq!(next.lb, Some(1));
    }

    #[test]
    fn test_update_of_missing_row_can_reinsert() {
        let mut repo = repo();
        let mut ghost = wiki("Ghost");
        ghost.id = Some(777);

        let saved = repo.save_with(ghost, OnMissing::Reinsert).unwrap();
        assert_eq!(saved.outcome, SaveOutcome::Reinserted(777));

        let fetched = repo.get(777).unwrap().unwrap();
        assert_eq!(fetched.str_attr("name"), Some("Ghost"));
        assert_eq!(fetched, saved.node);

        // Autoincrement continues past the reinserted id.
        let fresh = repo.save(wiki("Fresh")).unwrap();
        assert!(fresh.id.unwrap() > 777);
    }

    #[test]
    fn test_intervals_are_appended() {
        let mut repo = repo();
        let a = repo.save(wiki("A")).unwrap();
        let b = repo.save(wiki("B")).unwrap();

        assert_eq!((a.lb, a.rb), (Some(1), Some(2)));
        assert_eq!((b.lb, b.rb), (Some(3), Some(4)));
    }

    #[test]
    fn test_interval_counter_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.db");
        let config = StoreConfig::default();

        let mut repo = NodeRepository::open(&path, &config).unwrap();
        repo.save(wiki("A")).unwrap();
        drop(repo);

        let mut repo = NodeRepository::open(&path, &config).unwrap();
        let b = repo.save(wiki("B")).unwrap();
        assert_eq!((b.lb, b.rb), (Some(3), Some(4)));
    }

    #[test]
    fn test_soft_delete() {
        let mut repo = repo();
        let mut node = repo.save(wiki("Gone")).unwrap();
        node.deleted = true;
        repo.save(node.clone()).unwrap();

        assert!(repo.get(node.id.unwrap()).unwrap().unwrap().deleted);
        assert_eq!(repo.count("deleted = 0", []).unwrap(), 0);
        assert_eq!(repo.count("", []).unwrap(), 1);
    }

    #[test]
    fn test_find_where_and_map() {
        let mut repo = repo();
        for name in ["A", "B", "C"] {
            repo.save(wiki(name)).unwrap();
        }
        repo.save(Node::new(NodeType::Link).with("url", "https://example.com"))
            .unwrap();

        let pages = repo.find_where("type = ?1 ORDER BY id", ["wiki"]).unwrap();
        assert_eq!(pages.len(), 3);

        let names = repo
            .find_map("type = ?1 ORDER BY id", ["wiki"], |n| {
                n.str_attr("name").filter(|s| *s != "B").map(str::to_string)
            })
            .unwrap();
        assert_eq!(names, vec!["A", "C"]);

        assert_eq!(repo.find_where("ORDER BY id DESC LIMIT 2", []).unwrap().len(), 2);
        assert_eq!(repo.count("type = ?1", ["link"]).unwrap(), 1);
    }

    #[test]
    fn test_filter_through_index_subquery() {
        let mut repo = repo();
        repo.save(Node::new(NodeType::User).with("email", "a@example.com"))
            .unwrap();
        let b = repo
            .save(Node::new(NodeType::User).with("email", "b@example.com"))
            .unwrap();

        let found = repo
            .find_where(
                "id IN (SELECT id FROM nodes_user_idx WHERE email = ?1)",
                ["b@example.com"],
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, b.id);
    }

    #[test]
    fn test_corrupt_overflow_surfaces_on_read() {
        let mut repo = repo();
        let node = repo.save(wiki("Broken")).unwrap();
        let id = node.id.unwrap();

        repo.connection()
            .execute("UPDATE nodes SET attributes = '{oops' WHERE id = ?1", params![id])
            .unwrap();

        assert!(matches!(repo.get(id), Err(Error::Codec(_))));
        assert!(matches!(repo.find_where("", []), Err(Error::Codec(_))));
    }

    #[test]
    fn test_caller_transaction_rollback() {
        let mut repo = repo();
        repo.begin_transaction().unwrap();
        repo.save(wiki("Draft")).unwrap();
        assert_eq!(repo.count("", []).unwrap(), 1);
        repo.rollback().unwrap();

        assert_eq!(repo.count("", []).unwrap(), 0);
    }

    #[test]
    fn test_stats_counts_per_type() {
        let mut repo = repo();
        repo.save(wiki("A")).unwrap();
        repo.save(Node::new(NodeType::User).with("email", "a@example.com"))
            .unwrap();

        let stats = repo.stats().unwrap();
        assert_eq!(stats.nodes, 2);
        assert!(stats.by_type.contains(&(NodeType::Wiki, 1)));
        assert!(stats.by_type.contains(&(NodeType::User, 1)));
        assert!(stats.to_string().contains("Nodes: 2"));
    }
}
