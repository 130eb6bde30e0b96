//! Database schema definitions

/// SQL to create the nodes table
///
/// `attributes` holds the JSON overflow map; every other column is a fixed
/// node attribute.
pub const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent INTEGER,
    lb INTEGER NOT NULL,
    rb INTEGER NOT NULL,
    type TEXT NOT NULL,
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    "key" TEXT,
    deleted INTEGER NOT NULL DEFAULT 0,
    published INTEGER NOT NULL DEFAULT 0,
    attributes TEXT
)
"#;

/// SQL to create the history table
///
/// `compression` is a one-character tag: `n` (none) or `z` (zstd).
pub const CREATE_HISTORY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    node_id INTEGER NOT NULL REFERENCES nodes(id),
    updated TEXT NOT NULL,
    contents BLOB NOT NULL,
    compression TEXT NOT NULL
)
"#;

/// SQL to create the counters table
/// Holds the `interval` counter that `lb`/`rb` pairs are allocated from
pub const CREATE_COUNTERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS node_counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)
"#;

/// Seed the interval counter from existing rows (no-op once present)
pub const SEED_INTERVAL_COUNTER: &str = r#"
INSERT OR IGNORE INTO node_counters (name, value)
SELECT 'interval', COALESCE(MAX(rb), 0) FROM nodes
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    r#"CREATE INDEX IF NOT EXISTS idx_nodes_key ON nodes("key")"#,
    "CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(type)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent)",
    "CREATE INDEX IF NOT EXISTS idx_history_node ON nodes_history(node_id)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_NODES_TABLE,
        CREATE_HISTORY_TABLE,
        CREATE_COUNTERS_TABLE,
        SEED_INTERVAL_COUNTER,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}

/// SQL to create a per-type secondary index table
///
/// Columns are left untyped so each value keeps its own SQLite storage class.
pub fn create_index_table(table: &str, fields: &[String]) -> String {
    let mut columns = vec!["id INTEGER PRIMARY KEY REFERENCES nodes(id)".to_string()];
    columns.extend(fields.iter().map(|f| format!("\"{}\"", f)));
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns.join(", "))
}
