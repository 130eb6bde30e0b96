//! Nodestore CLI - inspect and edit a node store from the command line

use clap::{Parser, Subcommand};
use nodestore::config::{self, StoreConfig};
use nodestore::storage::NodeRepository;
use nodestore::ui::{self, Icons};
use nodestore::{Node, NodeType, OnMissing, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "nodestore")]
#[command(version)]
#[command(about = "Type-tagged node store over SQLite")]
#[command(long_about = r#"
Nodestore keeps wiki pages, files, users, short links and logged errors as
type-tagged nodes in one SQLite table, with per-type index tables and history.

Example usage:
  nodestore init
  nodestore put --type wiki --set name=Home --set "source=# Hi"
  nodestore query --where "type = ?1 ORDER BY id" --param wiki
  nodestore history 1
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "nodestore.toml")]
    config: PathBuf,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show a node by id
    Get {
        id: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the node holding a key (lowest id wins)
    Key {
        key: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// List nodes matching a SQL predicate over the nodes table
    Query {
        /// Predicate, e.g. "type = ?1 AND deleted = 0 ORDER BY id"
        #[arg(short, long, default_value = "")]
        r#where: String,

        /// Positional parameters for the predicate
        #[arg(short, long)]
        param: Vec<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Count nodes matching a SQL predicate
    Count {
        #[arg(short, long, default_value = "")]
        r#where: String,

        #[arg(short, long)]
        param: Vec<String>,
    },

    /// Create or update a node
    Put {
        /// Node type (wiki, file, user, link, error)
        #[arg(short, long)]
        r#type: String,

        /// Update this node instead of creating one
        #[arg(long)]
        id: Option<i64>,

        /// Identity key
        #[arg(short, long)]
        key: Option<String>,

        /// Attribute as name=value; values parse as JSON, else as text
        #[arg(short, long)]
        set: Vec<String>,

        /// Re-insert under --id if the node no longer exists
        #[arg(long)]
        reinsert: bool,
    },

    /// Mark a node deleted
    Delete { id: i64 },

    /// Show the stored history of a node
    History {
        id: i64,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rebuild secondary index tables
    Reindex {
        /// Only this type (default: every indexed type)
        #[arg(short, long)]
        r#type: Option<String>,
    },

    /// Show statistics about the store
    Stats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Init { force } => {
            let config = StoreConfig::starter();
            config::write_config(&cli.config, &config, force)?;

            let db_path = cli.database.unwrap_or_else(|| config.database_path());
            config::ensure_db_dir(&db_path)?;
            NodeRepository::open(&db_path, &config)?;

            ui::success(&format!("Wrote {}", cli.config.display()));
            ui::summary_row("Database", &db_path.display().to_string());
        }

        Commands::Get { id, json } => {
            let (store, _) = open_store(&cli.config, cli.database)?;
            match store.get(id)? {
                Some(node) => show_node(&node, json)?,
                None => anyhow::bail!("node {} not found", id),
            }
        }

        Commands::Key { key, json } => {
            let (store, _) = open_store(&cli.config, cli.database)?;
            match store.get_by_key(&key)? {
                Some(node) => show_node(&node, json)?,
                None => anyhow::bail!("no node with key {}", key),
            }
        }

        Commands::Query { r#where, param, json } => {
            let (store, _) = open_store(&cli.config, cli.database)?;
            let nodes = store.find_where(&r#where, rusqlite::params_from_iter(param.iter()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else if nodes.is_empty() {
                println!("∅ No nodes found.");
            } else {
                for node in &nodes {
                    println!("{}", ui::node_line(node));
                }
                ui::summary_row("Matched:", &nodes.len().to_string());
            }
        }

        Commands::Count { r#where, param } => {
            let (store, _) = open_store(&cli.config, cli.database)?;
            let count = store.count(&r#where, rusqlite::params_from_iter(param.iter()))?;
            println!("{}", count);
        }

        Commands::Put { r#type, id, key, set, reinsert } => {
            let (mut store, _) = open_store(&cli.config, cli.database)?;
            let node_type = NodeType::from_str(&r#type)?;

            let mut node = match id {
                Some(id) => match store.get(id)? {
                    Some(existing) => existing,
                    None => {
                        let mut node = Node::new(node_type);
                        node.id = Some(id);
                        node
                    }
                },
                None => Node::new(node_type),
            };
            if let Some(key) = key {
                node.key = Some(key);
            }
            for assignment in &set {
                let (name, value) = parse_assignment(assignment)?;
                node.set(name, value)?;
            }

            let on_missing = if reinsert { OnMissing::Reinsert } else { OnMissing::Fail };
            let saved = store.save_with(node, on_missing)?;
            if !saved.outcome.is_written() {
                anyhow::bail!("node {} does not exist (use --reinsert to recreate it)", saved.outcome.id());
            }
            ui::success(&format!("{:?}", saved.outcome));
            println!("{}", ui::node_line(&saved.node));
        }

        Commands::Delete { id } => {
            let (mut store, _) = open_store(&cli.config, cli.database)?;
            let Some(mut node) = store.get(id)? else {
                anyhow::bail!("node {} not found", id);
            };
            node.deleted = true;
            store.save(node)?;
            ui::success(&format!("Marked node {} deleted", id));
        }

        Commands::History { id, json } => {
            let (store, _) = open_store(&cli.config, cli.database)?;
            let entries = store.history(id)?;

            if json {
                let versions = entries
                    .iter()
                    .map(|e| e.decode())
                    .collect::<nodestore::Result<Vec<_>>>()?;
                println!("{}", serde_json::to_string_pretty(&versions)?);
            } else if entries.is_empty() {
                println!("∅ No history for node {}.", id);
            } else {
                ui::section(&format!("History of node {}", id));
                for entry in &entries {
                    println!("{}", ui::history_line(entry));
                }
            }
        }

        Commands::Reindex { r#type } => {
            let (mut store, _) = open_store(&cli.config, cli.database)?;
            let types: Vec<NodeType> = match r#type {
                Some(t) => vec![NodeType::from_str(&t)?],
                None => store.registry().indexed_types().map(|(t, _)| t).collect(),
            };

            if types.is_empty() {
                ui::warn("No node types have index fields configured.");
            }
            for node_type in types {
                let rows = store.reindex(node_type)?;
                println!("{} {}: {} rows", Icons::WRENCH, node_type, rows);
            }
        }

        Commands::Stats => {
            let (store, db_path) = open_store(&cli.config, cli.database)?;
            let stats = store.stats()?;

            ui::header(&format!("{} Nodestore Statistics", Icons::STATS));
            ui::summary_row("Database", &db_path.display().to_string());
            println!("{}", ui::stats_table(&stats));
        }
    }

    Ok(())
}

/// Open the store named by the config, or by `--database` when given
fn open_store(config_path: &Path, database: Option<PathBuf>) -> anyhow::Result<(NodeRepository, PathBuf)> {
    let config = config::load_config(Some(config_path))?.unwrap_or_default();
    let db_path = database.unwrap_or_else(|| config.database_path());
    config::ensure_db_dir(&db_path)?;
    tracing::debug!("Opening {}", db_path.display());
    let store = NodeRepository::open(&db_path, &config)?;
    Ok((store, db_path))
}

fn parse_assignment(assignment: &str) -> anyhow::Result<(&str, Value)> {
    let Some((name, raw)) = assignment.split_once('=') else {
        anyhow::bail!("expected name=value, got '{}'", assignment);
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.trim(), value))
}

fn show_node(node: &Node, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(node)?);
    } else {
        ui::print_node(node);
    }
    Ok(())
}
