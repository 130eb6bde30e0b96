use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Store configuration, read from `nodestore.toml`.
///
/// Index entries are kept as raw TOML values so a malformed entry can be
/// reported and skipped when the [`crate::TypeRegistry`] is resolved instead
/// of failing the whole load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: Option<String>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub index: BTreeMap<String, toml::Value>,
}

/// History policy: which types get pre-update snapshots, and how they are compressed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub types: HistoryTypes,
    #[serde(default = "default_compression")]
    pub compression: String,
}

/// Either `"*"` for every type, or an explicit list of type names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryTypes {
    Pattern(String),
    Types(Vec<String>),
}

impl Default for HistoryTypes {
    fn default() -> Self {
        HistoryTypes::Types(Vec::new())
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            types: HistoryTypes::default(),
            compression: default_compression(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            history: HistoryConfig::default(),
            index: BTreeMap::new(),
        }
    }
}

impl StoreConfig {
    /// The configuration written by `nodestore init`
    pub fn starter() -> Self {
        let list = |fields: &[&str]| {
            toml::Value::Array(fields.iter().map(|f| toml::Value::from(*f)).collect())
        };

        let mut index = BTreeMap::new();
        index.insert("user".to_string(), list(&["email", "login"]));
        index.insert("link".to_string(), list(&["url"]));
        index.insert("file".to_string(), list(&["name", "mime_type"]));

        Self {
            database: Some(default_database_path().to_string_lossy().to_string()),
            busy_timeout_ms: default_busy_timeout_ms(),
            history: HistoryConfig {
                types: HistoryTypes::Types(vec!["wiki".to_string(), "user".to_string()]),
                compression: default_compression(),
            },
            index,
        }
    }

    /// Set the index field list for a type
    pub fn with_index(mut self, node_type: &str, fields: &[&str]) -> Self {
        let fields = fields.iter().map(|f| toml::Value::from(*f)).collect();
        self.index.insert(node_type.to_string(), toml::Value::Array(fields));
        self
    }

    /// Set the history policy
    pub fn with_history(mut self, types: HistoryTypes, compression: &str) -> Self {
        self.history = HistoryConfig {
            types,
            compression: compression.to_string(),
        };
        self
    }

    /// Database path from the config, falling back to the default location
    pub fn database_path(&self) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path)
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_compression() -> String {
    "none".to_string()
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("nodestore.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from(".nodestore").join("nodes.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<StoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: StoreConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &StoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
