//! Type registry - per-type capabilities resolved once from configuration
//!
//! Every [`NodeType`] gets a [`TypeProfile`] describing which overflow
//! attributes are projected into its secondary index table and whether
//! updates append history. Configuration problems are logged and skipped
//! here, so the save path never has to re-validate them.

use std::collections::BTreeMap;

use crate::config::{HistoryTypes, StoreConfig};
use crate::node::NodeType;
use crate::storage::history::Compression;

/// Capabilities of one node type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeProfile {
    /// Attributes copied into `nodes_{type}_idx`, in column order
    pub index_fields: Vec<String>,
    /// Whether updates append a pre-update snapshot to `nodes_history`
    pub tracks_history: bool,
}

impl TypeProfile {
    pub fn is_indexed(&self) -> bool {
        !self.index_fields.is_empty()
    }
}

/// Profile of a type with no index fields and no history
static PLAIN: TypeProfile = TypeProfile {
    index_fields: Vec::new(),
    tracks_history: false,
};

/// Resolved per-type profiles plus the history compression to use
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    profiles: BTreeMap<NodeType, TypeProfile>,
    compression: Compression,
}

impl TypeRegistry {
    /// Resolve a configuration into profiles.
    ///
    /// Never fails: unknown type names, non-list index entries and invalid
    /// field names are logged as warnings and left out.
    pub fn from_config(config: &StoreConfig) -> Self {
        let mut profiles: BTreeMap<NodeType, TypeProfile> = NodeType::all()
            .iter()
            .map(|t| (*t, TypeProfile::default()))
            .collect();

        for (type_name, entry) in &config.index {
            let Ok(node_type) = type_name.parse::<NodeType>() else {
                tracing::warn!("Ignoring index config for unknown node type '{}'", type_name);
                continue;
            };
            let Some(fields) = parse_index_fields(type_name, entry) else {
                continue;
            };
            if let Some(profile) = profiles.get_mut(&node_type) {
                profile.index_fields = fields;
            }
        }

        match &config.history.types {
            HistoryTypes::Pattern(p) if p == "*" => {
                for profile in profiles.values_mut() {
                    profile.tracks_history = true;
                }
            }
            HistoryTypes::Pattern(single) => track_history(&mut profiles, single),
            HistoryTypes::Types(names) => {
                for name in names {
                    track_history(&mut profiles, name);
                }
            }
        }

        let compression = Compression::resolve(&config.history.compression);

        Self { profiles, compression }
    }

    /// Profile for a type
    pub fn profile(&self, node_type: NodeType) -> &TypeProfile {
        self.profiles.get(&node_type).unwrap_or(&PLAIN)
    }

    /// Compression applied to new history entries
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Types that have a secondary index table
    pub fn indexed_types(&self) -> impl Iterator<Item = (NodeType, &TypeProfile)> {
        self.profiles
            .iter()
            .filter(|(_, p)| p.is_indexed())
            .map(|(t, p)| (*t, p))
    }
}

fn track_history(profiles: &mut BTreeMap<NodeType, TypeProfile>, name: &str) {
    match name.parse::<NodeType>() {
        Ok(node_type) => {
            if let Some(profile) = profiles.get_mut(&node_type) {
                profile.tracks_history = true;
            }
        }
        Err(_) => tracing::warn!("Ignoring history config for unknown node type '{}'", name),
    }
}

fn parse_index_fields(type_name: &str, entry: &toml::Value) -> Option<Vec<String>> {
    let Some(items) = entry.as_array() else {
        tracing::warn!(
            "Index config for '{}' is not a list of field names, skipping indexing",
            type_name
        );
        return None;
    };

    let mut fields = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(field) if is_valid_field(field) => {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
            }
            _ => {
                tracing::warn!("Ignoring invalid index field {} for '{}'", item, type_name);
            }
        }
    }
    Some(fields)
}

/// Index fields become SQL column names next to `id`.
fn is_valid_field(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    starts_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.eq_ignore_ascii_case("id")
}
