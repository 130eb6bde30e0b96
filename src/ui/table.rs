use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

/// Render store statistics as a two-column table
pub fn stats_table(stats: &crate::storage::StoreStats) -> String {
    let mut builder = TableBuilder::new();
    builder.add_row("Nodes", &stats.nodes.to_string());
    builder.add_row("Deleted", &stats.deleted.to_string());
    for (node_type, count) in &stats.by_type {
        builder.add_row(&format!("  {}", node_type), &count.to_string());
    }
    builder.add_row("History entries", &stats.history.to_string());
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeType;
    use crate::storage::StoreStats;

    #[test]
    fn test_stats_table_lists_types() {
        let stats = StoreStats {
            nodes: 3,
            deleted: 1,
            by_type: vec![(NodeType::Wiki, 2), (NodeType::File, 1)],
            history: 4,
        };
        let table = stats_table(&stats);
        assert!(table.contains("Metric"));
        assert!(table.contains("wiki"));
        assert!(table.contains("History entries"));
    }

    #[test]
    fn test_empty_builder_renders_nothing() {
        assert!(TableBuilder::new().build().is_empty());
    }
}
