pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    attr_text, header, history_line, node_line, print_node, section, success, summary_row,
    warn,
};
pub use table::{stats_table, TableBuilder};
pub use theme::theme;
