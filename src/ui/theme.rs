use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles for node listings and status lines
#[derive(Debug, Clone)]
pub struct Theme {
    pub heading: Style,
    pub success: Style,
    pub warning: Style,
    /// Attribute and metadata names
    pub label: Style,
    /// Ids, timestamps and other secondary text
    pub muted: Style,
    pub node_type: Style,
    pub deleted: Style,
}

impl Theme {
    /// Plain styles when stdout is not a terminal or `NO_COLOR` is set
    pub fn detect() -> Self {
        let colored = console::Term::stdout().is_term() && std::env::var_os("NO_COLOR").is_none();
        if colored { Self::colored() } else { Self::plain() }
    }

    pub fn colored() -> Self {
        Self {
            heading: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            warning: Style::new().yellow().bold(),
            label: Style::new().white().dimmed(),
            muted: Style::new().bright_black(),
            node_type: Style::new().blue().bold(),
            deleted: Style::new().red().strikethrough(),
        }
    }

    pub fn plain() -> Self {
        Self {
            heading: Style::new(),
            success: Style::new(),
            warning: Style::new(),
            label: Style::new(),
            muted: Style::new(),
            node_type: Style::new(),
            deleted: Style::new(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
