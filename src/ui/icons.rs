/// Glyphs prefixed to CLI output lines
pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✅";
    pub const WARN: &str = "⚠️";
    pub const STATS: &str = "📊";
    pub const NODE: &str = "📄";
    pub const KEY: &str = "🔑";
    pub const HISTORY: &str = "🕰️";
    pub const WRENCH: &str = "🔧";
}
