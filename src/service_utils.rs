use chrono::Utc;
use tracing::Level;

/// Initialize the global tracing subscriber for the process.
pub fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

/// UTC timestamp in `YYYY-MM-DD HH:MM:SS` form, used in message and
/// database-placeholder log lines.
pub fn utc_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
