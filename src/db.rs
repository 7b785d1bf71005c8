use crate::config::Database;
use crate::service_utils::utc_timestamp;
use tracing::info;

/// Placeholder database sink.
///
/// Real connectivity is a separate collaborator that is not part of this
/// service; this type only owns the log lines describing what a connection
/// and an insert would have done. It exists exactly when the configuration
/// carries a `db` block, so message handling never has to re-check the
/// configuration.
pub struct DatabaseSink {
    target: String,
}

impl DatabaseSink {
    pub fn connect(config: &Database) -> Self {
        let target = format!("{}:{}/{}", config.host, config.port, config.db_name);
        info!(
            "[{}] Connected to the database at {} (placeholder)",
            utc_timestamp(),
            target
        );
        Self { target }
    }

    /// Logs the would-be insert for a received message. No write occurs.
    pub fn insert_placeholder(&self, timestamp: &str, payload: &str) {
        info!(
            "[{}] Inserting data into database {}: {}",
            timestamp, self.target, payload
        );
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_describes_its_target() {
        let sink = DatabaseSink::connect(&Database {
            host: "db.example.com".into(),
            port: "5432".into(),
            db_name: "measurements".into(),
            username: "dbuser".into(),
            password: "dbpass".into(),
        });
        assert_eq!(sink.target, "db.example.com:5432/measurements");
    }
}
