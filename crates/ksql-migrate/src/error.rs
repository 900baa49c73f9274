//! Error types for diffing and migrations.

/// Errors that can occur while introspecting, diffing or migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// Database error during a query.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (writing diff or unit files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database could not be reached.
    #[error("Cannot connect to {driver} database '{db_name}': {source}")]
    Connection {
        /// Driver name.
        driver: String,
        /// Database (schema) name.
        db_name: String,
        /// Underlying error.
        #[source]
        source: sqlx::Error,
    },

    /// No driver is registered under this name.
    #[error("Unknown driver '{0}'")]
    UnknownDriver(String),

    /// Two units share one id.
    #[error("Migration {0} is already registered")]
    DuplicateMigration(u64),

    /// A migration id cannot be stored in the bookkeeping table.
    #[error("Migration id {0} is out of range for the bookkeeping table")]
    InvalidMigrationId(String),

    /// A bookkeeping timestamp could not be read.
    #[error("Unreadable timestamp '{0}' in the bookkeeping table")]
    InvalidTimestamp(String),

    /// Failure raised by a migration unit itself.
    #[error("{0}")]
    Unit(String),

    /// A unit failed while the runner was set to abort on failure.
    #[error("Migration {id} ({name}) failed: {source}")]
    UnitFailed {
        /// Unit id.
        id: u64,
        /// Unit name.
        name: String,
        /// What went wrong.
        #[source]
        source: Box<MigrateError>,
    },
}

/// Result type for diff and migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_failure_keeps_its_cause() {
        let err = MigrateError::UnitFailed {
            id: 7,
            name: String::from("add_users"),
            source: Box::new(MigrateError::Unit(String::from("boom"))),
        };
        assert_eq!(err.to_string(), "Migration 7 (add_users) failed: boom");
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
    }
}
