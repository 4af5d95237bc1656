use thiserror::Error;

/// SQLSTATE codes the service reacts to
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNDEFINED_COLUMN: &str = "42703";
const UNDEFINED_TABLE: &str = "42P01";
const TOO_MANY_CONNECTIONS: &str = "53300";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Record not found")]
    NotFound,

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Database schema is out of date: {0}")]
    SchemaOutdated(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Database error: {0}")]
    SqlxError(sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Poolers report exhaustion as plain server messages rather than SQLSTATE 53300.
fn is_max_clients_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("maxclientsinsessionmode") || lower.contains("max clients reached")
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::PoolTimedOut => {
                Self::PoolExhausted("timed out waiting for a pooled connection".to_string())
            }
            sqlx::Error::PoolClosed => Self::ConnectionFailed("connection pool is closed".to_string()),
            sqlx::Error::Io(e) => Self::ConnectionFailed(e.to_string()),
            sqlx::Error::Tls(e) => Self::ConnectionFailed(e.to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned());
                match code.as_deref() {
                    Some(UNIQUE_VIOLATION) => Self::UniqueViolation(
                        db_err.constraint().map(str::to_string).unwrap_or(message),
                    ),
                    Some(FOREIGN_KEY_VIOLATION) => Self::ForeignKeyViolation(
                        db_err.constraint().map(str::to_string).unwrap_or(message),
                    ),
                    Some(UNDEFINED_COLUMN) | Some(UNDEFINED_TABLE) => Self::SchemaOutdated(message),
                    Some(TOO_MANY_CONNECTIONS) => Self::PoolExhausted(message),
                    _ if is_max_clients_message(&message) => Self::PoolExhausted(message),
                    _ => Self::QueryFailed(message),
                }
            }
            other => {
                let message = other.to_string();
                if is_max_clients_message(&message) {
                    Self::PoolExhausted(message)
                } else {
                    Self::SqlxError(other)
                }
            }
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::MigrationError(error.to_string())
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
