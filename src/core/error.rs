use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Serialization failure, deadlock, lock wait timeout or a lost connection.
    /// The whole transaction may be retried.
    #[error("Transient storage failure: {0}")]
    Transient(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => {
                    Self::Transient(db_err.message().to_string())
                }
                Some("23503") => Self::ForeignKeyViolation(db_err.message().to_string()),
                Some("23505") => Self::UniqueViolation(db_err.message().to_string()),
                _ => Self::Backend(err.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Transient(err.to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Backend(format!("migration failed: {err}"))
    }
}
