use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

/// Errors raised by the repository layer.
///
/// Postgres constraint violations are lifted into their own variants so callers can tell an
/// invariant rejection apart from the store being unavailable.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("entity not found")]
    NotFound,

    #[error("insufficient credits: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String, table: Option<String> },

    #[error("check constraint violated: {constraint}")]
    CheckViolation {
        constraint: String,
        table: Option<String>,
        message: String,
    },

    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String, table: Option<String> },

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Other(sqlx::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        classify(e)
    }
}

/// Converts a raw sqlx error, lifting Postgres constraint violations into typed variants.
fn classify(e: sqlx::Error) -> DbError {
    if let sqlx::Error::RowNotFound = e {
        return DbError::NotFound;
    }

    if let Some(db_err) = e.as_database_error() {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        let table = db_err.table().map(str::to_string);
        // SQLSTATE codes: https://www.postgresql.org/docs/current/errcodes-appendix.html
        match db_err.code().as_deref() {
            Some("23505") => return DbError::UniqueViolation { constraint, table },
            Some("23514") => {
                return DbError::CheckViolation {
                    constraint,
                    table,
                    message: db_err.message().to_string(),
                }
            }
            Some("23503") => return DbError::ForeignKeyViolation { constraint, table },
            _ => {}
        }
    }

    DbError::Other(e)
}
