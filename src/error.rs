//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// The pool could not hand out a working connection (unreachable server,
    /// authentication failure, acquisition timeout). Fails a whole snapshot.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ConnectionError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RenderError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Message without the variant prefix, as shown to users.
    pub fn message(&self) -> &str {
        match self {
            AppError::ConnectionError(msg)
            | AppError::DatabaseError(msg)
            | AppError::RenderError(msg)
            | AppError::InternalError(msg)
            | AppError::NotFound(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(json!({
            "error": self.message(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match classify(&err) {
            FailureKind::Connection => AppError::ConnectionError(describe(&err)),
            FailureKind::SourceUnavailable | FailureKind::Query => {
                AppError::DatabaseError(describe(&err))
            }
        }
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::RenderError(err.to_string())
    }
}

/// How a failed statistics query affects the snapshot it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// No usable connection. The snapshot as a whole fails.
    Connection,
    /// The view, function or extension behind the query is not installed
    /// or not enabled on this server.
    SourceUnavailable,
    /// Any other failure of a single query, e.g. permission denied.
    Query,
}

/// Classify a sqlx error into the snapshot failure taxonomy.
pub fn classify(err: &sqlx::Error) -> FailureKind {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => FailureKind::Connection,
        sqlx::Error::Database(db_err) => match db_err.code() {
            Some(code) => classify_sqlstate(&code),
            None => FailureKind::Query,
        },
        _ => FailureKind::Query,
    }
}

/// Classify a PostgreSQL SQLSTATE code.
pub fn classify_sqlstate(code: &str) -> FailureKind {
    match code {
        // invalid_catalog_name, too_many_connections, admin_shutdown,
        // crash_shutdown, cannot_connect_now
        "3D000" | "53300" | "57P01" | "57P02" | "57P03" => FailureKind::Connection,
        // connection_exception and invalid_authorization_specification classes
        c if c.starts_with("08") || c.starts_with("28") => FailureKind::Connection,
        // undefined_table, undefined_function, object_not_in_prerequisite_state,
        // undefined_file
        "42P01" | "42883" | "55000" | "58P01" => FailureKind::SourceUnavailable,
        _ => FailureKind::Query,
    }
}

/// Human-readable form of a sqlx error. Server errors keep only the message;
/// client-side errors are shortened for the common connect failures.
pub fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        sqlx::Error::PoolTimedOut => "timed out waiting for a database connection".to_string(),
        sqlx::Error::PoolClosed => "database pool is closed".to_string(),
        _ => {
            let msg = err.to_string();
            if msg.contains("Connection refused") {
                "connection refused".to_string()
            } else if msg.contains("password authentication failed") {
                "password authentication failed".to_string()
            } else {
                msg
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    /// Server-side error carrying only a SQLSTATE, for classification tests.
    #[derive(Debug)]
    struct FakeDbError {
        code: &'static str,
        message: String,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.message)
        }
    }

    impl StdError for FakeDbError {}

    impl sqlx::error::DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            &self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    pub(crate) fn db_error(code: &'static str, message: &str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(FakeDbError {
            code,
            message: message.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::db_error;
    use super::*;

    #[test]
    fn test_database_errors_use_sqlstate() {
        let missing = db_error("42P01", "relation \"pg_stat_statements\" does not exist");
        assert_eq!(classify(&missing), FailureKind::SourceUnavailable);
        assert_eq!(
            describe(&missing),
            "relation \"pg_stat_statements\" does not exist"
        );

        let auth = db_error("28P01", "password authentication failed for user \"app\"");
        assert_eq!(classify(&auth), FailureKind::Connection);

        let denied = db_error("42501", "permission denied for view pg_stat_statements");
        assert!(matches!(AppError::from(denied), AppError::DatabaseError(_)));
    }

    #[test]
    fn test_connection_classes_are_fatal() {
        assert_eq!(classify_sqlstate("08006"), FailureKind::Connection);
        assert_eq!(classify_sqlstate("28P01"), FailureKind::Connection);
        assert_eq!(classify_sqlstate("3D000"), FailureKind::Connection);
        assert_eq!(classify_sqlstate("57P03"), FailureKind::Connection);
        assert_eq!(classify_sqlstate("53300"), FailureKind::Connection);
    }

    #[test]
    fn test_missing_sources_degrade() {
        assert_eq!(classify_sqlstate("42P01"), FailureKind::SourceUnavailable);
        assert_eq!(classify_sqlstate("42883"), FailureKind::SourceUnavailable);
        assert_eq!(classify_sqlstate("55000"), FailureKind::SourceUnavailable);
    }

    #[test]
    fn test_other_sqlstates_are_partial() {
        // insufficient_privilege
        assert_eq!(classify_sqlstate("42501"), FailureKind::Query);
        // undefined_column
        assert_eq!(classify_sqlstate("42703"), FailureKind::Query);
    }

    #[test]
    fn test_client_side_errors() {
        assert_eq!(classify(&sqlx::Error::PoolTimedOut), FailureKind::Connection);
        assert_eq!(classify(&sqlx::Error::PoolClosed), FailureKind::Connection);
        assert_eq!(classify(&sqlx::Error::RowNotFound), FailureKind::Query);
        assert_eq!(
            classify(&sqlx::Error::ColumnNotFound("bytes".into())),
            FailureKind::Query
        );
    }

    #[test]
    fn test_sqlx_error_maps_to_app_error() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::ConnectionError(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::DatabaseError(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_message_has_no_prefix() {
        let err = AppError::ConnectionError("connection refused".into());
        assert_eq!(err.message(), "connection refused");
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }
}
