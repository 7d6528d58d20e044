//! Structured error types for tool responses.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,
    CommitNotFound,

    // Store errors
    StoreUnavailable,
    StoreTimeout,

    // Conflict errors
    AlreadyExists,
    DependencyCycle,

    // Internal errors
    DatabaseError,
    InternalError,
    UnknownTool,
}

impl ErrorCode {
    /// Broad error kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ErrorCode::MissingRequiredField | ErrorCode::InvalidFieldValue => "validation",
            ErrorCode::TaskNotFound | ErrorCode::CommitNotFound => "not_found",
            ErrorCode::StoreUnavailable => "store_unavailable",
            ErrorCode::StoreTimeout => "store_timeout",
            ErrorCode::AlreadyExists | ErrorCode::DependencyCycle => "conflict",
            ErrorCode::DatabaseError | ErrorCode::InternalError | ErrorCode::UnknownTool => {
                "internal"
            }
        }
    }
}

/// Structured error for tool responses.
#[derive(Debug, Serialize)]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn commit_not_found(hash: &str) -> Self {
        Self::new(
            ErrorCode::CommitNotFound,
            format!("Commit not found: {}", hash),
        )
    }

    pub fn dependency_cycle(task: &str, depends_on: &str) -> Self {
        Self::new(
            ErrorCode::DependencyCycle,
            format!(
                "Adding dependency {} -> {} would create a cycle",
                task, depends_on
            ),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self::new(ErrorCode::UnknownTool, format!("Unknown tool: {}", name))
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

/// Failures of the storage engine itself, as opposed to bad requests.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection could not be opened, was closed, or is unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The engine gave up waiting on a lock.
    #[error("store timed out: {0}")]
    Timeout(String),

    #[error("store query failed: {0}")]
    Query(#[from] rusqlite::Error),
}

impl StoreError {
    /// Error code for a raw SQLite error.
    pub fn code_for(err: &rusqlite::Error) -> ErrorCode {
        use rusqlite::ErrorCode as Sqlite;
        match err.sqlite_error_code() {
            Some(Sqlite::DatabaseBusy) | Some(Sqlite::DatabaseLocked) => ErrorCode::StoreTimeout,
            Some(Sqlite::CannotOpen)
            | Some(Sqlite::NotADatabase)
            | Some(Sqlite::SystemIoFailure)
            | Some(Sqlite::PermissionDenied) => ErrorCode::StoreUnavailable,
            _ => ErrorCode::DatabaseError,
        }
    }

    /// Classify a raw SQLite error.
    pub fn classify(err: rusqlite::Error) -> Self {
        match Self::code_for(&err) {
            ErrorCode::StoreTimeout => StoreError::Timeout(err.to_string()),
            ErrorCode::StoreUnavailable => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Unavailable(_) => ErrorCode::StoreUnavailable,
            StoreError::Timeout(_) => ErrorCode::StoreTimeout,
            StoreError::Query(_) => ErrorCode::DatabaseError,
        }
    }
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        ToolError::new(err.code(), err.to_string())
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ToolError>() {
            Ok(tool_err) => return tool_err,
            Err(err) => err,
        };
        match err.downcast::<StoreError>() {
            Ok(store_err) => store_err.into(),
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => StoreError::classify(sql_err).into(),
                Err(err) => ToolError::internal(err),
            },
        }
    }
}

/// Error code carried by an engine error, if it is one of ours.
pub fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    if let Some(tool_err) = err.downcast_ref::<ToolError>() {
        return Some(tool_err.code);
    }
    if let Some(store_err) = err.downcast_ref::<StoreError>() {
        return Some(store_err.code());
    }
    err.downcast_ref::<rusqlite::Error>().map(StoreError::code_for)
}

/// True when the error means the store itself cannot be reached.
pub fn is_store_unavailable(err: &anyhow::Error) -> bool {
    error_code(err) == Some(ErrorCode::StoreUnavailable)
}

/// Result type for tool operations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_roundtrip_keeps_code() {
        let err: anyhow::Error = ToolError::task_not_found("t1").into();
        assert_eq!(error_code(&err), Some(ErrorCode::TaskNotFound));
        let back: ToolError = err.into();
        assert_eq!(back.code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn test_store_unavailable_detected_through_anyhow() {
        let err: anyhow::Error = StoreError::Unavailable("closed".into()).into();
        assert!(is_store_unavailable(&err));
        let tool_err: ToolError = err.into();
        assert_eq!(tool_err.code, ErrorCode::StoreUnavailable);
    }

    #[test]
    fn test_raw_sqlite_codes_agree_with_classify() {
        let cases = [
            (rusqlite::ffi::SQLITE_IOERR, ErrorCode::StoreUnavailable),
            (rusqlite::ffi::SQLITE_PERM, ErrorCode::StoreUnavailable),
            (rusqlite::ffi::SQLITE_CANTOPEN, ErrorCode::StoreUnavailable),
            (rusqlite::ffi::SQLITE_BUSY, ErrorCode::StoreTimeout),
            (rusqlite::ffi::SQLITE_CONSTRAINT, ErrorCode::DatabaseError),
        ];
        for (raw, expected) in cases {
            let sql_err = || rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(raw), None);
            assert_eq!(error_code(&anyhow::Error::from(sql_err())), Some(expected));
            assert_eq!(StoreError::classify(sql_err()).code(), expected);
        }
    }

    #[test]
    fn test_serialized_code_is_screaming_snake() {
        let err = ToolError::missing_field("name");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "MISSING_REQUIRED_FIELD");
        assert_eq!(json["field"], "name");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ErrorCode::InvalidFieldValue.kind(), "validation");
        assert_eq!(ErrorCode::CommitNotFound.kind(), "not_found");
        assert_eq!(ErrorCode::StoreTimeout.kind(), "store_timeout");
        assert_eq!(ErrorCode::DependencyCycle.kind(), "conflict");
    }
}
