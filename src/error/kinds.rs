use std::time::Duration;
use std::{fmt, io};

use super::aggregate::{BulkWriteError, DeleteManyError, InsertManyError, UpdateManyError};
use super::response::DataApiResponseError;
use crate::executor::RawResponse;

/// Crate-wide `Result` type using [`DataApiError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DataApiError>;

/// Top-level error type for client operations.
///
/// Variants fall into four families:
/// - operational: the service rejected a command but answered ([`DataApiError::Response`])
/// - transport: no usable answer ([`DataApiError::Http`], [`DataApiError::Transport`],
///   [`DataApiError::Timeout`])
/// - aggregated: a multi-request operation partially failed
/// - contract violations raised before anything is sent
#[derive(Debug)]
pub enum DataApiError {
    /// The service answered with an `errors` array.
    Response(DataApiResponseError),

    /// The call did not complete within its timeout.
    Timeout(TimeoutError),

    /// Non-success HTTP status from the transport.
    Http { status: u16, message: String },

    /// Connection failure, malformed response or other opaque transport problem.
    Transport(String),

    /// Invalid cursor usage.
    Cursor(CursorError),

    /// Some operations of a bulk write failed.
    BulkWrite(BulkWriteError),

    /// Some chunks of an insert-many failed.
    InsertMany(InsertManyError),

    /// A page of an update-many failed.
    UpdateMany(UpdateManyError),

    /// A page of a delete-many failed.
    DeleteMany(DeleteManyError),

    /// The exact count exceeded the requested or service-side upper bound.
    TooManyDocumentsToCount { limit: u64, hit_server_limit: bool },

    /// Invalid arguments supplied by the caller.
    InvalidArgument(String),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),
}

/// A command that exceeded its time budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutError {
    /// Name of the command (or operation) that timed out
    pub command: &'static str,

    /// The budget that was exceeded
    pub timeout: Duration,
}

impl TimeoutError {
    pub fn new(command: &'static str, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

/// Cursor-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// A builder method was called after the first fetch.
    AlreadyInitialized { operation: &'static str },

    /// A builder method was called on a closed cursor.
    Closed { operation: &'static str },
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl DataApiError {
    /// Whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, DataApiError::Timeout(_))
    }

    /// Whether the service answered and rejected the command
    pub fn is_response_error(&self) -> bool {
        matches!(self, DataApiError::Response(_))
    }

    /// Raw response of an operational error, safe to inspect for partial effects
    pub fn raw_response(&self) -> Option<&RawResponse> {
        match self {
            DataApiError::Response(e) => Some(e.raw_response()),
            _ => None,
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DataApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataApiError::Response(e) => write!(f, "{e}"),
            DataApiError::Timeout(e) => write!(f, "{e}"),
            DataApiError::Http { status, message } => {
                write!(f, "HTTP error {status}: {message}")
            }
            DataApiError::Transport(msg) => write!(f, "Transport error: {msg}"),
            DataApiError::Cursor(e) => write!(f, "Cursor error: {e}"),
            DataApiError::BulkWrite(e) => write!(f, "{e}"),
            DataApiError::InsertMany(e) => write!(f, "{e}"),
            DataApiError::UpdateMany(e) => write!(f, "{e}"),
            DataApiError::DeleteMany(e) => write!(f, "{e}"),
            DataApiError::TooManyDocumentsToCount {
                limit,
                hit_server_limit,
            } => {
                if *hit_server_limit {
                    write!(f, "Too many documents to count (server limit of {limit} reached)")
                } else {
                    write!(f, "Too many documents to count (upper bound of {limit} exceeded)")
                }
            }
            DataApiError::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            DataApiError::Config(e) => write!(f, "Configuration error: {e}"),
            DataApiError::Io(e) => write!(f, "I/O error: {e}"),
            DataApiError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Command '{}' timed out after {}ms",
            self.command,
            self.timeout.as_millis()
        )
    }
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::AlreadyInitialized { operation } => {
                write!(f, "Cannot call {operation}() on an already initialized cursor")
            }
            CursorError::Closed { operation } => {
                write!(f, "Cannot call {operation}() on a closed cursor")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for DataApiError {}
impl std::error::Error for TimeoutError {}
impl std::error::Error for CursorError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to DataApiError ========================= */

impl From<io::Error> for DataApiError {
    fn from(err: io::Error) -> Self {
        DataApiError::Io(err)
    }
}

impl From<serde_json::Error> for DataApiError {
    fn from(err: serde_json::Error) -> Self {
        DataApiError::Json(err)
    }
}

impl From<DataApiResponseError> for DataApiError {
    fn from(err: DataApiResponseError) -> Self {
        DataApiError::Response(err)
    }
}

impl From<TimeoutError> for DataApiError {
    fn from(err: TimeoutError) -> Self {
        DataApiError::Timeout(err)
    }
}

impl From<CursorError> for DataApiError {
    fn from(err: CursorError) -> Self {
        DataApiError::Cursor(err)
    }
}

impl From<ConfigError> for DataApiError {
    fn from(err: ConfigError) -> Self {
        DataApiError::Config(err)
    }
}

impl From<BulkWriteError> for DataApiError {
    fn from(err: BulkWriteError) -> Self {
        DataApiError::BulkWrite(err)
    }
}

impl From<InsertManyError> for DataApiError {
    fn from(err: InsertManyError) -> Self {
        DataApiError::InsertMany(err)
    }
}

impl From<UpdateManyError> for DataApiError {
    fn from(err: UpdateManyError) -> Self {
        DataApiError::UpdateMany(err)
    }
}

impl From<DeleteManyError> for DataApiError {
    fn from(err: DeleteManyError) -> Self {
        DataApiError::DeleteMany(err)
    }
}
