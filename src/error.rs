//! Error type shared by every quarry operation.
//!
//! Each error carries a stable numeric [`QuarryError::code`] that callers can
//! match on, independently of the human-readable message.

use std::error::Error as StdError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = QuarryError> = std::result::Result<T, E>;

/// Stable error codes.
pub mod codes {
    /// No database handle has been installed.
    pub const DATABASE_NOT_CONFIGURED: u32 = 1000;
    /// A terminal operation needs a bound model or DML intent that is missing.
    pub const MODEL_NOT_BOUND: u32 = 1001;
    /// `select(...)` was called more than once on the same query.
    pub const SELECT_TWICE: u32 = 1002;
    /// A column accessor could not be resolved to a declared field.
    pub const UNKNOWN_COLUMN: u32 = 1003;
    /// A join declaration is incomplete or points at a non-join field.
    pub const INVALID_JOIN: u32 = 1004;
    /// An UPDATE would have no assignment.
    pub const EMPTY_UPDATE: u32 = 1005;
    /// A DELETE would have neither a condition nor a populated model.
    pub const UNSAFE_DELETE: u32 = 1006;
    /// Configuration could not be loaded or is inconsistent.
    pub const BAD_CONFIGURATION: u32 = 1007;
    /// A raw condition's `?` count differs from the number of values given.
    pub const PLACEHOLDER_MISMATCH: u32 = 1008;
    /// The driver failed to execute a statement.
    pub const EXECUTION: u32 = 2000;
    /// A connection could not be opened or acquired.
    pub const CONNECTION: u32 = 2001;
    /// A value could not be mapped onto a field.
    pub const MAPPING: u32 = 3000;
    /// A generated key could not be coerced to the requested shape.
    pub const CAST: u32 = 3001;
    /// An application error raised inside an atomic block.
    pub const APPLICATION: u32 = 4000;
}

/// Broad classification used by the rollback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Precondition,
    Mapping,
    Execution,
    Connection,
    Application,
}

/// Error returned by quarry operations.
#[derive(Debug, Error)]
pub enum QuarryError {
    #[error("Configuration error: {message}")]
    Configuration { code: u32, message: String },

    #[error("Precondition failed: {message}")]
    Precondition { code: u32, message: String },

    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Cannot convert generated key {actual} to {expected}")]
    Cast { expected: &'static str, actual: String },

    #[error("SQL execution error: {0}")]
    Execution(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] may_postgres::Error),

    #[error(transparent)]
    Application(Box<dyn StdError + Send + Sync>),
}

impl QuarryError {
    pub fn configuration(code: u32, message: impl Into<String>) -> Self {
        QuarryError::Configuration {
            code,
            message: message.into(),
        }
    }

    pub fn precondition(code: u32, message: impl Into<String>) -> Self {
        QuarryError::Precondition {
            code,
            message: message.into(),
        }
    }

    /// Wrap an application error so it can travel through an atomic block.
    pub fn application<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        QuarryError::Application(err.into())
    }

    /// Stable numeric code for programmatic matching.
    pub fn code(&self) -> u32 {
        match self {
            QuarryError::Configuration { code, .. } | QuarryError::Precondition { code, .. } => {
                *code
            }
            QuarryError::Mapping(_) => codes::MAPPING,
            QuarryError::Cast { .. } => codes::CAST,
            QuarryError::Execution(_) => codes::EXECUTION,
            #[cfg(feature = "sqlite")]
            QuarryError::Sqlite(_) => codes::EXECUTION,
            #[cfg(feature = "postgres")]
            QuarryError::Postgres(_) => codes::EXECUTION,
            QuarryError::Connection(_) => codes::CONNECTION,
            QuarryError::Application(_) => codes::APPLICATION,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QuarryError::Configuration { .. } => ErrorKind::Configuration,
            QuarryError::Precondition { .. } => ErrorKind::Precondition,
            QuarryError::Mapping(_) | QuarryError::Cast { .. } => ErrorKind::Mapping,
            QuarryError::Execution(_) => ErrorKind::Execution,
            #[cfg(feature = "sqlite")]
            QuarryError::Sqlite(_) => ErrorKind::Execution,
            #[cfg(feature = "postgres")]
            QuarryError::Postgres(_) => ErrorKind::Execution,
            QuarryError::Connection(_) => ErrorKind::Connection,
            QuarryError::Application(_) => ErrorKind::Application,
        }
    }
}

impl From<config::ConfigError> for QuarryError {
    fn from(err: config::ConfigError) -> Self {
        QuarryError::configuration(codes::BAD_CONFIGURATION, err.to_string())
    }
}
