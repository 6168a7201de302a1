//! Error types for psqueelie.
//!
//! Defines the main error enum used throughout the application.

use thiserror::Error;

/// Main error type for console operations.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Required connection variables are absent or empty.
    #[error(
        "Missing required environment variables: {}. Please set these in your environment.",
        .0.join(", ")
    )]
    MissingConfig(Vec<String>),

    /// Configuration errors (invalid config file, unparsable port, bad URL, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution errors (syntax errors, constraint violations, etc.)
    #[error("Query error: {0}")]
    Query(String),

    /// Rejected input (empty query, incomplete connection form).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local history storage errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConsoleError {
    /// Creates a missing-configuration error for the given variable names.
    pub fn missing_config<I, S>(vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingConfig(vars.into_iter().map(Into::into).collect())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an invalid-input error with the given message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a storage error with the given message.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MissingConfig(_) | Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::InvalidInput(_) => "Invalid Input",
            Self::Storage(_) => "Storage Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the message without its category prefix.
    ///
    /// For query errors this is the engine's own message.
    pub fn details(&self) -> String {
        match self {
            Self::MissingConfig(_) => self.to_string(),
            Self::Config(msg)
            | Self::Connection(msg)
            | Self::Query(msg)
            | Self::InvalidInput(msg)
            | Self::Storage(msg)
            | Self::Internal(msg) => msg.clone(),
        }
    }

    /// Returns true for errors caused by missing or invalid configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingConfig(_) | Self::Config(_))
    }
}

/// Result type alias using ConsoleError.
pub type Result<T> = std::result::Result<T, ConsoleError>;
