//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the vCon store
#[derive(Error, Debug)]
pub enum Error {
    /// Caller input violated a structural or semantic invariant
    #[error("Validation error on '{field}': {reason}")]
    Validation {
        /// The offending field
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Referenced vCon or child does not exist
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Unique constraint or stale-write conflict
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Database unavailable or statement failed
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error
        message: String,
        /// Whether the caller may retry the operation
        retryable: bool,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A `before*` plugin hook aborted the operation
    #[error("Plugin '{plugin}' aborted the operation: {message}")]
    Hook {
        /// Name of the plugin whose hook raised
        plugin: String,
        /// Hook failure description
        message: String,
    },

    /// Search backend exceeded the query budget
    #[error("Search timed out: {message}")]
    SearchTimeout {
        /// Description of the timeout
        message: String,
    },

    /// Cache operation failed (logged and swallowed by callers)
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache error
        message: String,
    },

    /// Embedding provider operation failed
    #[error("Embedding error: {message}")]
    Embedding {
        /// Description of the embedding error
        message: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Invalid configuration value
    #[error("Invalid configuration for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key that is invalid
        key: String,
        /// Reason why it is invalid
        message: String,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Internal invariant breach
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Create a validation error
    pub fn validation<F: Into<String>, R: Into<String>>(field: F, reason: R) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a non-retryable storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
            retryable: false,
            source: None,
        }
    }

    /// Create a retryable storage error (connection reset, serialization failure)
    pub fn storage_retryable<S: Into<String>>(message: S) -> Self {
        Self::Storage {
            message: message.into(),
            retryable: true,
            source: None,
        }
    }

    /// Create a storage error with source
    pub fn storage_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        retryable: bool,
        source: E,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            retryable,
            source: Some(Box::new(source)),
        }
    }

    /// Create a hook error
    pub fn hook<P: Into<String>, M: Into<String>>(plugin: P, message: M) -> Self {
        Self::Hook {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a search timeout error
    pub fn search_timeout<S: Into<String>>(message: S) -> Self {
        Self::SearchTimeout {
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl Error {
    /// Stable error kind identifier for client payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Storage { .. } => "storage_error",
            Self::Hook { .. } => "hook_error",
            Self::SearchTimeout { .. } => "search_timeout",
            Self::Cache { .. } => "cache_error",
            Self::Embedding { .. } => "embedding_error",
            Self::Config { .. } | Self::ConfigInvalid { .. } => "config_error",
            Self::Json { .. } => "validation_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether the operation may be retried as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage {
                retryable: true,
                ..
            } | Self::SearchTimeout { .. }
        )
    }
}
