//! Error types for landfall
//!
//! Errors carry the context needed to locate a bad declaration: the stack or
//! resource name, the cloud, or the config key involved.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for landfall operations
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error for stack inputs
    #[error("validation error for {stack}: {message}")]
    Validation {
        /// Name of the stack with invalid configuration
        stack: String,
        /// Description of what's invalid
        message: String,
        /// The invalid config key (e.g., "subnetMask")
        field: Option<String>,
    },

    /// Address planning error (bad CIDR, bad mask, exhausted plan)
    #[error("addressing error for {cidr}: {message}")]
    Addressing {
        /// The CIDR block being planned
        cidr: String,
        /// Description of what failed
        message: String,
    },

    /// Cloud provider declaration error
    #[error("provider error [{cloud}]: {message}")]
    Provider {
        /// Cloud the declaration targets (aws, azure)
        cloud: String,
        /// Description of what failed
        message: String,
    },

    /// Resource graph error (duplicate name, dangling reference, cycle, leaked secret)
    #[error("graph error at {resource}: {message}")]
    Graph {
        /// Resource, variable or output the error was found at
        resource: String,
        /// Description of what's wrong
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being serialized (if known)
        kind: Option<String>,
    },

    /// Credential decoding error. Never carries credential contents.
    #[error("credential error: {message}")]
    Credential {
        /// Description of what failed
        message: String,
    },

    /// Stack configuration file error
    #[error("config error in {path}: {message}")]
    Config {
        /// Path of the config file
        path: String,
        /// Description of what failed
        message: String,
    },

    /// Filesystem or process error
    #[error("io error: {source}")]
    Io {
        /// The underlying io error
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Create a validation error with the given message
    ///
    /// For simple validation errors without stack context.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            stack: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error with stack context and field name
    pub fn validation_for_field(
        stack: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Validation {
            stack: stack.into(),
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create an addressing error for the given block
    pub fn addressing(cidr: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Addressing {
            cidr: cidr.into(),
            message: msg.into(),
        }
    }

    /// Create a provider error for the given cloud
    pub fn provider(cloud: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            cloud: cloud.into(),
            message: msg.into(),
        }
    }

    /// Create a graph error located at the given resource
    pub fn graph(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Graph {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error for a known document kind
    pub fn serialization_for(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential {
            message: msg.into(),
        }
    }

    /// Create a config file error
    pub fn config(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Whether the error was caused by user-supplied configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Addressing { .. } | Self::Config { .. }
        )
    }
}
