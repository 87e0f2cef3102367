#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the plugpm dependency engine
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone so they can be stored inside a
//! failed resolution and handed back to callers.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod resolver;
pub mod version;

// Re-export all error types at the root
pub use config::ConfigError;
pub use resolver::ResolverError;
pub use version::VersionError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// The resolver error wrapped by this error, if any
    #[must_use]
    pub fn as_resolver(&self) -> Option<&ResolverError> {
        match self {
            Self::Resolver(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for plugpm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for analytics / structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Version(err) => err.user_message(),
            Error::Resolver(err) => err.user_message(),
            Error::Config(err) => err.user_message(),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Version(err) => err.user_hint(),
            Error::Resolver(err) => err.user_hint(),
            Error::Config(_) => Some("Check your plugpm resolver configuration file."),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Resolver(err) => err.is_retryable(),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Version(err) => err.user_code(),
            Error::Resolver(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_error_codes_survive_wrapping() {
        let err: Error = ResolverError::CyclicDependency {
            path: "a -> b -> a".to_string(),
        }
        .into();
        assert_eq!(err.user_code(), Some("resolver.cyclic_dependency"));
        assert!(err.as_resolver().is_some());
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_config_error_is_not_a_resolver_error() {
        let err: Error = ConfigError::NotFound {
            path: "/etc/plugpm/resolver.toml".to_string(),
        }
        .into();
        assert!(err.as_resolver().is_none());
        assert_eq!(err.user_code(), Some("config.not_found"));
    }
}
