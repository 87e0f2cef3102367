//! Dependency resolution error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Failures raised while building, solving or ordering a resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ResolverError {
    #[error("unknown package: {package}")]
    UnknownPackage { package: String },

    #[error("{message}")]
    UnresolvableDependency { message: String },

    #[error("dependency loop detected: {path}")]
    CyclicDependency { path: String },

    #[error("conflicting constraints on {name}: {message}")]
    ConflictingConstraints { name: String, message: String },

    #[error("solver failure: {message}")]
    SolverFailure { message: String },

    #[error("malformed universe text at line {line}: {message}")]
    MalformedUniverseText { line: usize, message: String },

    #[error("unsupported request: {message}")]
    UnsupportedRequest { message: String },
}

impl ResolverError {
    /// Shorthand for the common "no candidate version" failure
    pub fn unresolvable(message: impl Into<String>) -> Self {
        Self::UnresolvableDependency {
            message: message.into(),
        }
    }

    /// Shorthand for a universe text parse failure
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedUniverseText {
            line,
            message: message.into(),
        }
    }
}

impl UserFacingError for ResolverError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownPackage { .. } => {
                Some("Check the package name or refresh the remote catalogue.")
            }
            Self::UnresolvableDependency { .. } => Some(
                "Relax the requested version range or check the target platform filter.",
            ),
            Self::CyclicDependency { .. } => {
                Some("Report the dependency loop to the package maintainer.")
            }
            Self::ConflictingConstraints { .. } => {
                Some("Request each package only once with compatible ranges.")
            }
            Self::SolverFailure { .. } => {
                Some("Try allowing SNAPSHOT versions or removing conflicting packages first.")
            }
            Self::UnsupportedRequest { .. } => Some("Use the cudf strategy for this request."),
            Self::MalformedUniverseText { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnknownPackage { .. } => "resolver.unknown_package",
            Self::UnresolvableDependency { .. } => "resolver.unresolvable_dependency",
            Self::CyclicDependency { .. } => "resolver.cyclic_dependency",
            Self::ConflictingConstraints { .. } => "resolver.conflicting_constraints",
            Self::SolverFailure { .. } => "resolver.solver_failure",
            Self::MalformedUniverseText { .. } => "resolver.malformed_universe",
            Self::UnsupportedRequest { .. } => "resolver.unsupported_request",
        };
        Some(code)
    }
}
