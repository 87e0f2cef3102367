//! Version, range and platform parsing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum VersionError {
    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid version range: {input}")]
    InvalidRange { input: String },

    #[error("invalid dependency expression: {input}")]
    InvalidDependency { input: String },

    #[error("invalid platform version '{input}': {reason}")]
    InvalidPlatformVersion { input: String, reason: String },

    #[error("invalid platform version range '{input}': {reason}")]
    InvalidRestriction { input: String, reason: String },

    #[error("bad platform id: {input}")]
    InvalidPlatformId { input: String },
}

impl UserFacingError for VersionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidVersion { .. } => {
                Some("Use versions like 1.2.3, 1.2.3-classifier or 1.2.3-SNAPSHOT.")
            }
            Self::InvalidRange { .. } | Self::InvalidDependency { .. } => {
                Some("Write dependencies as `name`, `name:min` or `name:min:max`.")
            }
            Self::InvalidPlatformVersion { .. } | Self::InvalidRestriction { .. } => {
                Some("Use platform ranges like [9.10,10.10-HF02], (10.10,) or a single version.")
            }
            Self::InvalidPlatformId { .. } => Some("Platform ids look like `server-10.10`."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidVersion { .. } => "version.invalid_version",
            Self::InvalidRange { .. } => "version.invalid_range",
            Self::InvalidDependency { .. } => "version.invalid_dependency",
            Self::InvalidPlatformVersion { .. } => "version.invalid_platform_version",
            Self::InvalidRestriction { .. } => "version.invalid_restriction",
            Self::InvalidPlatformId { .. } => "version.invalid_platform_id",
        };
        Some(code)
    }
}
