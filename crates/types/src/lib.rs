#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the plugpm dependency engine
//!
//! This crate provides the value types the resolver works on: plugin
//! versions and ranges, platform versions and restrictions, and the
//! package view with its dependency declarations.

pub mod compat;
pub mod package;
pub mod platform;
pub mod version;

// Re-export commonly used types
pub use compat::{is_compatible, matches_target_platforms};
pub use package::{package_id, Package, PackageDependency, PackageState, PackageType};
pub use platform::{PlatformId, PlatformVersion, Restriction};
pub use version::{Version, VersionRange};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resolution strategy selected by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Constraint-universe encoding handed to a solver
    #[default]
    Cudf,
    /// Bounded backtracking over a single root package
    Legacy,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cudf => write!(f, "cudf"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cudf" | "p2cudf" => Ok(Self::Cudf),
            "legacy" => Ok(Self::Legacy),
            other => Err(format!("unknown resolution strategy: {other}")),
        }
    }
}
