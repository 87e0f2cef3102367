use serde::{Deserialize, Serialize};

use crate::EventLevel;

/// Resolver domain events for dependency resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    /// A resolve call started
    ResolutionStarted {
        install: Vec<String>,
        remove: Vec<String>,
        upgrade: Vec<String>,
        strategy: String,
    },

    /// Resolution completed successfully
    ResolutionCompleted {
        to_install: Vec<String>,
        to_remove: Vec<String>,
        fallback: bool,
        duration_ms: u64,
    },

    /// Resolution failed; the message is what the caller sees
    ResolutionFailed {
        message: String,
        code: Option<String>,
    },

    /// Dependency conflict detected
    DependencyConflictDetected {
        conflicting_packages: Vec<(String, String)>, // (package, version)
        message: String,
        conflict_type: DependencyConflictType,
    },

    /// An installed package must be reinstalled because its optional
    /// linkage changed
    ForcedReinstall { package: String, trigger: String },

    /// An optional dependency stays unmet after ordering
    UnmetOptionalDependency { package: String, dependency: String },

    /// A universe clause was dropped for lack of candidates
    ClauseDropped {
        package: String,
        clause: String,
        reason: String,
    },

    /// The solver stopped before proving its solution optimal
    NonOptimalSolution { criteria: String },
}

/// Types of dependency conflicts for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyConflictType {
    /// Version constraints cannot be satisfied simultaneously
    VersionIncompatibility,
    /// Packages that cannot be installed together
    MutualExclusion,
    /// Circular dependency chain detected
    CircularDependency,
    /// Required dependency is not available
    MissingDependency,
    /// An installed package would be broken by the selection
    InstalledBreakage,
}

impl ResolverEvent {
    /// Create a conflict detected event with basic info
    #[must_use]
    pub fn conflict_detected(
        packages: Vec<(String, String)>,
        message: String,
        conflict_type: DependencyConflictType,
    ) -> Self {
        Self::DependencyConflictDetected {
            conflicting_packages: packages,
            message,
            conflict_type,
        }
    }

    /// Severity used when the event is logged
    #[must_use]
    pub fn level(&self) -> EventLevel {
        match self {
            Self::ResolutionStarted { .. } | Self::ResolutionCompleted { .. } => EventLevel::Info,
            Self::ResolutionFailed { .. } => EventLevel::Error,
            Self::DependencyConflictDetected { .. }
            | Self::ClauseDropped { .. }
            | Self::NonOptimalSolution { .. }
            | Self::UnmetOptionalDependency { .. } => EventLevel::Warn,
            Self::ForcedReinstall { .. } => EventLevel::Debug,
        }
    }
}
