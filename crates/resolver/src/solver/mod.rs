//! Constraint solver seam
//!
//! The resolver hands a [`UniverseText`] and an [`OptimizationPreset`] to a
//! [`ConstraintSolver`] and reads back the chosen candidates together with
//! a per-candidate [`Category`].

mod adapter;
mod reference;

pub use adapter::SolverAdapter;
pub use reference::ReferenceSolver;

use crate::request::RequestedDependencies;
use crate::universe::UniverseText;
use plugpm_errors::ResolverError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Quantity a preset minimizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    /// Installed names left without any version
    Removed,
    /// Names whose installed version differs from the selection
    Changed,
    /// Selected names not at their newest candidate
    NotUpToDate,
    /// Names selected but not installed before
    New,
    /// Installed names kept at the same version
    Unchanged,
}

impl Criterion {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::Changed => "changed",
            Self::NotUpToDate => "notuptodate",
            Self::New => "new",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Optimization objective chosen from the request shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizationPreset {
    /// Fewest outdated packages
    Upgrade,
    /// Fewest version changes
    Remove,
    /// Whole-world replace: fewest unchanged packages
    Replace,
    /// Fewest removed, changed, outdated then new packages
    Install,
}

impl OptimizationPreset {
    /// Pick the preset for a translated request
    #[must_use]
    pub fn for_request(requested: &RequestedDependencies, keep: bool) -> Self {
        if !requested.upgrade.is_empty() {
            Self::Upgrade
        } else if !requested.remove.is_empty() {
            Self::Remove
        } else if !keep {
            Self::Replace
        } else {
            Self::Install
        }
    }

    /// Criteria in lexicographic priority order
    #[must_use]
    pub fn criteria(self) -> &'static [Criterion] {
        use Criterion::{Changed, New, NotUpToDate, Removed, Unchanged};
        match self {
            Self::Upgrade => &[NotUpToDate, Removed, Changed, New],
            Self::Remove => &[Changed, Removed, New],
            Self::Replace => &[Unchanged, New, NotUpToDate],
            Self::Install => &[Removed, Changed, NotUpToDate, New],
        }
    }
}

impl fmt::Display for OptimizationPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self
            .criteria()
            .iter()
            .map(|criterion| format!("-{}", criterion.label()))
            .collect();
        f.write_str(&labels.join(","))
    }
}

/// Classification of one candidate in a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    New,
    VersionChanged,
    Removed,
    Unchanged,
}

/// Solver answer, in ordinal space
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverOutput {
    /// Selected `(name, ordinal)` pairs
    pub solution: BTreeSet<(String, u32)>,
    /// Category per `(name, ordinal)`; removed entries carry the installed ordinal
    pub classification: BTreeMap<(String, u32), Category>,
    /// False when the search stopped before proving optimality
    pub optimal: bool,
}

/// External constraint solving capability
pub trait ConstraintSolver: Send + Sync {
    /// Solve `universe` under `preset`
    ///
    /// # Errors
    ///
    /// `SolverFailure` when no solution exists, `MalformedUniverseText` when
    /// the universe cannot be read.
    fn solve(
        &self,
        universe: &UniverseText,
        preset: OptimizationPreset,
    ) -> Result<SolverOutput, ResolverError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugpm_types::PackageDependency;

    #[test]
    fn test_preset_selection() {
        let dep = PackageDependency::any("a");
        let mut requested = RequestedDependencies::default();
        assert_eq!(
            OptimizationPreset::for_request(&requested, true),
            OptimizationPreset::Install
        );
        assert_eq!(
            OptimizationPreset::for_request(&requested, false),
            OptimizationPreset::Replace
        );
        requested.remove.push(dep.clone());
        assert_eq!(
            OptimizationPreset::for_request(&requested, false),
            OptimizationPreset::Remove
        );
        requested.upgrade.push(dep);
        assert_eq!(
            OptimizationPreset::for_request(&requested, true),
            OptimizationPreset::Upgrade
        );
        assert_eq!(
            OptimizationPreset::Install.to_string(),
            "-removed,-changed,-notuptodate,-new"
        );
    }
}
