//! Drives a constraint solver and maps its answer back to real versions

use super::{Category, ConstraintSolver, OptimizationPreset};
use crate::catalogue::Catalogue;
use crate::request::Request;
use crate::resolution::Resolution;
use crate::universe::{Universe, UniverseBuilder};
use plugpm_errors::ResolverError;
use plugpm_events::{EventEmitter, EventMessage, EventSender, EventSource, ResolverEvent};
use plugpm_types::{package_id, Package, Version};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Runs one request through universe encoding, solving and read-back
pub struct SolverAdapter<'a> {
    catalogue: &'a dyn Catalogue,
    solver: &'a dyn ConstraintSolver,
    events: Option<EventSender>,
}

impl EventEmitter for SolverAdapter<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl<'a> SolverAdapter<'a> {
    pub fn new(catalogue: &'a dyn Catalogue, solver: &'a dyn ConstraintSolver) -> Self {
        Self {
            catalogue,
            solver,
            events: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    /// Resolve `request` into an uncategorized selection
    ///
    /// Without `keep`, the result of a first pass is turned into an explicit
    /// install/remove request and resolved again with `keep` set, so that
    /// categorization sees a stable installed set.
    ///
    /// # Errors
    ///
    /// Any resolver error from translation, encoding, solving or validation.
    pub fn resolve(&self, request: &Request) -> Result<Resolution, ResolverError> {
        let first = self.solve_once(request)?;
        if request.keep {
            return Ok(first);
        }

        let install: BTreeSet<String> = first
            .selected_versions()
            .iter()
            .map(|(name, version)| package_id(name, version))
            .collect();
        let remove: Vec<String> = self
            .catalogue
            .list_installed_packages()
            .iter()
            .map(Package::id)
            .filter(|id| !install.contains(id))
            .collect();
        debug!(?install, ?remove, "stabilizing whole-world replace");

        let stable = Request {
            install: install.into_iter().collect(),
            remove,
            upgrade: Vec::new(),
            target_platform: request.target_platform.clone(),
            allow_snapshot: request.allow_snapshot,
            keep: true,
        };
        Ok(self
            .solve_once(&stable)?
            .with_refreshed(first.refreshed_ids()))
    }

    fn solve_once(&self, request: &Request) -> Result<Resolution, ResolverError> {
        let requested = request.dependencies(self.catalogue)?;
        let universe = UniverseBuilder::new(self.catalogue)
            .target_platform(request.target_platform.as_ref())
            .keep(request.keep)
            .allow_snapshot(request.allow_snapshot)
            .build(&requested)?;
        for dropped in universe.dropped() {
            self.emit_with_meta(EventMessage::from_source(
                ResolverEvent::ClauseDropped {
                    package: dropped.package.clone(),
                    clause: dropped.dependency.clone(),
                    reason: dropped.reason.clone(),
                },
                EventSource::UNIVERSE,
            ));
        }

        let preset = OptimizationPreset::for_request(&requested, request.keep);
        debug!(%preset, candidates = universe.len(), "invoking constraint solver");
        let output = self.solver.solve(universe.text(), preset)?;
        if !output.optimal {
            warn!(%preset, "solver returned a solution that may not be optimal");
            self.emit(ResolverEvent::NonOptimalSolution {
                criteria: preset.to_string(),
            });
        }

        let mut selected: BTreeMap<String, Version> = BTreeMap::new();
        let mut removals: BTreeMap<String, Version> = BTreeMap::new();
        for ((name, ordinal), category) in &output.classification {
            let pkg = candidate(&universe, name, *ordinal)?;
            match category {
                Category::Removed => {
                    removals.insert(name.clone(), pkg.version.clone());
                }
                Category::New | Category::VersionChanged | Category::Unchanged => {
                    debug!(package = %pkg.id(), ?category, "solver selection");
                }
            }
        }
        for (name, ordinal) in &output.solution {
            let pkg = candidate(&universe, name, *ordinal)?;
            selected.insert(name.clone(), pkg.version.clone());
        }

        validate(&universe, &selected)?;
        Ok(Resolution::selected(selected, removals).with_refreshed(universe.refreshed()))
    }
}

fn candidate<'u>(
    universe: &'u Universe,
    name: &str,
    ordinal: u32,
) -> Result<&'u Package, ResolverError> {
    universe
        .package(name, ordinal)
        .ok_or_else(|| ResolverError::SolverFailure {
            message: format!("solution references unknown candidate {name}-{ordinal}"),
        })
}

/// Every mandatory dependency of the selection must be met inside it
fn validate(
    universe: &Universe,
    selected: &BTreeMap<String, Version>,
) -> Result<(), ResolverError> {
    let packages: Vec<&Package> = selected
        .iter()
        .filter_map(|(name, version)| {
            universe
                .ordinal(name, version)
                .and_then(|ordinal| universe.package(name, ordinal))
        })
        .collect();

    for pkg in &packages {
        for dependency in &pkg.dependencies {
            if !packages.iter().any(|other| other.satisfies(dependency)) {
                return Err(ResolverError::unresolvable(format!(
                    "Unable to satisfy dependency {dependency} of {}",
                    pkg.id()
                )));
            }
        }
    }
    Ok(())
}
