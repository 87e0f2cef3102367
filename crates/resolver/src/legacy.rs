//! Solver-free backtracking resolution
//!
//! The legacy strategy resolves a single package id. It walks the dependency
//! tree collecting candidate versions per name, then enumerates assignments
//! depth-first, preferring versions that avoid downloads and upgrades. An
//! assignment that breaks an installed package is repaired with a remote
//! replacement when one exists that pulls in nothing new; otherwise it is kept
//! as a fallback that forces the broken package out.

use crate::catalogue::Catalogue;
use crate::request::Request;
use crate::resolution::Resolution;
use plugpm_errors::ResolverError;
use plugpm_events::{DependencyConflictType, EventEmitter, EventSender, ResolverEvent};
use plugpm_types::{is_compatible, Package, PackageDependency, PlatformId, Version};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, trace, warn};

/// Candidate packages per dependency name, in discovery order
#[derive(Debug, Default)]
struct Choices {
    names: Vec<String>,
    candidates: BTreeMap<String, Vec<Package>>,
}

impl Choices {
    fn add(&mut self, name: &str, packages: Vec<Package>) {
        if !self.candidates.contains_key(name) {
            self.names.push(name.to_string());
        }
        let entry = self.candidates.entry(name.to_string()).or_default();
        for pkg in packages {
            if !entry.iter().any(|known| known.version == pkg.version) {
                entry.push(pkg);
            }
        }
    }

    /// Installed first, then other local copies, then remote, each ascending
    fn sort(&mut self) {
        for packages in self.candidates.values_mut() {
            packages.sort_by(|a, b| {
                preference(a)
                    .cmp(&preference(b))
                    .then_with(|| a.version.cmp(&b.version))
            });
        }
    }

    fn max_possibilities(&self) -> u64 {
        self.candidates.values().fold(1u64, |total, packages| {
            total.saturating_mul(u64::try_from(packages.len()).unwrap_or(u64::MAX))
        })
    }
}

fn preference(pkg: &Package) -> u8 {
    if pkg.installed() {
        0
    } else if pkg.is_local() {
        1
    } else {
        2
    }
}

/// What to do about one installed package an assignment breaks
enum Repair {
    /// No remote version accepts the assignment
    Impossible,
    /// A remote version accepts it and needs nothing new
    Transparent(Package),
    /// Every accepting remote version needs further dependencies
    NeedsMore,
}

/// An assignment that only works by removing installed packages
struct Fallback {
    resolution: Resolution,
    /// `(name, version)` of every installed package forced out
    forced: Vec<(String, String)>,
    message: String,
}

/// Backtracking resolver over a bounded dependency tree
pub struct BacktrackingResolver<'a> {
    catalogue: &'a dyn Catalogue,
    max_depth: usize,
    node_budget: u64,
    events: Option<EventSender>,
}

impl EventEmitter for BacktrackingResolver<'_> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl<'a> BacktrackingResolver<'a> {
    pub fn new(catalogue: &'a dyn Catalogue, max_depth: usize, node_budget: u64) -> Self {
        Self {
            catalogue,
            max_depth,
            node_budget,
            events: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    /// Resolve a request holding exactly one package id to install
    ///
    /// # Errors
    ///
    /// `UnsupportedRequest` for any other request shape, `UnknownPackage`
    /// for an unknown id, `CyclicDependency` for loops or trees deeper than
    /// the configured limit, and `UnresolvableDependency` when no assignment
    /// works.
    pub fn resolve(&self, request: &Request) -> Result<Resolution, ResolverError> {
        let root_id = match request.install.as_slice() {
            [id] if request.remove.is_empty() && request.upgrade.is_empty() => id.trim(),
            _ => {
                return Err(ResolverError::UnsupportedRequest {
                    message: "the legacy resolver only installs a single package id".to_string(),
                })
            }
        };
        let root = self
            .catalogue
            .get_package(root_id)
            .ok_or_else(|| ResolverError::UnknownPackage {
                package: root_id.to_string(),
            })?;

        let platform = request.target_platform.as_ref();
        let mut choices = Choices::default();
        choices.add(&root.name, vec![root.clone()]);
        let mut expanded = BTreeSet::new();
        let mut path = vec![root.name.clone()];
        self.collect(&root, platform, &mut choices, &mut expanded, &mut path)?;
        choices.sort();
        debug!(
            root = %root.id(),
            names = choices.names.len(),
            max_possibilities = choices.max_possibilities(),
            "computed legacy dependency choices"
        );

        let installed = self.catalogue.list_installed_packages();
        let mut search = Search {
            resolver: self,
            root: &root,
            choices: &choices,
            installed: &installed,
            platform,
            assignment: BTreeMap::new(),
            nodes: 0,
            evaluated: BTreeSet::new(),
            fallbacks: Vec::new(),
        };
        match search.run(0) {
            Some(resolution) => Ok(resolution),
            None => {
                if search.nodes >= self.node_budget {
                    warn!(
                        budget = self.node_budget,
                        "legacy search budget exhausted before a clean solution"
                    );
                }
                let Some(fallback) = search.fallbacks.into_iter().next() else {
                    return Err(ResolverError::unresolvable("Unable to resolve dependencies"));
                };
                debug!(message = %fallback.message, "using legacy fallback");
                self.emit(ResolverEvent::conflict_detected(
                    fallback.forced,
                    fallback.message,
                    DependencyConflictType::InstalledBreakage,
                ));
                Ok(fallback.resolution.into_fallback())
            }
        }
    }

    fn collect(
        &self,
        pkg: &Package,
        platform: Option<&PlatformId>,
        choices: &mut Choices,
        expanded: &mut BTreeSet<String>,
        path: &mut Vec<String>,
    ) -> Result<(), ResolverError> {
        if !expanded.insert(pkg.id()) {
            return Ok(());
        }
        if path.len() > self.max_depth {
            return Err(ResolverError::CyclicDependency {
                path: path.join(" -> "),
            });
        }

        for dependency in &pkg.dependencies {
            if path.contains(&dependency.name) {
                return Err(ResolverError::CyclicDependency {
                    path: format!("{} -> {}", path.join(" -> "), dependency.name),
                });
            }
            let candidates = self.available(dependency, platform);
            if candidates.is_empty() {
                return Err(ResolverError::unresolvable(format!(
                    "Unable to find a compatible version for package {} ({})",
                    dependency.name, dependency.range
                )));
            }
            trace!(
                package = %pkg.id(),
                dependency = %dependency,
                candidates = candidates.len(),
                "collected candidates"
            );
            choices.add(&dependency.name, candidates.clone());

            path.push(dependency.name.clone());
            for candidate in &candidates {
                self.collect(candidate, platform, choices, expanded, path)?;
            }
            path.pop();
        }
        Ok(())
    }

    fn available(
        &self,
        dependency: &PackageDependency,
        platform: Option<&PlatformId>,
    ) -> Vec<Package> {
        self.catalogue
            .find_packages(&dependency.name)
            .into_iter()
            .filter(|pkg| dependency.range.matches(&pkg.version))
            .filter(|pkg| fits_platform(pkg, platform))
            .collect()
    }
}

fn fits_platform(pkg: &Package, platform: Option<&PlatformId>) -> bool {
    platform.map_or(true, |platform| pkg.is_local() || is_compatible(pkg, platform))
}

struct Search<'s, 'a> {
    resolver: &'s BacktrackingResolver<'a>,
    root: &'s Package,
    choices: &'s Choices,
    installed: &'s [Package],
    platform: Option<&'s PlatformId>,
    assignment: BTreeMap<String, &'s Package>,
    nodes: u64,
    /// Package ids of every closure already evaluated
    evaluated: BTreeSet<Vec<String>>,
    fallbacks: Vec<Fallback>,
}

impl<'s> Search<'s, '_> {
    fn run(&mut self, index: usize) -> Option<Resolution> {
        let choices = self.choices;
        let Some(name) = choices.names.get(index) else {
            return self.evaluate();
        };
        if !self.reachable(name) {
            self.assignment.remove(name);
            return self.run(index + 1);
        }
        for pkg in choices.candidates.get(name).into_iter().flatten() {
            if self.nodes >= self.resolver.node_budget {
                return None;
            }
            self.nodes += 1;
            self.assignment.insert(name.clone(), pkg);
            if let Some(resolution) = self.run(index + 1) {
                return Some(resolution);
            }
        }
        self.assignment.remove(name);
        None
    }

    /// Whether some package that can still end up in the closure depends on
    /// `name`; unassigned names count with every candidate
    fn reachable(&self, name: &str) -> bool {
        let mut seen = BTreeSet::from([self.root.name.as_str()]);
        let mut queue = VecDeque::from([self.root]);
        while let Some(pkg) = queue.pop_front() {
            for dependency in &pkg.dependencies {
                if dependency.name == name {
                    return true;
                }
                if !seen.insert(dependency.name.as_str()) {
                    continue;
                }
                match self.assignment.get(&dependency.name) {
                    Some(chosen) => queue.push_back(*chosen),
                    None => queue.extend(
                        self.choices
                            .candidates
                            .get(&dependency.name)
                            .into_iter()
                            .flatten(),
                    ),
                }
            }
        }
        false
    }

    /// Packages reachable from the root under the current assignment, or
    /// `None` when an edge is not satisfied
    fn closure(&self) -> Option<BTreeMap<String, &'s Package>> {
        let mut closure = BTreeMap::new();
        let mut queue = VecDeque::from([self.root]);
        closure.insert(self.root.name.clone(), self.root);
        while let Some(pkg) = queue.pop_front() {
            for dependency in &pkg.dependencies {
                let chosen = *self.assignment.get(&dependency.name)?;
                if !dependency.range.matches(&chosen.version) {
                    return None;
                }
                if closure.insert(dependency.name.clone(), chosen).is_none() {
                    queue.push_back(chosen);
                }
            }
        }
        Some(closure)
    }

    fn evaluate(&mut self) -> Option<Resolution> {
        let closure = self.closure()?;
        let key: Vec<String> = closure.values().map(|pkg| pkg.id()).collect();
        if !self.evaluated.insert(key) {
            trace!("closure already evaluated");
            return None;
        }
        let broken = self.broken_installed(&closure);
        let selected: BTreeMap<String, Version> = closure
            .iter()
            .map(|(name, pkg)| (name.clone(), pkg.version.clone()))
            .collect();
        if broken.is_empty() {
            debug!(?selected, "legacy assignment accepted");
            return Some(Resolution::selected(selected, BTreeMap::new()));
        }

        let mut replacements = BTreeMap::new();
        let mut removals = BTreeMap::new();
        for installed in &broken {
            match self.repair(installed, &closure) {
                Repair::Transparent(replacement) => {
                    debug!(
                        installed = %installed.id(),
                        replacement = %replacement.id(),
                        "transparent update"
                    );
                    replacements.insert(replacement.name.clone(), replacement.version);
                }
                Repair::Impossible => {
                    debug!(installed = %installed.id(), "update impossible");
                    removals.insert(installed.name.clone(), installed.version.clone());
                }
                Repair::NeedsMore => {
                    trace!(installed = %installed.id(), "update needs new dependencies");
                    return None;
                }
            }
        }

        let mut selected = selected;
        selected.extend(replacements);
        if removals.is_empty() {
            return Some(Resolution::selected(selected, removals));
        }

        let forced: Vec<(String, String)> = removals
            .iter()
            .map(|(name, version)| (name.clone(), version.to_string()))
            .collect();
        let message = format!(
            "Update impossible for {}",
            forced
                .iter()
                .map(|(name, version)| format!("{name}-{version}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!(%message, "recording legacy fallback");
        self.fallbacks.push(Fallback {
            resolution: Resolution::selected(selected, removals),
            forced,
            message,
        });
        None
    }

    /// Installed packages outside the closure whose dependencies the
    /// closure violates
    fn broken_installed(&self, closure: &BTreeMap<String, &Package>) -> Vec<&'s Package> {
        self.installed
            .iter()
            .filter(|pkg| !closure.contains_key(&pkg.name))
            .filter(|pkg| {
                pkg.dependencies.iter().any(|dependency| {
                    closure
                        .get(&dependency.name)
                        .is_some_and(|chosen| !dependency.range.matches(&chosen.version))
                })
            })
            .collect()
    }

    fn repair(&self, installed: &Package, closure: &BTreeMap<String, &Package>) -> Repair {
        let accepting: Vec<Package> = self
            .resolver
            .catalogue
            .find_remote_packages(&installed.name)
            .into_iter()
            .filter(|pkg| fits_platform(pkg, self.platform))
            .filter(|pkg| {
                pkg.dependencies.iter().all(|dependency| {
                    closure
                        .get(&dependency.name)
                        .map_or(true, |chosen| dependency.range.matches(&chosen.version))
                })
            })
            .collect();
        if accepting.is_empty() {
            return Repair::Impossible;
        }

        // ties go to the later candidate
        let mut best: Option<(usize, Package)> = None;
        for pkg in accepting {
            let delta = pkg
                .dependencies
                .iter()
                .filter(|dependency| !closure.contains_key(&dependency.name))
                .count();
            if best.as_ref().map_or(true, |(smallest, _)| delta <= *smallest) {
                best = Some((delta, pkg));
            }
        }
        match best {
            Some((0, pkg)) => Repair::Transparent(pkg),
            _ => Repair::NeedsMore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::MemoryCatalogue;
    use plugpm_types::PackageState;

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, Version::parse(version).unwrap())
    }

    fn dep(spec: &str) -> PackageDependency {
        PackageDependency::parse(spec).unwrap()
    }

    fn install(id: &str) -> Request {
        Request::new().with_install([id])
    }

    fn resolver(catalogue: &MemoryCatalogue) -> BacktrackingResolver<'_> {
        BacktrackingResolver::new(catalogue, 32, 100_000)
    }

    #[test]
    fn test_rejects_multi_entry_requests() {
        let catalogue = MemoryCatalogue::new(Vec::new(), vec![pkg("a", "1.0"), pkg("b", "1.0")]);
        let err = resolver(&catalogue)
            .resolve(&Request::new().with_install(["a-1.0.0", "b-1.0.0"]))
            .unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedRequest { .. }));

        let err = resolver(&catalogue)
            .resolve(&install("a-1.0.0").with_remove(["b"]))
            .unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedRequest { .. }));
    }

    #[test]
    fn test_unknown_root() {
        let catalogue = MemoryCatalogue::default();
        let err = resolver(&catalogue).resolve(&install("ghost-1.0.0")).unwrap_err();
        assert_eq!(
            err,
            ResolverError::UnknownPackage {
                package: "ghost-1.0.0".to_string()
            }
        );
    }

    #[test]
    fn test_prefers_installed_then_local_then_oldest_remote() {
        let catalogue = MemoryCatalogue::new(
            vec![pkg("lib", "1.1").with_state(PackageState::Downloaded)],
            vec![
                pkg("app", "1.0").with_dependency(dep("lib:1.0:2.0")),
                pkg("lib", "1.0"),
                pkg("lib", "1.2"),
                pkg("lib", "2.0"),
            ],
        );
        let resolution = resolver(&catalogue).resolve(&install("app-1.0.0")).unwrap();
        assert_eq!(
            resolution.selected_versions().get("lib"),
            Some(&Version::parse("1.1").unwrap())
        );
        assert!(!resolution.is_fallback());
    }

    #[test]
    fn test_missing_candidate() {
        let catalogue = MemoryCatalogue::new(
            Vec::new(),
            vec![pkg("app", "1.0").with_dependency(dep("lib:2.0"))],
        );
        let err = resolver(&catalogue).resolve(&install("app-1.0.0")).unwrap_err();
        assert!(matches!(err, ResolverError::UnresolvableDependency { .. }));
        assert!(err.to_string().contains("Unable to find a compatible version for package lib"));
    }

    #[test]
    fn test_cycle_detected() {
        let catalogue = MemoryCatalogue::new(
            Vec::new(),
            vec![
                pkg("a", "1.0").with_dependency(dep("b")),
                pkg("b", "1.0").with_dependency(dep("a")),
            ],
        );
        let err = resolver(&catalogue).resolve(&install("a-1.0.0")).unwrap_err();
        assert_eq!(
            err,
            ResolverError::CyclicDependency {
                path: "a -> b -> a".to_string()
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let catalogue = MemoryCatalogue::new(
            Vec::new(),
            vec![
                pkg("a", "1.0").with_dependency(dep("b")),
                pkg("b", "1.0").with_dependency(dep("c")),
                pkg("c", "1.0"),
            ],
        );
        let err = BacktrackingResolver::new(&catalogue, 1, 1_000)
            .resolve(&install("a-1.0.0"))
            .unwrap_err();
        assert!(matches!(err, ResolverError::CyclicDependency { .. }));
    }

    #[test]
    fn test_backtracks_over_diamond() {
        // b-1.0 wants c-1.0, d wants c-2.0; b-2.0 accepts c-2.0
        let catalogue = MemoryCatalogue::new(
            Vec::new(),
            vec![
                pkg("a", "1.0")
                    .with_dependency(dep("b"))
                    .with_dependency(dep("d")),
                pkg("b", "1.0").with_dependency(dep("c:1.0.0:1.0.0")),
                pkg("b", "2.0").with_dependency(dep("c:2.0.0:2.0.0")),
                pkg("d", "1.0").with_dependency(dep("c:2.0.0:2.0.0")),
                pkg("c", "1.0"),
                pkg("c", "2.0"),
            ],
        );
        let resolution = resolver(&catalogue).resolve(&install("a-1.0.0")).unwrap();
        let selected = resolution.selected_versions();
        assert_eq!(selected.get("b"), Some(&Version::parse("2.0").unwrap()));
        assert_eq!(selected.get("c"), Some(&Version::parse("2.0").unwrap()));
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_transparent_update_of_installed() {
        let catalogue = MemoryCatalogue::new(
            vec![
                pkg("user", "1.0")
                    .with_dependency(dep("lib:1.0.0:1.0.0"))
                    .with_state(PackageState::Installed),
                pkg("lib", "1.0").with_state(PackageState::Installed),
            ],
            vec![
                pkg("app", "1.0").with_dependency(dep("lib:2.0")),
                pkg("lib", "2.0"),
                pkg("user", "1.1").with_dependency(dep("lib:2.0")),
            ],
        );
        let resolution = resolver(&catalogue).resolve(&install("app-1.0.0")).unwrap();
        assert!(!resolution.is_fallback());
        assert_eq!(
            resolution.selected_versions().get("user"),
            Some(&Version::parse("1.1").unwrap())
        );
        assert!(resolution.local_removals().is_empty());
    }

    #[test]
    fn test_fallback_forces_removal() {
        let catalogue = MemoryCatalogue::new(
            vec![
                pkg("user", "1.0")
                    .with_dependency(dep("lib:1.0.0:1.0.0"))
                    .with_state(PackageState::Installed),
                pkg("lib", "1.0").with_state(PackageState::Installed),
            ],
            vec![
                pkg("app", "1.0").with_dependency(dep("lib:2.0")),
                pkg("lib", "2.0"),
            ],
        );
        let (tx, mut rx) = plugpm_events::channel();
        let resolution = resolver(&catalogue)
            .with_event_sender(Some(tx))
            .resolve(&install("app-1.0.0"))
            .unwrap();
        assert!(resolution.is_fallback());
        assert!(resolution.is_validated());
        assert_eq!(
            resolution.local_removals().get("user"),
            Some(&Version::parse("1.0").unwrap())
        );

        let message = rx.try_recv().unwrap();
        assert!(matches!(
            message.event,
            ResolverEvent::DependencyConflictDetected {
                conflict_type: DependencyConflictType::InstalledBreakage,
                ..
            }
        ));
    }

    #[test]
    fn test_clean_solution_after_rejected_fallback_emits_nothing() {
        // x-1.0 is tried first and breaks user; x-2.0 is clean
        let catalogue = MemoryCatalogue::new(
            vec![pkg("user", "1.0")
                .with_dependency(dep("x:2.0.0:2.0.0"))
                .with_state(PackageState::Installed)],
            vec![
                pkg("app", "1.0")
                    .with_dependency(dep("x"))
                    .with_dependency(dep("y")),
                pkg("x", "1.0").with_dependency(dep("z")),
                pkg("x", "2.0"),
                pkg("y", "1.0"),
                pkg("z", "1.0"),
                pkg("z", "2.0"),
            ],
        );
        let (tx, mut rx) = plugpm_events::channel();
        let resolution = resolver(&catalogue)
            .with_event_sender(Some(tx))
            .resolve(&install("app-1.0.0"))
            .unwrap();
        assert!(!resolution.is_fallback());
        assert_eq!(
            resolution.selected_versions().get("x"),
            Some(&Version::parse("2.0").unwrap())
        );
        assert!(!resolution.selected_versions().contains_key("z"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fallback_reported_once() {
        // every assignment breaks user; z only matters under x-1.0
        let catalogue = MemoryCatalogue::new(
            vec![pkg("user", "1.0")
                .with_dependency(dep("x:3.0.0:3.0.0"))
                .with_state(PackageState::Installed)],
            vec![
                pkg("app", "1.0").with_dependency(dep("x")),
                pkg("x", "1.0").with_dependency(dep("z")),
                pkg("x", "2.0"),
                pkg("z", "1.0"),
                pkg("z", "2.0"),
            ],
        );
        let (tx, mut rx) = plugpm_events::channel();
        let resolution = resolver(&catalogue)
            .with_event_sender(Some(tx))
            .resolve(&install("app-1.0.0"))
            .unwrap();
        assert!(resolution.is_fallback());
        assert_eq!(
            resolution.selected_versions().get("z"),
            Some(&Version::parse("1.0").unwrap())
        );

        let message = rx.try_recv().unwrap();
        assert!(matches!(
            message.event,
            ResolverEvent::DependencyConflictDetected { .. }
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_needing_new_dependencies_is_abandoned() {
        let catalogue = MemoryCatalogue::new(
            vec![
                pkg("user", "1.0")
                    .with_dependency(dep("lib:1.0.0:1.0.0"))
                    .with_state(PackageState::Installed),
                pkg("lib", "1.0").with_state(PackageState::Installed),
            ],
            vec![
                pkg("app", "1.0").with_dependency(dep("lib:2.0")),
                pkg("lib", "2.0"),
                pkg("user", "1.1")
                    .with_dependency(dep("lib:2.0"))
                    .with_dependency(dep("extra")),
                pkg("extra", "1.0"),
            ],
        );
        let err = resolver(&catalogue).resolve(&install("app-1.0.0")).unwrap_err();
        assert_eq!(err, ResolverError::unresolvable("Unable to resolve dependencies"));
    }

    #[test]
    fn test_platform_filter_skips_remote_only() {
        let server = PlatformId::parse("server-10.10").unwrap();
        let catalogue = MemoryCatalogue::new(
            Vec::new(),
            vec![
                pkg("app", "1.0").with_dependency(dep("lib")),
                pkg("lib", "1.0").with_target_platforms(["server-9.10"]),
                pkg("lib", "2.0").with_target_platforms(["server-10.10"]),
            ],
        );
        let resolution = resolver(&catalogue)
            .resolve(&install("app-1.0.0").with_target_platform(server))
            .unwrap();
        assert_eq!(
            resolution.selected_versions().get("lib"),
            Some(&Version::parse("2.0").unwrap())
        );
    }
}
