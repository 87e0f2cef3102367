//! Universe construction from a catalogue and a request

use super::{
    join_clauses, ordinal_key, write_field, Clause, Constraint, UniverseText, CONFLICTS,
    DEPENDS, INSTALL, INSTALLED, PACKAGE, PROVIDES, REMOVE, REQUEST, UPGRADE, VERSION,
};
use crate::catalogue::Catalogue;
use crate::request::RequestedDependencies;
use plugpm_errors::ResolverError;
use plugpm_types::{is_compatible, Package, PackageDependency, PackageType, PlatformId, Version};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

/// A package-stanza clause left out because nothing could satisfy it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedClause {
    pub package: String,
    pub dependency: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
struct Candidate {
    package: Package,
    ordinal: u32,
}

/// Encoded universe plus the ordinal mapping needed to read a solution back
#[derive(Debug, Clone)]
pub struct Universe {
    text: UniverseText,
    candidates: BTreeMap<String, Vec<Candidate>>,
    dropped: Vec<DroppedClause>,
    refreshed: BTreeSet<String>,
}

impl Universe {
    #[must_use]
    pub fn text(&self) -> &UniverseText {
        &self.text
    }

    /// The real package behind `name` at `ordinal`
    #[must_use]
    pub fn package(&self, name: &str, ordinal: u32) -> Option<&Package> {
        self.candidates
            .get(name)?
            .iter()
            .find(|candidate| candidate.ordinal == ordinal)
            .map(|candidate| &candidate.package)
    }

    /// Ordinal assigned to `name` at `version`
    #[must_use]
    pub fn ordinal(&self, name: &str, version: &Version) -> Option<u32> {
        self.candidates
            .get(name)?
            .iter()
            .find(|candidate| &candidate.package.version == version)
            .map(|candidate| candidate.ordinal)
    }

    /// The installed candidate for `name`
    #[must_use]
    pub fn installed(&self, name: &str) -> Option<&Package> {
        self.candidates
            .get(name)?
            .iter()
            .map(|candidate| &candidate.package)
            .find(|pkg| self.is_installed(pkg))
    }

    /// Installed SNAPSHOT ids replaced by their remote build
    #[must_use]
    pub fn refreshed(&self) -> &BTreeSet<String> {
        &self.refreshed
    }

    fn is_installed(&self, pkg: &Package) -> bool {
        pkg.installed() || self.refreshed.contains(&pkg.id())
    }

    /// Every candidate, keyed by `name-ordinal`
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.candidates.iter().flat_map(|(name, candidates)| {
            candidates
                .iter()
                .map(move |candidate| ordinal_key(name, candidate.ordinal))
        })
    }

    /// Number of candidates
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Clauses dropped while encoding package stanzas
    #[must_use]
    pub fn dropped(&self) -> &[DroppedClause] {
        &self.dropped
    }
}

/// Builds a [`Universe`] for one request
pub struct UniverseBuilder<'a> {
    catalogue: &'a dyn Catalogue,
    target_platform: Option<&'a PlatformId>,
    keep: bool,
    allow_snapshot: bool,
}

impl<'a> UniverseBuilder<'a> {
    pub fn new(catalogue: &'a dyn Catalogue) -> Self {
        Self {
            catalogue,
            target_platform: None,
            keep: true,
            allow_snapshot: false,
        }
    }

    #[must_use]
    pub fn target_platform(mut self, platform: Option<&'a PlatformId>) -> Self {
        self.target_platform = platform;
        self
    }

    #[must_use]
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    #[must_use]
    pub fn allow_snapshot(mut self, allow: bool) -> Self {
        self.allow_snapshot = allow;
        self
    }

    /// Encode the universe and request stanza
    ///
    /// # Errors
    ///
    /// Returns `UnresolvableDependency` when a request entry has no candidate
    /// left after filtering.
    pub fn build(&self, requested: &RequestedDependencies) -> Result<Universe, ResolverError> {
        let installed = self.catalogue.list_installed_packages();
        let mut refreshed = BTreeSet::new();
        let all: Vec<Package> = self
            .catalogue
            .list_all_packages()
            .into_iter()
            .map(|pkg| match self.refreshed_snapshot(&pkg, requested) {
                Some(remote) => {
                    refreshed.insert(remote.id());
                    remote
                }
                None => pkg,
            })
            .collect();

        let (involved, provided) = involved_names(&all, &installed, requested, self.keep);
        let mut snapshot_names = requested.snapshot_names();
        snapshot_names.extend(
            installed
                .iter()
                .filter(|pkg| pkg.version.is_snapshot())
                .map(|pkg| pkg.name.clone()),
        );

        let mut grouped: BTreeMap<String, BTreeMap<Version, Package>> = BTreeMap::new();
        for pkg in &all {
            let provides_involved = pkg.provides.iter().any(|p| involved.contains(&p.name));
            if !(involved.contains(&pkg.name) || provided.contains(&pkg.name) || provides_involved)
            {
                continue;
            }
            if let Some(platform) = self.target_platform {
                if !pkg.is_local() && !is_compatible(pkg, platform) {
                    trace!(package = %pkg.id(), %platform, "excluded: incompatible platform");
                    continue;
                }
            }
            if pkg.version.is_snapshot()
                && pkg.package_type != PackageType::Studio
                && !self.allow_snapshot
                && !snapshot_names.contains(&pkg.name)
            {
                trace!(package = %pkg.id(), "excluded: snapshot not allowed");
                continue;
            }

            grouped
                .entry(pkg.name.clone())
                .or_default()
                .entry(pkg.version.clone())
                .or_insert_with(|| pkg.clone());
        }

        let candidates: BTreeMap<String, Vec<Candidate>> = grouped
            .into_iter()
            .map(|(name, versions)| {
                let list = versions
                    .into_values()
                    .zip(1u32..)
                    .map(|(package, ordinal)| Candidate { package, ordinal })
                    .collect();
                (name, list)
            })
            .collect();

        let virtual_names: BTreeSet<String> = candidates
            .values()
            .flatten()
            .flat_map(|candidate| candidate.package.provides.iter())
            .map(|provided| provided.name.clone())
            .filter(|name| !candidates.contains_key(name))
            .collect();

        let encoder = Encoder {
            candidates: &candidates,
            virtual_names: &virtual_names,
            target_platform: self.target_platform,
        };
        let mut dropped = Vec::new();
        let mut text = String::new();

        for (name, list) in &candidates {
            for candidate in list {
                let pkg = &candidate.package;
                let id = pkg.id();
                let depends = encoder.lenient(&id, &pkg.dependencies, &mut dropped);
                let mut conflicts = encoder.lenient(&id, &pkg.conflicts, &mut dropped);
                conflicts.push(Clause::new(name.clone(), Constraint::Ne(candidate.ordinal)));
                let provides = encoder.lenient(&id, &pkg.provides, &mut dropped);

                write_field(&mut text, PACKAGE, name);
                write_field(&mut text, VERSION, &candidate.ordinal.to_string());
                let installed = pkg.installed() || refreshed.contains(&id);
                write_field(&mut text, INSTALLED, if installed { "true" } else { "false" });
                write_field(&mut text, DEPENDS, &join_clauses(&depends));
                write_field(&mut text, CONFLICTS, &join_clauses(&conflicts));
                write_field(&mut text, PROVIDES, &join_clauses(&provides));
                text.push('\n');
            }
        }

        write_field(&mut text, REQUEST, env!("CARGO_PKG_NAME"));
        write_field(&mut text, INSTALL, &join_clauses(&encoder.strict(&requested.install)?));
        write_field(&mut text, REMOVE, &join_clauses(&encoder.strict(&requested.remove)?));
        write_field(&mut text, UPGRADE, &join_clauses(&encoder.strict(&requested.upgrade)?));

        debug!(candidates = candidates.len(), "built universe:\n{text}");
        Ok(Universe {
            text: UniverseText::new(text),
            candidates,
            dropped,
            refreshed,
        })
    }

    /// The remote build of an installed SNAPSHOT being upgraded
    fn refreshed_snapshot(
        &self,
        pkg: &Package,
        requested: &RequestedDependencies,
    ) -> Option<Package> {
        let upgrading = pkg.is_local()
            && pkg.installed()
            && pkg.version.is_snapshot()
            && requested
                .upgrade
                .iter()
                .any(|dep| dep.matches(&pkg.name, &pkg.version));
        if !upgrading {
            return None;
        }
        let id = pkg.id();
        let remote = self
            .catalogue
            .find_remote_packages(&pkg.name)
            .into_iter()
            .filter(|remote| remote.id() == id)
            .find(|remote| {
                self.target_platform
                    .map_or(true, |platform| is_compatible(remote, platform))
            })?;
        debug!(package = %id, "refreshing installed snapshot from remote");
        Some(remote)
    }
}

/// Request names closed over dependencies and conflicts; provides-only names
/// are returned separately and not expanded
fn involved_names(
    all: &[Package],
    installed: &[Package],
    requested: &RequestedDependencies,
    keep: bool,
) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut involved = requested.names();
    if keep {
        involved.extend(installed.iter().map(|pkg| pkg.name.clone()));
    }
    let mut provided = BTreeSet::new();

    loop {
        let mut changed = false;
        for pkg in all {
            if !involved.contains(&pkg.name) {
                continue;
            }
            for dep in pkg.dependencies.iter().chain(&pkg.conflicts) {
                if !involved.contains(&dep.name) {
                    provided.remove(&dep.name);
                    involved.insert(dep.name.clone());
                    changed = true;
                }
            }
            for provides in &pkg.provides {
                if !involved.contains(&provides.name) {
                    provided.insert(provides.name.clone());
                }
            }
        }
        if !changed {
            break;
        }
    }
    (involved, provided)
}

struct Encoder<'b> {
    candidates: &'b BTreeMap<String, Vec<Candidate>>,
    virtual_names: &'b BTreeSet<String>,
    target_platform: Option<&'b PlatformId>,
}

impl Encoder<'_> {
    fn encode(&self, dep: &PackageDependency) -> Result<Vec<Clause>, String> {
        let Some(list) = self.candidates.get(&dep.name) else {
            if self.virtual_names.contains(&dep.name) {
                return Ok(vec![Clause::any(dep.name.clone())]);
            }
            let platform = self
                .target_platform
                .map_or_else(|| "none".to_string(), ToString::to_string);
            return Err(format!(
                "Missing mapping for {dep} with target platform {platform}"
            ));
        };
        if dep.range.is_any() {
            return Ok(vec![Clause::any(dep.name.clone())]);
        }

        let mut matching = list
            .iter()
            .filter(|candidate| dep.range.matches(&candidate.package.version))
            .map(|candidate| candidate.ordinal);
        let Some(min) = matching.next() else {
            return Err(format!("No candidate version matches {dep}"));
        };
        let max = matching.last().unwrap_or(min);
        let count = u32::try_from(list.len()).unwrap_or(u32::MAX);

        if min == max {
            return Ok(vec![Clause::new(dep.name.clone(), Constraint::Eq(min))]);
        }
        let mut clauses = Vec::new();
        if min > 1 {
            clauses.push(Clause::new(dep.name.clone(), Constraint::AtLeast(min)));
        }
        if max < count {
            clauses.push(Clause::new(dep.name.clone(), Constraint::AtMost(max)));
        }
        if clauses.is_empty() {
            clauses.push(Clause::any(dep.name.clone()));
        }
        Ok(clauses)
    }

    /// Package stanzas: unmappable clauses are dropped with a warning
    fn lenient(
        &self,
        package: &str,
        deps: &[PackageDependency],
        dropped: &mut Vec<DroppedClause>,
    ) -> Vec<Clause> {
        let mut clauses = Vec::new();
        for dep in deps {
            match self.encode(dep) {
                Ok(encoded) => clauses.extend(encoded),
                Err(reason) => {
                    warn!(package, dependency = %dep, "{reason}");
                    dropped.push(DroppedClause {
                        package: package.to_string(),
                        dependency: dep.to_string(),
                        reason,
                    });
                }
            }
        }
        clauses
    }

    /// Request stanza: unmappable clauses are fatal
    fn strict(&self, deps: &[PackageDependency]) -> Result<Vec<Clause>, ResolverError> {
        let mut clauses = Vec::new();
        for dep in deps {
            clauses.extend(self.encode(dep).map_err(ResolverError::unresolvable)?);
        }
        Ok(clauses)
    }
}
