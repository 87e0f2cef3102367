//! Install and removal sequencing
//!
//! Packages are placed in repeated passes over the pending set: a package is
//! placed once its mandatory dependencies are met by something already placed
//! or by an installed package that stays. Optional dependencies that another
//! pending package will satisfy hold a package back until that package is
//! placed, but never block it for good.

use crate::catalogue::Catalogue;
use plugpm_errors::ResolverError;
use plugpm_types::{Package, PackageDependency};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Ordered install sequence plus optional dependencies nothing satisfies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderOutcome {
    pub ordered: Vec<String>,
    /// `(package id, dependency)` pairs
    pub unmet_optional: Vec<(String, String)>,
}

/// Sequencer over a package-by-id index and the installed set
#[derive(Debug, Clone)]
pub struct Orderer {
    packages: BTreeMap<String, Package>,
    installed: Vec<Package>,
}

impl Orderer {
    pub fn new(catalogue: &dyn Catalogue) -> Self {
        Self::from_packages(
            catalogue.list_all_packages(),
            catalogue.list_installed_packages(),
        )
    }

    pub fn from_packages(all: Vec<Package>, installed: Vec<Package>) -> Self {
        Self {
            packages: all.into_iter().map(|pkg| (pkg.id(), pkg)).collect(),
            installed,
        }
    }

    /// Index `package` under its id, replacing any entry already there
    #[must_use]
    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.insert(package.id(), package);
        self
    }

    /// Order `to_install` so that dependencies come first
    ///
    /// # Errors
    ///
    /// `UnknownPackage` for ids missing from the index and
    /// `UnresolvableDependency` when a mandatory dependency can be met
    /// neither by a kept installed package nor by anything being installed.
    pub fn order_install(
        &self,
        to_install: &BTreeSet<String>,
        to_remove: &BTreeSet<String>,
    ) -> Result<OrderOutcome, ResolverError> {
        let pending = self.lookup(to_install)?;
        let kept: Vec<&Package> = self
            .installed
            .iter()
            .filter(|pkg| !to_remove.contains(&pkg.id()))
            .collect();

        let ordered = sequence(pending, &kept, true)?;

        let removed = self.lookup(to_remove)?;
        let mut unmet_optional = Vec::new();
        for pkg in &ordered {
            for dependency in &pkg.optional_dependencies {
                let met = ordered
                    .iter()
                    .chain(kept.iter())
                    .any(|other| other.satisfies(dependency));
                let leaving = removed.iter().any(|other| other.satisfies(dependency));
                if !met && !leaving {
                    warn!(
                        package = %pkg.id(),
                        dependency = %dependency,
                        "optional dependency is not satisfied"
                    );
                    unmet_optional.push((pkg.id(), dependency.to_string()));
                }
            }
        }

        let ordered: Vec<String> = ordered.iter().map(|pkg| pkg.id()).collect();
        debug!(?ordered, "install order computed");
        Ok(OrderOutcome {
            ordered,
            unmet_optional,
        })
    }

    /// Order `to_remove` so that dependents are removed before their
    /// dependencies
    ///
    /// # Errors
    ///
    /// `UnknownPackage` for ids missing from the index.
    pub fn order_remove(&self, to_remove: &BTreeSet<String>) -> Result<Vec<String>, ResolverError> {
        let pending = self.lookup(to_remove)?;
        let kept: Vec<&Package> = self
            .installed
            .iter()
            .filter(|pkg| !to_remove.contains(&pkg.id()))
            .collect();

        let mut ordered: Vec<String> = sequence(pending, &kept, false)?
            .iter()
            .map(|pkg| pkg.id())
            .collect();
        ordered.reverse();
        debug!(?ordered, "removal order computed");
        Ok(ordered)
    }

    fn lookup(&self, ids: &BTreeSet<String>) -> Result<Vec<&Package>, ResolverError> {
        ids.iter()
            .map(|id| {
                self.packages
                    .get(id)
                    .ok_or_else(|| ResolverError::UnknownPackage {
                        package: id.clone(),
                    })
            })
            .collect()
    }
}

fn met_by(dependency: &PackageDependency, placed: &[&Package], kept: &[&Package]) -> bool {
    placed
        .iter()
        .chain(kept.iter())
        .any(|pkg| pkg.satisfies(dependency))
}

/// Place `pending` in passes; `strict` turns an impossible mandatory
/// dependency into an error instead of residual placement
fn sequence<'p>(
    mut pending: Vec<&'p Package>,
    kept: &[&Package],
    strict: bool,
) -> Result<Vec<&'p Package>, ResolverError> {
    let mut placed: Vec<&Package> = Vec::with_capacity(pending.len());

    for wait_on_optional in [true, false] {
        loop {
            let before = placed.len();
            let mut index = 0;
            while index < pending.len() {
                let pkg = pending[index];
                let mandatory_met = pkg
                    .dependencies
                    .iter()
                    .all(|dependency| met_by(dependency, &placed, kept));
                let optional_clear = !wait_on_optional
                    || pkg.optional_dependencies.iter().all(|dependency| {
                        met_by(dependency, &placed, kept)
                            || !pending
                                .iter()
                                .any(|other| other.id() != pkg.id() && other.satisfies(dependency))
                    });
                if mandatory_met && optional_clear {
                    placed.push(pending.remove(index));
                } else {
                    index += 1;
                }
            }
            if placed.len() == before {
                break;
            }
        }
        if pending.is_empty() {
            return Ok(placed);
        }
    }

    if strict {
        for pkg in &pending {
            for dependency in &pkg.dependencies {
                if !met_by(dependency, &placed, kept) && !met_by(dependency, &pending, &[]) {
                    return Err(ResolverError::unresolvable(format!(
                        "Unable to order {}: dependency {dependency} cannot be satisfied",
                        pkg.id()
                    )));
                }
            }
        }
    }

    warn!(
        residual = ?pending.iter().map(|pkg| pkg.id()).collect::<Vec<_>>(),
        "appending packages whose dependencies could not be sequenced"
    );
    placed.extend(pending);
    Ok(placed)
}
