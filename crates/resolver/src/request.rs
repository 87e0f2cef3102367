//! Resolve requests and their translation into dependency expressions

use crate::catalogue::Catalogue;
use plugpm_errors::ResolverError;
use plugpm_types::{Package, PackageDependency, PlatformId, VersionRange};
use std::collections::BTreeSet;

/// An install/remove/upgrade request
///
/// Entries are either exact package ids (`name-version`) or dependency
/// expressions (`name` or `name:range`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub install: Vec<String>,
    pub remove: Vec<String>,
    pub upgrade: Vec<String>,
    pub target_platform: Option<PlatformId>,
    pub allow_snapshot: bool,
    pub keep: bool,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            install: Vec::new(),
            remove: Vec::new(),
            upgrade: Vec::new(),
            target_platform: None,
            allow_snapshot: false,
            keep: true,
        }
    }
}

impl Request {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add install entries
    #[must_use]
    pub fn with_install<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.install.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Add remove entries
    #[must_use]
    pub fn with_remove<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove.extend(entries.into_iter().map(Into::into));
        self
    }

    /// Add upgrade entries
    #[must_use]
    pub fn with_upgrade<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upgrade.extend(entries.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_target_platform(mut self, platform: PlatformId) -> Self {
        self.target_platform = Some(platform);
        self
    }

    #[must_use]
    pub fn allow_snapshot(mut self, allow: bool) -> Self {
        self.allow_snapshot = allow;
        self
    }

    #[must_use]
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// True when there is nothing to install, remove or upgrade
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty() && self.upgrade.is_empty()
    }

    /// Translate every entry against the catalogue
    ///
    /// # Errors
    ///
    /// `UnknownPackage` when an entry names nothing the catalogue knows,
    /// `ConflictingConstraints` when the entries contradict each other.
    pub fn dependencies(
        &self,
        catalogue: &dyn Catalogue,
    ) -> Result<RequestedDependencies, ResolverError> {
        let all = catalogue.list_all_packages();
        let translate = |entries: &[String]| -> Result<Vec<PackageDependency>, ResolverError> {
            entries
                .iter()
                .map(|entry| translate_entry(entry, &all))
                .collect()
        };

        let requested = RequestedDependencies {
            install: translate(&self.install)?,
            remove: translate(&self.remove)?,
            upgrade: translate(&self.upgrade)?,
        };
        requested.check_consistency()?;
        Ok(requested)
    }
}

fn translate_entry(entry: &str, all: &[Package]) -> Result<PackageDependency, ResolverError> {
    let entry = entry.trim();
    if let Some(pkg) = all.iter().find(|pkg| pkg.id() == entry) {
        return Ok(PackageDependency::new(
            pkg.name.clone(),
            VersionRange::exact(pkg.version.clone()),
        ));
    }

    let dependency =
        PackageDependency::parse(entry).map_err(|_| ResolverError::UnknownPackage {
            package: entry.to_string(),
        })?;
    if all.iter().any(|pkg| pkg.name == dependency.name) {
        Ok(dependency)
    } else {
        Err(ResolverError::UnknownPackage {
            package: entry.to_string(),
        })
    }
}

/// Request entries after translation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedDependencies {
    pub install: Vec<PackageDependency>,
    pub remove: Vec<PackageDependency>,
    pub upgrade: Vec<PackageDependency>,
}

impl RequestedDependencies {
    /// Every dependency of the request
    pub fn iter(&self) -> impl Iterator<Item = &PackageDependency> {
        self.install
            .iter()
            .chain(self.remove.iter())
            .chain(self.upgrade.iter())
    }

    /// Names appearing anywhere in the request
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.iter().map(|dep| dep.name.clone()).collect()
    }

    /// Names pinned by a SNAPSHOT bound
    #[must_use]
    pub fn snapshot_names(&self) -> BTreeSet<String> {
        self.iter()
            .filter(|dep| dep.range.has_snapshot_bound())
            .map(|dep| dep.name.clone())
            .collect()
    }

    fn check_consistency(&self) -> Result<(), ResolverError> {
        let same_name = |a: &PackageDependency, b: &PackageDependency| a.name == b.name;
        for (i, install) in self.install.iter().enumerate() {
            if let Some(remove) = self
                .remove
                .iter()
                .find(|remove| same_name(install, remove) && remove.range.overlaps(&install.range))
            {
                return Err(ResolverError::ConflictingConstraints {
                    name: install.name.clone(),
                    message: format!("requested install of {install} and removal of {remove}"),
                });
            }
            if let Some(other) = self.install[i + 1..]
                .iter()
                .find(|other| same_name(install, other) && !other.range.overlaps(&install.range))
            {
                return Err(ResolverError::ConflictingConstraints {
                    name: install.name.clone(),
                    message: format!("{install} and {other} cannot both be installed"),
                });
            }
        }
        Ok(())
    }
}
