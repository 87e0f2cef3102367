//! Catalogue collaborator
//!
//! The resolver reads packages only through the [`Catalogue`] trait. The
//! in-memory implementation backs tests and embedders that already hold the
//! package lists; [`CachedCatalogue`] puts a TTL cache in front of any other
//! implementation.

use chrono::{DateTime, Duration, Utc};
use plugpm_types::{Package, Version};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Read-only view over local and remote packages
pub trait Catalogue: Send + Sync {
    /// Every known package, one entry per id, local copies first
    fn list_all_packages(&self) -> Vec<Package>;

    /// Packages whose lifecycle state counts as installed
    fn list_installed_packages(&self) -> Vec<Package>;

    /// Remote catalogue entries for `name`
    fn find_remote_packages(&self, name: &str) -> Vec<Package>;

    /// Look up a package by `name-version` id
    fn get_package(&self, id: &str) -> Option<Package>;

    /// All packages named `name`, ascending by version
    fn find_packages(&self, name: &str) -> Vec<Package> {
        let mut packages: Vec<Package> = self
            .list_all_packages()
            .into_iter()
            .filter(|pkg| pkg.name == name)
            .collect();
        packages.sort_by(|a, b| a.version.cmp(&b.version));
        packages
    }

    /// Versions of `name` present locally
    fn find_local_versions(&self, name: &str) -> Vec<Version> {
        self.find_packages(name)
            .into_iter()
            .filter(Package::is_local)
            .map(|pkg| pkg.version)
            .collect()
    }

    /// The installed package named `name`, if any
    fn find_installed(&self, name: &str) -> Option<Package> {
        self.list_installed_packages()
            .into_iter()
            .find(|pkg| pkg.name == name)
    }
}

/// Catalogue over fixed local and remote package lists
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogue {
    local: BTreeMap<String, Package>,
    remote: BTreeMap<String, Package>,
}

impl MemoryCatalogue {
    #[must_use]
    pub fn new(local: Vec<Package>, remote: Vec<Package>) -> Self {
        Self {
            local: local.into_iter().map(|pkg| (pkg.id(), pkg)).collect(),
            remote: remote.into_iter().map(|pkg| (pkg.id(), pkg)).collect(),
        }
    }

    /// Add or replace a local package
    pub fn add_local(&mut self, package: Package) {
        self.local.insert(package.id(), package);
    }

    /// Add or replace a remote package
    pub fn add_remote(&mut self, package: Package) {
        self.remote.insert(package.id(), package);
    }
}

impl Catalogue for MemoryCatalogue {
    fn list_all_packages(&self) -> Vec<Package> {
        let mut all = self.remote.clone();
        // local copy wins on id clash
        all.extend(self.local.clone());
        all.into_values().collect()
    }

    fn list_installed_packages(&self) -> Vec<Package> {
        self.local
            .values()
            .filter(|pkg| pkg.installed())
            .cloned()
            .collect()
    }

    fn find_remote_packages(&self, name: &str) -> Vec<Package> {
        let mut packages: Vec<Package> = self
            .remote
            .values()
            .filter(|pkg| pkg.name == name)
            .cloned()
            .collect();
        packages.sort_by(|a, b| a.version.cmp(&b.version));
        packages
    }

    fn get_package(&self, id: &str) -> Option<Package> {
        self.local
            .get(id)
            .or_else(|| self.remote.get(id))
            .cloned()
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    packages: Vec<Package>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    fn new(packages: Vec<Package>) -> Self {
        Self {
            packages,
            fetched_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        Utc::now() - self.fetched_at >= ttl
    }
}

/// TTL cache in front of another catalogue
///
/// The package listings are kept as snapshots and refreshed once older than
/// the configured time-to-live. A zero TTL disables caching.
#[derive(Debug)]
pub struct CachedCatalogue<C> {
    inner: C,
    ttl: Duration,
    all: RwLock<Option<Snapshot>>,
    installed: RwLock<Option<Snapshot>>,
}

impl<C: Catalogue> CachedCatalogue<C> {
    pub fn new(inner: C, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            all: RwLock::new(None),
            installed: RwLock::new(None),
        }
    }

    /// Drop cached snapshots so the next call hits the wrapped catalogue
    pub fn invalidate(&self) {
        for slot in [&self.all, &self.installed] {
            if let Ok(mut guard) = slot.write() {
                *guard = None;
            }
        }
    }

    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn cached(
        &self,
        slot: &RwLock<Option<Snapshot>>,
        fetch: impl FnOnce() -> Vec<Package>,
    ) -> Vec<Package> {
        if let Ok(guard) = slot.read() {
            if let Some(snapshot) = guard.as_ref().filter(|s| !s.is_stale(self.ttl)) {
                return snapshot.packages.clone();
            }
        }

        let packages = fetch();
        tracing::trace!(count = packages.len(), "refreshed catalogue snapshot");
        if let Ok(mut guard) = slot.write() {
            *guard = Some(Snapshot::new(packages.clone()));
        }
        packages
    }
}

impl<C: Catalogue> Catalogue for CachedCatalogue<C> {
    fn list_all_packages(&self) -> Vec<Package> {
        self.cached(&self.all, || self.inner.list_all_packages())
    }

    fn list_installed_packages(&self) -> Vec<Package> {
        self.cached(&self.installed, || self.inner.list_installed_packages())
    }

    fn find_remote_packages(&self, name: &str) -> Vec<Package> {
        self.inner.find_remote_packages(name)
    }

    fn get_package(&self, id: &str) -> Option<Package> {
        self.list_all_packages()
            .into_iter()
            .find(|pkg| pkg.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugpm_types::PackageState;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pkg(name: &str, version: &str) -> Package {
        Package::new(name, Version::parse(version).unwrap())
    }

    #[test]
    fn test_local_copy_wins() {
        let catalogue = MemoryCatalogue::new(
            vec![pkg("a", "1.0.0").with_state(PackageState::Installed)],
            vec![pkg("a", "1.0.0"), pkg("a", "1.1.0")],
        );

        let all = catalogue.list_all_packages();
        assert_eq!(all.len(), 2);
        let a1 = catalogue.get_package("a-1.0.0").unwrap();
        assert!(a1.installed());
        assert_eq!(
            catalogue.find_local_versions("a"),
            vec![Version::parse("1.0.0").unwrap()]
        );
        assert_eq!(catalogue.find_remote_packages("a").len(), 2);
        assert_eq!(catalogue.find_installed("a").unwrap().id(), "a-1.0.0");
    }

    struct Counting {
        inner: MemoryCatalogue,
        calls: AtomicUsize,
    }

    impl Catalogue for Counting {
        fn list_all_packages(&self) -> Vec<Package> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.list_all_packages()
        }

        fn list_installed_packages(&self) -> Vec<Package> {
            self.inner.list_installed_packages()
        }

        fn find_remote_packages(&self, name: &str) -> Vec<Package> {
            self.inner.find_remote_packages(name)
        }

        fn get_package(&self, id: &str) -> Option<Package> {
            self.inner.get_package(id)
        }
    }

    fn counting() -> Counting {
        Counting {
            inner: MemoryCatalogue::new(Vec::new(), vec![pkg("a", "1.0.0")]),
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_cache_serves_snapshot_within_ttl() {
        let cached = CachedCatalogue::new(counting(), Duration::minutes(5));
        assert_eq!(cached.list_all_packages().len(), 1);
        assert_eq!(cached.list_all_packages().len(), 1);
        assert!(cached.get_package("a-1.0.0").is_some());
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 1);

        cached.invalidate();
        cached.list_all_packages();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_ttl_always_refreshes() {
        let cached = CachedCatalogue::new(counting(), Duration::zero());
        cached.list_all_packages();
        cached.list_all_packages();
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
    }
}
