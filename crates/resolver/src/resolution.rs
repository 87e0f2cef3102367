//! Resolution snapshots
//!
//! A [`Resolution`] is built by a strategy, then refined by categorization,
//! reconciliation and ordering. Each step consumes the previous snapshot and
//! returns a new one; nothing is shared or mutated in place.

use crate::catalogue::Catalogue;
use plugpm_errors::ResolverError;
use plugpm_types::{package_id, PackageState, Version};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Tri-state outcome of a resolve call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Pending,
    Success,
    Failed(String),
}

/// The plan produced by one resolve call
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    outcome: Outcome,
    failure: Option<ResolverError>,
    fallback: bool,
    selected: BTreeMap<String, Version>,
    new_downloads: BTreeMap<String, Version>,
    local_installs: BTreeMap<String, Version>,
    local_upgrades: BTreeMap<String, Version>,
    local_unchanged: BTreeMap<String, Version>,
    local_removals: BTreeMap<String, Version>,
    /// Installed versions superseded by an upgrade
    replaced: BTreeMap<String, Version>,
    /// Installed SNAPSHOT ids reinstalled from their remote build
    refreshed: BTreeSet<String>,
    ordered_install: Vec<String>,
    ordered_remove: Vec<String>,
    forced_reinstalls: Vec<(String, String)>,
    sorted: bool,
}

impl Resolution {
    /// An empty resolution that has not run yet
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// A failed resolution carrying the typed error
    #[must_use]
    pub fn failed(error: ResolverError) -> Self {
        Self {
            outcome: Outcome::Failed(error.to_string()),
            failure: Some(error),
            ..Self::default()
        }
    }

    /// A successful selection, not yet categorized
    #[must_use]
    pub fn selected(
        selected: BTreeMap<String, Version>,
        removals: BTreeMap<String, Version>,
    ) -> Self {
        Self {
            outcome: Outcome::Success,
            selected,
            local_removals: removals,
            ..Self::default()
        }
    }

    /// Mark this resolution as a fallback that forces removals
    #[must_use]
    pub fn into_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Record refreshed SNAPSHOT ids; ids outside the selection are ignored
    #[must_use]
    pub fn with_refreshed(mut self, refreshed: &BTreeSet<String>) -> Self {
        self.refreshed = self
            .selected
            .iter()
            .map(|(name, version)| package_id(name, version))
            .filter(|id| refreshed.contains(id))
            .collect();
        self
    }

    /// Split the selection into download/install/upgrade/unchanged sets
    #[must_use]
    pub fn categorize(self, catalogue: &dyn Catalogue) -> Self {
        if !self.is_validated() {
            return self;
        }

        let mut next = Self {
            outcome: self.outcome,
            fallback: self.fallback,
            selected: self.selected,
            local_removals: self.local_removals,
            refreshed: self.refreshed,
            sorted: true,
            ..Self::default()
        };

        for (name, version) in &next.selected {
            let id = package_id(name, version);
            let Some(pkg) = catalogue.get_package(&id) else {
                return Self::failed(ResolverError::UnknownPackage { package: id });
            };
            let local_versions = catalogue.find_local_versions(name);
            let remote = pkg.state <= PackageState::Remote;

            if next.refreshed.contains(&id) {
                next.new_downloads.insert(name.clone(), version.clone());
                next.replaced.insert(name.clone(), version.clone());
                continue;
            }
            if !local_versions.is_empty() && !local_versions.contains(version) {
                next.local_upgrades.insert(name.clone(), version.clone());
                if remote {
                    next.new_downloads.insert(name.clone(), version.clone());
                }
            } else if remote {
                next.new_downloads.insert(name.clone(), version.clone());
            } else if pkg.state.is_downloaded() {
                next.local_installs.insert(name.clone(), version.clone());
            } else if pkg.installed() {
                next.local_unchanged.insert(name.clone(), version.clone());
            }

            if let Some(installed) = catalogue.find_installed(name) {
                if &installed.version != version {
                    next.replaced.insert(name.clone(), installed.version);
                }
            }
        }
        next
    }

    /// Attach the execution order and forced reinstalls
    #[must_use]
    pub fn with_order(
        mut self,
        ordered_install: Vec<String>,
        ordered_remove: Vec<String>,
        forced_reinstalls: Vec<(String, String)>,
    ) -> Self {
        self.ordered_install = ordered_install;
        self.ordered_remove = ordered_remove;
        self.forced_reinstalls = forced_reinstalls;
        self
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// The typed error behind a failed outcome
    #[must_use]
    pub fn failure(&self) -> Option<&ResolverError> {
        self.failure.as_ref()
    }

    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed(message) => Some(message),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.outcome == Outcome::Success
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// True when the strategy had to force removals of installed packages
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Chosen `name -> version` universe
    #[must_use]
    pub fn selected_versions(&self) -> &BTreeMap<String, Version> {
        &self.selected
    }

    #[must_use]
    pub fn new_downloads(&self) -> &BTreeMap<String, Version> {
        &self.new_downloads
    }

    #[must_use]
    pub fn local_installs(&self) -> &BTreeMap<String, Version> {
        &self.local_installs
    }

    #[must_use]
    pub fn local_upgrades(&self) -> &BTreeMap<String, Version> {
        &self.local_upgrades
    }

    #[must_use]
    pub fn local_unchanged(&self) -> &BTreeMap<String, Version> {
        &self.local_unchanged
    }

    #[must_use]
    pub fn local_removals(&self) -> &BTreeMap<String, Version> {
        &self.local_removals
    }

    #[must_use]
    pub fn ordered_install(&self) -> &[String] {
        &self.ordered_install
    }

    #[must_use]
    pub fn ordered_remove(&self) -> &[String] {
        &self.ordered_remove
    }

    /// Installed SNAPSHOT ids downloaded again and reinstalled
    #[must_use]
    pub fn refreshed_ids(&self) -> &BTreeSet<String> {
        &self.refreshed
    }

    /// `(installed id, triggering id)` pairs
    #[must_use]
    pub fn forced_reinstalls(&self) -> &[(String, String)] {
        &self.forced_reinstalls
    }

    /// Ids that must be installed, before ordering
    #[must_use]
    pub fn install_ids(&self) -> BTreeSet<String> {
        ids(&self.new_downloads)
            .chain(ids(&self.local_installs))
            .chain(ids(&self.local_upgrades))
            .collect()
    }

    /// Ids that must be removed, before ordering
    #[must_use]
    pub fn removal_ids(&self) -> BTreeSet<String> {
        ids(&self.local_removals).chain(ids(&self.replaced)).collect()
    }

    /// Ids that stay installed as they are
    #[must_use]
    pub fn unchanged_ids(&self) -> BTreeSet<String> {
        ids(&self.local_unchanged).collect()
    }

    /// Remote ids to fetch, including upgrades
    #[must_use]
    pub fn download_ids(&self) -> BTreeSet<String> {
        ids(&self.new_downloads).collect()
    }

    #[must_use]
    pub fn requires_changes(&self) -> bool {
        !(self.local_removals.is_empty()
            && self.local_upgrades.is_empty()
            && self.local_installs.is_empty()
            && self.new_downloads.is_empty())
    }

    /// Convert back into a `Result`, keeping the typed error
    ///
    /// # Errors
    ///
    /// Returns the failure of a failed resolution.
    pub fn into_result(self) -> Result<Self, ResolverError> {
        match (&self.outcome, &self.failure) {
            (Outcome::Failed(_), Some(error)) => Err(error.clone()),
            (Outcome::Failed(message), None) => Err(ResolverError::unresolvable(message.clone())),
            _ => Ok(self),
        }
    }
}

fn ids(map: &BTreeMap<String, Version>) -> impl Iterator<Item = String> + '_ {
    map.iter().map(|(name, version)| package_id(name, version))
}

fn write_set(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    set: &BTreeMap<String, Version>,
) -> fmt::Result {
    write!(f, "{label}: ")?;
    for (name, version) in set {
        write!(f, "{name}:{version}, ")?;
    }
    writeln!(f)
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Failed(message) => write!(f, "Failed to resolve dependencies: {message}"),
            Outcome::Pending => f.write_str("Resolution pending"),
            Outcome::Success if !self.sorted => {
                for (name, version) in &self.selected {
                    write!(f, "{name}:{version}, ")?;
                }
                Ok(())
            }
            Outcome::Success => {
                write_set(f, "Packages to download", &self.new_downloads)?;
                write_set(f, "Packages to install (already in local)", &self.local_installs)?;
                write_set(f, "Packages to upgrade", &self.local_upgrades)?;
                write_set(f, "Unchanged packages", &self.local_unchanged)?;
                write_set(f, "Local packages to remove", &self.local_removals)?;
                write!(f, "Installation order: {}", self.ordered_install.join("/"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::MemoryCatalogue;
    use plugpm_types::Package;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn catalogue() -> MemoryCatalogue {
        MemoryCatalogue::new(
            vec![
                Package::new("kept", v("1.0.0")).with_state(PackageState::Installed),
                Package::new("upgraded", v("1.0.0")).with_state(PackageState::Installed),
                Package::new("fetched", v("2.0.0")).with_state(PackageState::Downloaded),
            ],
            vec![
                Package::new("upgraded", v("1.1.0")),
                Package::new("fresh", v("3.0.0")),
            ],
        )
    }

    #[test]
    fn test_categorize() {
        let selected: BTreeMap<String, Version> = [
            ("kept", "1.0.0"),
            ("upgraded", "1.1.0"),
            ("fetched", "2.0.0"),
            ("fresh", "3.0.0"),
        ]
        .into_iter()
        .map(|(name, version)| (name.to_string(), v(version)))
        .collect();

        let resolution = Resolution::selected(selected, BTreeMap::new()).categorize(&catalogue());
        assert!(resolution.is_validated());
        assert!(resolution.is_sorted());
        assert!(resolution.local_unchanged().contains_key("kept"));
        assert!(resolution.local_upgrades().contains_key("upgraded"));
        assert!(resolution.new_downloads().contains_key("upgraded"));
        assert!(resolution.new_downloads().contains_key("fresh"));
        assert!(resolution.local_installs().contains_key("fetched"));
        assert_eq!(
            resolution.install_ids().into_iter().collect::<Vec<_>>(),
            vec!["fetched-2.0.0", "fresh-3.0.0", "upgraded-1.1.0"]
        );
        assert_eq!(
            resolution.removal_ids().into_iter().collect::<Vec<_>>(),
            vec!["upgraded-1.0.0"]
        );
        assert!(resolution.requires_changes());
    }

    #[test]
    fn test_refreshed_snapshot_is_reinstalled() {
        let catalogue = MemoryCatalogue::new(
            vec![Package::new("tool", v("1.0.0-SNAPSHOT")).with_state(PackageState::Started)],
            vec![Package::new("tool", v("1.0.0-SNAPSHOT"))],
        );
        let selected = BTreeMap::from([("tool".to_string(), v("1.0.0-SNAPSHOT"))]);
        let refreshed = BTreeSet::from([
            "tool-1.0.0-SNAPSHOT".to_string(),
            "other-1.0.0".to_string(),
        ]);

        let resolution = Resolution::selected(selected, BTreeMap::new())
            .with_refreshed(&refreshed)
            .categorize(&catalogue);
        assert_eq!(resolution.refreshed_ids().len(), 1);
        assert!(resolution.local_unchanged().is_empty());
        assert!(resolution.new_downloads().contains_key("tool"));
        assert!(resolution.install_ids().contains("tool-1.0.0-SNAPSHOT"));
        assert!(resolution.removal_ids().contains("tool-1.0.0-SNAPSHOT"));
        assert!(resolution.requires_changes());
    }

    #[test]
    fn test_failed_keeps_error() {
        let resolution = Resolution::failed(ResolverError::unresolvable("nope"));
        assert!(resolution.is_failed());
        assert_eq!(resolution.failure_message(), Some("nope"));
        assert_eq!(resolution.to_string(), "Failed to resolve dependencies: nope");
        assert!(resolution.into_result().is_err());
    }

    #[test]
    fn test_unknown_selection_fails_categorization() {
        let selected = BTreeMap::from([("ghost".to_string(), v("1.0.0"))]);
        let resolution = Resolution::selected(selected, BTreeMap::new()).categorize(&catalogue());
        assert!(matches!(
            resolution.failure(),
            Some(ResolverError::UnknownPackage { .. })
        ));
    }
}
