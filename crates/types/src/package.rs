//! Package-related type definitions

use crate::{Version, VersionRange};
use plugpm_errors::VersionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Build the canonical `name-version` package id
#[must_use]
pub fn package_id(name: &str, version: &Version) -> String {
    format!("{name}-{version}")
}

/// A dependency, conflict or provides declaration: `name` or `name:range`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageDependency {
    pub name: String,
    pub range: VersionRange,
}

impl PackageDependency {
    /// Dependency on any version of `name`
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: VersionRange::any(),
        }
    }

    pub fn new(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    /// Parse `name[:range]`, splitting at the first colon
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidDependency` if the name is blank and
    /// `VersionError::InvalidRange` if the range does not parse.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let (name, range) = match trimmed.split_once(':') {
            Some((name, range)) => (name.trim(), VersionRange::parse(range)?),
            None => (trimmed, VersionRange::any()),
        };
        if name.is_empty() {
            return Err(VersionError::InvalidDependency {
                input: input.to_string(),
            });
        }
        Ok(Self::new(name, range))
    }

    /// Whether the given package name and version satisfy this declaration
    #[must_use]
    pub fn matches(&self, name: &str, version: &Version) -> bool {
        self.name == name && self.range.matches(version)
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.range.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.name, self.range)
        }
    }
}

impl FromStr for PackageDependency {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PackageDependency {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PackageDependency> for String {
    fn from(dep: PackageDependency) -> Self {
        dep.to_string()
    }
}

/// Lifecycle state of a package, ordered from least to most installed
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    #[default]
    Unknown,
    Remote,
    Downloading,
    Downloaded,
    Installing,
    Installed,
    Started,
}

impl PackageState {
    /// Installing, Installed and Started count as installed
    #[must_use]
    pub fn is_installed(self) -> bool {
        self >= Self::Installing
    }

    /// Downloading or Downloaded: present locally but not installed
    #[must_use]
    pub fn is_downloaded(self) -> bool {
        matches!(self, Self::Downloading | Self::Downloaded)
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::Remote => "remote",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Started => "started",
        };
        f.write_str(label)
    }
}

/// Kind of package distributed through the catalogue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    #[default]
    Addon,
    HotFix,
    Studio,
}

/// The package view consumed by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub package_type: PackageType,
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
    #[serde(default)]
    pub optional_dependencies: Vec<PackageDependency>,
    #[serde(default)]
    pub conflicts: Vec<PackageDependency>,
    #[serde(default)]
    pub provides: Vec<PackageDependency>,
    /// Glob patterns over `platform-version` strings
    #[serde(default)]
    pub target_platforms: Vec<String>,
    /// Platform version range spec, see `Restriction::parse`
    #[serde(default)]
    pub target_platform_range: Option<String>,
    #[serde(default)]
    pub target_platform_name: Option<String>,
    #[serde(default)]
    pub state: PackageState,
    #[serde(default)]
    pub local: bool,
}

impl Package {
    /// A remote add-on with no declarations
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            package_type: PackageType::Addon,
            dependencies: Vec::new(),
            optional_dependencies: Vec::new(),
            conflicts: Vec::new(),
            provides: Vec::new(),
            target_platforms: Vec::new(),
            target_platform_range: None,
            target_platform_name: None,
            state: PackageState::Remote,
            local: false,
        }
    }

    /// `name-version`
    #[must_use]
    pub fn id(&self) -> String {
        package_id(&self.name, &self.version)
    }

    #[must_use]
    pub fn installed(&self) -> bool {
        self.state.is_installed()
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Set lifecycle state; any state past Remote implies a local copy
    #[must_use]
    pub fn with_state(mut self, state: PackageState) -> Self {
        self.state = state;
        self.local = state > PackageState::Remote;
        self
    }

    #[must_use]
    pub fn with_type(mut self, package_type: PackageType) -> Self {
        self.package_type = package_type;
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: PackageDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn with_optional_dependency(mut self, dependency: PackageDependency) -> Self {
        self.optional_dependencies.push(dependency);
        self
    }

    #[must_use]
    pub fn with_conflict(mut self, conflict: PackageDependency) -> Self {
        self.conflicts.push(conflict);
        self
    }

    #[must_use]
    pub fn with_provides(mut self, provides: PackageDependency) -> Self {
        self.provides.push(provides);
        self
    }

    #[must_use]
    pub fn with_target_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_platform_range(
        mut self,
        name: impl Into<String>,
        range: impl Into<String>,
    ) -> Self {
        self.target_platform_name = Some(name.into());
        self.target_platform_range = Some(range.into());
        self
    }

    /// Whether one of the `provides` declarations satisfies `dependency`
    #[must_use]
    pub fn provides_for(&self, dependency: &PackageDependency) -> bool {
        self.provides.iter().any(|provided| {
            provided.name == dependency.name && provided.range.overlaps(&dependency.range)
        })
    }

    /// Whether this package satisfies `dependency` directly or via `provides`
    #[must_use]
    pub fn satisfies(&self, dependency: &PackageDependency) -> bool {
        dependency.matches(&self.name, &self.version) || self.provides_for(dependency)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_dependency_parse() {
        let dep = PackageDependency::parse("nuxeo-dm").unwrap();
        assert_eq!(dep.name, "nuxeo-dm");
        assert!(dep.range.is_any());
        assert_eq!(dep.to_string(), "nuxeo-dm");

        let dep = PackageDependency::parse("my-package:1.0:2.0").unwrap();
        assert_eq!(dep.name, "my-package");
        assert_eq!(dep.range.min(), Some(&v("1.0")));
        assert_eq!(dep.range.max(), Some(&v("2.0")));
        assert_eq!(dep.to_string(), "my-package:1.0.0:2.0.0");

        let dep = PackageDependency::parse("my-package:0:1").unwrap();
        assert_eq!(dep.range.min(), Some(&v("0")));
        assert!(dep.matches("my-package", &v("0.5")));

        assert!(PackageDependency::parse(":1.0").is_err());
        assert!(PackageDependency::parse("pkg:abc").is_err());
    }

    #[test]
    fn test_state_invariant() {
        assert!(!PackageState::Remote.is_installed());
        assert!(!PackageState::Downloaded.is_installed());
        assert!(PackageState::Installing.is_installed());
        assert!(PackageState::Installed.is_installed());
        assert!(PackageState::Started.is_installed());
        assert!(PackageState::Downloading.is_downloaded());
    }

    #[test]
    fn test_package_id_and_flags() {
        let pkg = Package::new("nuxeo-jsf-ui", v("9.10")).with_state(PackageState::Installed);
        assert_eq!(pkg.id(), "nuxeo-jsf-ui-9.10.0");
        assert!(pkg.installed());
        assert!(pkg.is_local());

        let remote = Package::new("nuxeo-jsf-ui", v("9.10"));
        assert!(!remote.installed());
        assert!(!remote.is_local());
    }

    #[test]
    fn test_provides_satisfaction() {
        let pkg = Package::new("impl", v("1.0"))
            .with_provides(PackageDependency::parse("api:2.0").unwrap());
        assert!(pkg.satisfies(&PackageDependency::parse("api:1.5:2.5").unwrap()));
        assert!(pkg.satisfies(&PackageDependency::parse("impl").unwrap()));
        assert!(!pkg.satisfies(&PackageDependency::parse("other").unwrap()));
    }

    #[test]
    fn test_package_deserializes_from_json() {
        let json = r#"{
            "name": "test-opt-dep1",
            "version": "1.0.0",
            "optional_dependencies": ["zz-nuxeo-jsf-ui:1.0.0:1.0.0"],
            "state": "downloaded",
            "local": true
        }"#;
        let pkg: Package = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.id(), "test-opt-dep1-1.0.0");
        assert_eq!(pkg.optional_dependencies.len(), 1);
        assert_eq!(pkg.state, PackageState::Downloaded);
        assert!(pkg.dependencies.is_empty());
    }
}
