//! Plugin version model
//!
//! Versions look like `major[.minor[.patch]][-classifier][-SNAPSHOT]`:
//! - `5`, `5.0` and `5.0.0` are the same version
//! - `5.0.1-SNAPSHOT` sorts before the `5.0.1` release
//! - special classifiers (`rc1`, `alpha`, `beta2`, `I20181119_2333`) sort
//!   before any other classifier of the same numeric version
//!
//! Ranges are written `min:max` (both inclusive) or `min` alone.

use plugpm_errors::VersionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

fn special_classifier_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"(?i)^(rc|alpha|beta)\d*$", r"^[a-zA-Z]\d{8}"]
            .into_iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// A plugin version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    classifier: Option<String>,
    snapshot: bool,
}

impl Version {
    /// The `0.0.0` version, used as the implicit lower bound of ranges
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a release version from numeric components
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            classifier: None,
            snapshot: false,
        }
    }

    /// Attach a classifier (`5.0.1` -> `5.0.1-CMF`)
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        let classifier = classifier.into();
        self.classifier = if classifier.is_empty() {
            None
        } else {
            Some(classifier)
        };
        self
    }

    /// Mark this version as a SNAPSHOT build
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Parse a version string
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` if the string is blank, has a
    /// non-numeric component, more than three numeric components, or an
    /// empty classifier.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }

        let (body, snapshot) = match trimmed.strip_suffix(SNAPSHOT_SUFFIX) {
            Some(body) => (body, true),
            None => (trimmed, false),
        };

        let (numeric, classifier) = match body.split_once('-') {
            Some((_, "")) => return Err(invalid()),
            Some((numeric, classifier)) => (numeric, Some(classifier.to_string())),
            None => (body, None),
        };

        let mut components = [0u32; 3];
        let mut count = 0;
        for part in numeric.split('.') {
            if count == components.len() || part.is_empty() {
                return Err(invalid());
            }
            components[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            classifier,
            snapshot,
        })
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.major
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        self.minor
    }

    #[must_use]
    pub fn patch(&self) -> u32 {
        self.patch
    }

    /// Classifier without the SNAPSHOT marker
    #[must_use]
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    /// Whether the classifier is a pre-release marker (`rc`, `alpha`,
    /// `beta`, optionally numbered) or a dated build (`I20181119...`)
    #[must_use]
    pub fn is_special_classifier(&self) -> bool {
        self.classifier
            .as_deref()
            .is_some_and(is_special_classifier)
    }

    #[must_use]
    pub fn greater_than(&self, other: &Self) -> bool {
        self > other
    }

    #[must_use]
    pub fn greater_or_equal(&self, other: &Self) -> bool {
        self >= other
    }

    #[must_use]
    pub fn less_than(&self, other: &Self) -> bool {
        self < other
    }

    #[must_use]
    pub fn less_or_equal(&self, other: &Self) -> bool {
        self <= other
    }
}

fn is_special_classifier(classifier: &str) -> bool {
    special_classifier_patterns()
        .iter()
        .any(|pattern| pattern.is_match(classifier))
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let numeric = (self.major, self.minor, self.patch).cmp(&(
            other.major,
            other.minor,
            other.patch,
        ));
        if numeric != Ordering::Equal {
            return numeric;
        }

        let ca = self.classifier.as_deref().unwrap_or("");
        let cb = other.classifier.as_deref().unwrap_or("");
        if ca == cb {
            // SNAPSHOT sorts below the build it precedes
            return match (self.snapshot, other.snapshot) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            };
        }

        match (is_special_classifier(ca), is_special_classifier(cb)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => ca.cmp(cb),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.classifier.as_deref().unwrap_or("").hash(state);
        self.snapshot.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(classifier) = &self.classifier {
            write!(f, "-{classifier}")?;
        }
        if self.snapshot {
            f.write_str(SNAPSHOT_SUFFIX)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// Inclusive version interval
///
/// A range with only a max has an implicit `0.0.0` lower bound; a range
/// with neither bound accepts every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    min: Option<Version>,
    max: Option<Version>,
}

impl VersionRange {
    /// Range accepting every version
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Range with explicit bounds
    #[must_use]
    pub fn new(min: Option<Version>, max: Option<Version>) -> Self {
        Self { min, max }
    }

    /// Range containing exactly one version
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(version.clone()),
            max: Some(version),
        }
    }

    /// Parse `min:max`, `min`, `:max` or the empty string
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidRange` if either bound is not a valid
    /// version.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let bound = |text: &str| -> Result<Option<Version>, VersionError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            Version::parse(text)
                .map(Some)
                .map_err(|_| VersionError::InvalidRange {
                    input: input.to_string(),
                })
        };

        match trimmed.split_once(':') {
            Some((min, max)) => Ok(Self {
                min: bound(min)?,
                max: bound(max)?,
            }),
            None => Ok(Self {
                min: bound(trimmed)?,
                max: None,
            }),
        }
    }

    #[must_use]
    pub fn min(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    #[must_use]
    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    /// True when no bound is set
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// True when either bound is a SNAPSHOT version
    #[must_use]
    pub fn has_snapshot_bound(&self) -> bool {
        self.min.as_ref().is_some_and(Version::is_snapshot)
            || self.max.as_ref().is_some_and(Version::is_snapshot)
    }

    /// Check whether a version falls inside the range (bounds inclusive)
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match (&self.min, &self.max) {
            (None, None) => true,
            (Some(min), None) => version >= min,
            (None, Some(max)) => version >= &Version::ZERO && version <= max,
            (Some(min), Some(max)) => version >= min && version <= max,
        }
    }

    /// Check whether the two ranges share at least one bound
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.is_any() || other.is_any() {
            return true;
        }
        let inside = |range: &Self, bound: Option<&Version>| bound.is_some_and(|v| range.matches(v));
        inside(self, other.min())
            || inside(self, other.max())
            || inside(other, self.min())
            || inside(other, self.max())
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => Ok(()),
            (Some(min), None) => write!(f, "{min}"),
            (None, Some(max)) => write!(f, ":{max}"),
            (Some(min), Some(max)) => write!(f, "{min}:{max}"),
        }
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_components() {
        let version = v("5.0.1-CMF-SNAPSHOT");
        assert_eq!(version.major(), 5);
        assert_eq!(version.minor(), 0);
        assert_eq!(version.patch(), 1);
        assert_eq!(version.classifier(), Some("CMF"));
        assert!(version.is_snapshot());
        assert_eq!(version.to_string(), "5.0.1-CMF-SNAPSHOT");

        let version = v("1-SNAPSHOT");
        assert_eq!(version.classifier(), None);
        assert!(version.is_snapshot());
        assert_eq!(version.to_string(), "1.0.0-SNAPSHOT");

        assert_eq!(v("9.10-HF01").to_string(), "9.10.0-HF01");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("   ").is_err());
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("1..2").is_err());
        assert!(Version::parse("1.0-").is_err());
    }

    #[test]
    fn test_total_order() {
        let mut versions: Vec<Version> = [
            "5.2.1",
            "5.0.1-CMF",
            "5.0.1",
            "5.0.1-CMF-SNAPSHOT",
            "5.0.0",
            "5.0.1-SNAPSHOT",
            "5",
            "5.0",
        ]
        .iter()
        .map(|s| v(s))
        .collect();
        versions.sort();

        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "5.0.0",
                "5.0.0",
                "5.0.0",
                "5.0.1-SNAPSHOT",
                "5.0.1",
                "5.0.1-CMF-SNAPSHOT",
                "5.0.1-CMF",
                "5.2.1",
            ]
        );
        assert_eq!(v("5"), v("5.0"));
        assert_eq!(v("5.0"), v("5.0.0"));
    }

    #[test]
    fn test_special_classifiers_sort_first() {
        assert!(v("5.2.1-RC1") < v("5.2.1-RC2"));
        assert!(v("5.2.1-RC2") < v("5.2.1-SNAPSHOT"));
        assert!(v("5.2.1-SNAPSHOT") < v("5.2.1"));
        assert!(v("5.2.1-beta") < v("5.2.1"));
        assert!(v("5.2.1-alpha3") < v("5.2.1-HF01"));
        assert!(v("9.10-I20181119_2333") < v("9.10"));
        assert!(v("5.2.1-rc1").is_special_classifier());
        assert!(!v("5.2.1-CMF").is_special_classifier());
        assert!(!v("5.2.1-release1").is_special_classifier());
    }

    #[test]
    fn test_equal_versions_hash_alike() {
        use std::collections::HashSet;
        let set: HashSet<Version> = [v("5"), v("5.0"), v("5.0.0")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_range_inclusivity() {
        let range = VersionRange::parse("1.0.0:2.0.0").unwrap();
        for ok in ["1.0.0", "1.5.0", "2.0.0"] {
            assert!(range.matches(&v(ok)), "{ok} should match");
        }
        for ko in ["0.9.9", "2.0.1"] {
            assert!(!range.matches(&v(ko)), "{ko} should not match");
        }
    }

    #[test]
    fn test_range_forms() {
        let min_only = VersionRange::parse("1.0").unwrap();
        assert_eq!(min_only.to_string(), "1.0.0");
        assert!(min_only.matches(&v("7.3")));
        assert!(!min_only.matches(&v("0.9")));

        let max_only = VersionRange::parse(":2.0").unwrap();
        assert!(max_only.min().is_none());
        assert!(max_only.matches(&v("0.1")));
        assert!(!max_only.matches(&v("2.1")));
        assert_eq!(max_only.to_string(), ":2.0.0");

        let any = VersionRange::parse("").unwrap();
        assert!(any.is_any());
        assert_eq!(any.to_string(), "");

        assert!(VersionRange::parse("1.0:x").is_err());
    }

    #[test]
    fn test_range_overlaps() {
        let a = VersionRange::parse("1.0:2.0").unwrap();
        let b = VersionRange::parse("1.5:3.0").unwrap();
        let c = VersionRange::parse("2.1:3.0").unwrap();
        let inner = VersionRange::parse("1.2:1.3").unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.overlaps(&inner));
        assert!(inner.overlaps(&a));
        assert!(VersionRange::any().overlaps(&c));
    }

    #[test]
    fn test_snapshot_bound() {
        assert!(VersionRange::parse("1.0-SNAPSHOT").unwrap().has_snapshot_bound());
        assert!(VersionRange::parse("1.0:2.0-SNAPSHOT").unwrap().has_snapshot_bound());
        assert!(!VersionRange::parse("1.0:2.0").unwrap().has_snapshot_bound());
    }
}
