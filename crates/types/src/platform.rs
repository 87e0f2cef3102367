//! Target platform versions, version ranges and ids
//!
//! Platform versions are compared through a zero-padded comparable
//! string (`0010.0010.0000-HF02`), so qualifiers order lexicographically
//! and case-insensitively after the numeric part.

use plugpm_errors::VersionError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Largest value a numeric part may hold before it is ignored
pub const MAX_VERSION_PART_VALUE: u32 = 9_999;

/// Version of the platform a package targets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformVersion {
    major: Option<u32>,
    minor: Option<u32>,
    build: Option<u32>,
    qualifier: Option<String>,
    comparable: String,
}

impl PlatformVersion {
    /// Parse `major[.minor[.build]][-qualifier]`
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidPlatformVersion` if the input is blank,
    /// contains range delimiters, does not start with a numeric major part,
    /// or has whitespace inside the qualifier.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidPlatformVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.trim().is_empty() {
            return Err(invalid("Version cannot be blank"));
        }
        if input.contains([',', '[', ']', '(', ')']) {
            return Err(invalid(
                "Version cannot contain commas (','), brackets ('[]') or parenthesis ('()')",
            ));
        }

        let (numeric, qualifier) = match input.split_once('-') {
            Some((numeric, qualifier)) => (numeric, Some(qualifier.trim())),
            None => (input, None),
        };

        let mut parts = numeric.split('.').map(str::trim);
        let major = parts.next().unwrap_or_default();
        if !is_digits(major) {
            return Err(invalid("Version should at least explicit a major number"));
        }
        let major = parse_part(major);
        let minor = parts.next().and_then(parse_part);
        let build = parts.next().and_then(parse_part);
        if parts.next().is_some() {
            tracing::warn!(
                version = input,
                "too many parts in platform version, parts after the 3rd dot are ignored"
            );
        }

        let qualifier = match qualifier {
            Some(q) if q.chars().any(char::is_whitespace) => {
                return Err(invalid("Version cannot contain whitespaces in qualifier"));
            }
            Some(q) if !q.is_empty() => Some(q.to_string()),
            _ => None,
        };

        let mut version = Self {
            major,
            minor,
            build,
            qualifier,
            comparable: String::new(),
        };
        version.comparable = version.compute_comparable();
        Ok(version)
    }

    #[must_use]
    pub fn major(&self) -> u32 {
        self.major.unwrap_or(0)
    }

    #[must_use]
    pub fn minor(&self) -> u32 {
        self.minor.unwrap_or(0)
    }

    #[must_use]
    pub fn build(&self) -> u32 {
        self.build.unwrap_or(0)
    }

    #[must_use]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Zero-padded string used for ordering and equality
    #[must_use]
    pub fn comparable(&self) -> &str {
        &self.comparable
    }

    /// Normalized `major.minor.build[-qualifier]` rendering
    #[must_use]
    pub fn as_string(&self) -> String {
        let mut out = format!("{}.{}.{}", self.major(), self.minor(), self.build());
        if let Some(qualifier) = &self.qualifier {
            out.push('-');
            out.push_str(qualifier);
        }
        out
    }

    /// Every textual spelling of this version: `1`, `1.0` and `1.0.0` for a
    /// major-only version, `1.1` and `1.1.0` for major.minor, and so on
    #[must_use]
    pub fn possible_string_forms(&self) -> Vec<String> {
        let (major, minor, build) = (self.major(), self.minor(), self.build());
        let mut forms = Vec::with_capacity(3);
        if self.minor.is_none() && self.build.is_none() {
            forms.push(major.to_string());
        }
        if self.build.is_none() {
            forms.push(format!("{major}.{minor}"));
        }
        forms.push(format!("{major}.{minor}.{build}"));

        if let Some(qualifier) = &self.qualifier {
            for form in &mut forms {
                form.push('-');
                form.push_str(qualifier);
            }
        }
        forms
    }

    fn compute_comparable(&self) -> String {
        let mut comparable = format!(
            "{:04}.{:04}.{:04}",
            self.major(),
            self.minor(),
            self.build()
        );
        if let Some(qualifier) = &self.qualifier {
            comparable.push('-');
            comparable.push_str(&qualifier.to_uppercase());
        }
        comparable
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn parse_part(s: &str) -> Option<u32> {
    if !is_digits(s) {
        return None;
    }
    s.parse::<u32>()
        .ok()
        .filter(|value| *value <= MAX_VERSION_PART_VALUE)
}

impl PartialEq for PlatformVersion {
    fn eq(&self, other: &Self) -> bool {
        self.comparable == other.comparable
    }
}

impl Eq for PlatformVersion {}

impl Hash for PlatformVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.comparable.hash(state);
    }
}

impl Ord for PlatformVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparable.cmp(&other.comparable)
    }
}

impl PartialOrd for PlatformVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for PlatformVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PlatformVersion {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlatformVersion> for String {
    fn from(version: PlatformVersion) -> Self {
        version.as_string()
    }
}

/// Interval of platform versions, written `[a,b]`, `(a,b)`, `[a,)`,
/// `(,b]`, `[x]` or a bare version (exactly `x`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Restriction {
    lower: Option<PlatformVersion>,
    lower_inclusive: bool,
    upper: Option<PlatformVersion>,
    upper_inclusive: bool,
}

impl Restriction {
    /// Restriction containing every platform version
    #[must_use]
    pub fn everything() -> Self {
        Self {
            lower: None,
            lower_inclusive: false,
            upper: None,
            upper_inclusive: false,
        }
    }

    /// Build a restriction from explicit bounds
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidRestriction` when the interval is
    /// degenerate (equal bounds with an exclusive side) or reversed.
    pub fn new(
        lower: Option<PlatformVersion>,
        lower_inclusive: bool,
        upper: Option<PlatformVersion>,
        upper_inclusive: bool,
    ) -> Result<Self, VersionError> {
        let restriction = Self {
            lower,
            lower_inclusive,
            upper,
            upper_inclusive,
        };
        restriction.validate()?;
        Ok(restriction)
    }

    /// Parse a range spec
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidRestriction` for blank specs, malformed
    /// brackets, unparsable bounds, and degenerate or reversed intervals.
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidRestriction {
            input: spec.to_string(),
            reason: reason.to_string(),
        };
        let version = |text: &str| {
            PlatformVersion::parse(text).map_err(|e| invalid(&e.to_string()))
        };

        let spec_trimmed = spec.trim();
        if spec_trimmed.is_empty() {
            return Err(invalid("Range cannot be blank"));
        }
        let opens_inclusive = spec_trimmed.starts_with('[');
        let closes_inclusive = spec_trimmed.ends_with(']');
        let opens_exclusive = spec_trimmed.starts_with('(');
        let closes_exclusive = spec_trimmed.ends_with(')');

        if !spec_trimmed.contains(',') {
            let single = if opens_inclusive && closes_inclusive {
                spec_trimmed[1..spec_trimmed.len() - 1].trim()
            } else if opens_inclusive || closes_inclusive || opens_exclusive || closes_exclusive {
                return Err(invalid(
                    "Single version can only have inclusive boundaries ('[x.y.z]')",
                ));
            } else {
                spec_trimmed
            };
            let single = version(single)?;
            return Ok(Self {
                lower: Some(single.clone()),
                lower_inclusive: true,
                upper: Some(single),
                upper_inclusive: true,
            });
        }

        if !opens_inclusive && !opens_exclusive {
            return Err(invalid("Range should start with '[' or '('"));
        }
        if !closes_inclusive && !closes_exclusive {
            return Err(invalid("Range should end with ']' or ')'"));
        }

        let inner = spec_trimmed[1..spec_trimmed.len() - 1].trim();
        let (lower, upper) = inner
            .split_once(',')
            .ok_or_else(|| invalid("Range should contain a comma"))?;
        let lower = match lower.trim() {
            "" => None,
            text => Some(version(text)?),
        };
        let upper = match upper.trim() {
            "" => None,
            text => Some(version(text)?),
        };

        Self::new(lower, opens_inclusive, upper, closes_inclusive)
            .map_err(|e| invalid(&e.to_string()))
    }

    fn validate(&self) -> Result<(), VersionError> {
        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            let spec = self.to_string();
            if lower == upper && !(self.lower_inclusive && self.upper_inclusive) {
                return Err(VersionError::InvalidRestriction {
                    input: spec,
                    reason: "Range cannot have identical boundaries with exclusions".to_string(),
                });
            }
            if upper < lower {
                return Err(VersionError::InvalidRestriction {
                    input: spec,
                    reason: "Range defies version ordering".to_string(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn lower(&self) -> Option<&PlatformVersion> {
        self.lower.as_ref()
    }

    #[must_use]
    pub fn upper(&self) -> Option<&PlatformVersion> {
        self.upper.as_ref()
    }

    #[must_use]
    pub fn is_lower_inclusive(&self) -> bool {
        self.lower_inclusive
    }

    #[must_use]
    pub fn is_upper_inclusive(&self) -> bool {
        self.upper_inclusive
    }

    /// Test both bounds against a platform version
    #[must_use]
    pub fn contains(&self, version: &PlatformVersion) -> bool {
        if let Some(lower) = &self.lower {
            match lower.cmp(version) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.lower_inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match upper.cmp(version) {
                Ordering::Less => return false,
                Ordering::Equal if !self.upper_inclusive => return false,
                _ => {}
            }
        }
        true
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.lower_inclusive { "[" } else { "(" })?;
        if let Some(lower) = &self.lower {
            write!(f, "{lower}")?;
        }
        f.write_str(",")?;
        if let Some(upper) = &self.upper {
            write!(f, "{upper}")?;
        }
        f.write_str(if self.upper_inclusive { "]" } else { ")" })
    }
}

impl FromStr for Restriction {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Platform name plus version, written `name-version`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformId {
    name: String,
    version: PlatformVersion,
}

impl PlatformId {
    #[must_use]
    pub fn of(name: impl Into<String>, version: PlatformVersion) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Parse `name-version`, splitting at the last hyphen that leaves a
    /// parsable version (`server-10.10-SNAPSHOT` is `server` + `10.10-SNAPSHOT`)
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidPlatformId` when no hyphen yields a
    /// valid platform version.
    pub fn parse(id: &str) -> Result<Self, VersionError> {
        let mut search = id;
        while let Some(idx) = search.rfind('-') {
            let (name, version) = (&id[..idx], &id[idx + 1..]);
            if let Ok(version) = PlatformVersion::parse(version) {
                return Ok(Self::of(name, version));
            }
            search = &id[..idx];
        }
        Err(VersionError::InvalidPlatformId {
            input: id.to_string(),
        })
    }

    /// Build from separate name and version strings
    ///
    /// # Errors
    ///
    /// Returns an error if the version does not parse.
    pub fn from_parts(name: impl Into<String>, version: &str) -> Result<Self, VersionError> {
        Ok(Self::of(name, PlatformVersion::parse(version)?))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> &PlatformVersion {
        &self.version
    }

    #[must_use]
    pub fn as_string(&self) -> String {
        format!("{}-{}", self.name, self.version.as_string())
    }

    /// Every `name-version` spelling, used for glob matching
    #[must_use]
    pub fn possible_string_forms(&self) -> Vec<String> {
        self.version
            .possible_string_forms()
            .into_iter()
            .map(|form| format!("{}-{form}", self.name))
            .collect()
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for PlatformId {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
