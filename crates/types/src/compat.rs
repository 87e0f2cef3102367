//! Target platform compatibility
//!
//! A package is checked against a platform first through its declared
//! platform name and version range. When no usable range is declared the
//! check falls back to glob matching the `target_platforms` entries.

use crate::{Package, PlatformId, Restriction};
use glob::{MatchOptions, Pattern};

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Check whether `package` may be installed on `platform`
#[must_use]
pub fn is_compatible(package: &Package, platform: &PlatformId) -> bool {
    if let Some(restriction) = usable_restriction(package) {
        if let Some(name) = package
            .target_platform_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            if platform_name_matches(name, platform.name()) {
                return restriction.contains(platform.version());
            }
        }
    }
    matches_target_platforms(&package.target_platforms, platform)
}

fn usable_restriction(package: &Package) -> Option<Restriction> {
    let spec = package.target_platform_range.as_deref()?;
    match Restriction::parse(spec) {
        Ok(restriction) => Some(restriction),
        Err(err) => {
            tracing::debug!(
                package = %package.id(),
                error = %err,
                "ignoring unusable target platform range"
            );
            None
        }
    }
}

fn has_wildcard(text: &str) -> bool {
    text.contains(['*', '?'])
}

fn platform_name_matches(declared: &str, name: &str) -> bool {
    if has_wildcard(declared) {
        Pattern::new(declared).is_ok_and(|pattern| pattern.matches(name))
    } else {
        declared == name
    }
}

/// Glob fallback: empty declarations match everything, otherwise one
/// declared entry must match one spelling of the platform id (either side
/// may hold the wildcard)
#[must_use]
pub fn matches_target_platforms(declared: &[String], platform: &PlatformId) -> bool {
    if declared.is_empty() {
        return true;
    }
    let forms = platform.possible_string_forms();
    declared.iter().any(|entry| {
        forms
            .iter()
            .any(|form| glob_match(entry, form) || glob_match(form, entry))
    })
}

fn glob_match(pattern: &str, candidate: &str) -> bool {
    if !has_wildcard(pattern) {
        return pattern.eq_ignore_ascii_case(candidate);
    }
    Pattern::new(pattern).is_ok_and(|p| p.matches_with(candidate, CASE_INSENSITIVE))
}
