//! Constraint universe codec
//!
//! Packages are exchanged with the solver in a line-oriented, CUDF-style text
//! format. Real versions never reach the solver: every name's versions are
//! mapped to dense ordinals starting at 1, in ascending version order.

mod builder;
mod parser;

pub use builder::{DroppedClause, Universe, UniverseBuilder};
pub use parser::{parse_document, parse_universe};

use std::fmt;

pub(crate) const PACKAGE: &str = "package";
pub(crate) const VERSION: &str = "version";
pub(crate) const INSTALLED: &str = "installed";
pub(crate) const DEPENDS: &str = "depends";
pub(crate) const CONFLICTS: &str = "conflicts";
pub(crate) const PROVIDES: &str = "provides";
pub(crate) const REQUEST: &str = "request";
pub(crate) const INSTALL: &str = "install";
pub(crate) const REMOVE: &str = "remove";
pub(crate) const UPGRADE: &str = "upgrade";

/// `name-ordinal`, the key identifying one candidate in the universe
#[must_use]
pub fn ordinal_key(name: &str, ordinal: u32) -> String {
    format!("{name}-{ordinal}")
}

/// Version constraint on ordinals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    Any,
    Eq(u32),
    Ne(u32),
    AtLeast(u32),
    AtMost(u32),
}

impl Constraint {
    #[must_use]
    pub fn accepts(self, ordinal: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Eq(k) => ordinal == k,
            Self::Ne(k) => ordinal != k,
            Self::AtLeast(k) => ordinal >= k,
            Self::AtMost(k) => ordinal <= k,
        }
    }
}

/// One `name [op ordinal]` clause
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    pub name: String,
    pub constraint: Constraint,
}

impl Clause {
    pub fn new(name: impl Into<String>, constraint: Constraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, Constraint::Any)
    }

    /// Whether candidate `name` at `ordinal` falls under this clause
    #[must_use]
    pub fn accepts(&self, name: &str, ordinal: u32) -> bool {
        self.name == name && self.constraint.accepts(ordinal)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.constraint {
            Constraint::Any => write!(f, "{}", self.name),
            Constraint::Eq(k) => write!(f, "{} = {k}", self.name),
            Constraint::Ne(k) => write!(f, "{} != {k}", self.name),
            Constraint::AtLeast(k) => write!(f, "{} >= {k}", self.name),
            Constraint::AtMost(k) => write!(f, "{} <= {k}", self.name),
        }
    }
}

/// One package stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescription {
    pub name: String,
    pub ordinal: u32,
    pub installed: bool,
    pub depends: Vec<Clause>,
    pub conflicts: Vec<Clause>,
    pub provides: Vec<Clause>,
}

impl PackageDescription {
    #[must_use]
    pub fn key(&self) -> String {
        ordinal_key(&self.name, self.ordinal)
    }

    /// Whether this candidate satisfies `clause` by name or through `provides`
    #[must_use]
    pub fn satisfies(&self, clause: &Clause) -> bool {
        clause.accepts(&self.name, self.ordinal)
            || self.provides.iter().any(|provided| {
                provided.name == clause.name
                    && match provided.constraint {
                        Constraint::Eq(k) => clause.constraint.accepts(k),
                        _ => true,
                    }
            })
    }
}

/// The trailing request stanza
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDescription {
    pub install: Vec<Clause>,
    pub remove: Vec<Clause>,
    pub upgrade: Vec<Clause>,
}

/// Serialized universe handed to a constraint solver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniverseText(String);

impl UniverseText {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniverseText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn write_field(out: &mut String, tag: &str, value: &str) {
    out.push_str(tag);
    out.push(':');
    if !value.is_empty() {
        out.push(' ');
        out.push_str(value);
    }
    out.push('\n');
}

pub(crate) fn join_clauses(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clause_display_and_accepts() {
        assert_eq!(Clause::any("a").to_string(), "a");
        assert_eq!(Clause::new("a", Constraint::AtLeast(2)).to_string(), "a >= 2");
        assert_eq!(Clause::new("a", Constraint::Ne(1)).to_string(), "a != 1");
        assert!(Clause::new("a", Constraint::AtMost(2)).accepts("a", 1));
        assert!(!Clause::new("a", Constraint::AtMost(2)).accepts("a", 3));
        assert!(!Clause::any("a").accepts("b", 1));
    }

    #[test]
    fn test_provides_satisfaction() {
        let provider = PackageDescription {
            name: "impl".to_string(),
            ordinal: 1,
            installed: false,
            depends: Vec::new(),
            conflicts: Vec::new(),
            provides: vec![Clause::new("api", Constraint::Eq(2)), Clause::any("virtual")],
        };
        assert!(provider.satisfies(&Clause::new("api", Constraint::AtLeast(2))));
        assert!(!provider.satisfies(&Clause::new("api", Constraint::AtLeast(3))));
        assert!(provider.satisfies(&Clause::new("virtual", Constraint::Eq(7))));
        assert!(provider.satisfies(&Clause::any("impl")));
    }
}
