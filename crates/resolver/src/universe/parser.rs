//! Universe text parsing

use super::{
    Clause, Constraint, PackageDescription, RequestDescription, CONFLICTS, DEPENDS, INSTALL,
    INSTALLED, PACKAGE, PROVIDES, REMOVE, REQUEST, UPGRADE, VERSION,
};
use plugpm_errors::ResolverError;
use std::collections::BTreeMap;

type Parsed = (BTreeMap<String, PackageDescription>, Option<RequestDescription>);

/// Parse package stanzas keyed by `name-ordinal`
///
/// # Errors
///
/// Returns `MalformedUniverseText` on an unknown tag, a stanza that does not
/// start with `package:`, a request stanza, or an invalid field value.
pub fn parse_universe(text: &str) -> Result<BTreeMap<String, PackageDescription>, ResolverError> {
    parse(text, false).map(|(packages, _)| packages)
}

/// Parse package stanzas plus the optional trailing request stanza
///
/// # Errors
///
/// Returns `MalformedUniverseText` on any syntax error.
pub fn parse_document(text: &str) -> Result<Parsed, ResolverError> {
    parse(text, true)
}

enum Stanza {
    Package {
        line: usize,
        name: String,
        ordinal: Option<u32>,
        installed: bool,
        depends: Vec<Clause>,
        conflicts: Vec<Clause>,
        provides: Vec<Clause>,
    },
    Request(RequestDescription),
}

fn parse(text: &str, allow_request: bool) -> Result<Parsed, ResolverError> {
    let mut packages = BTreeMap::new();
    let mut request = None;
    let mut current: Option<Stanza> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() {
            if let Some(stanza) = current.take() {
                finish(stanza, &mut packages, &mut request)?;
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let (tag, value) = line.split_once(':').ok_or_else(|| {
            ResolverError::malformed(line_no, format!("expected 'tag: value', got '{line}'"))
        })?;
        let tag = tag.trim();
        let value = value.trim();

        match current.as_mut() {
            None => {
                current = Some(match tag {
                    PACKAGE if !value.is_empty() => Stanza::Package {
                        line: line_no,
                        name: value.to_string(),
                        ordinal: None,
                        installed: false,
                        depends: Vec::new(),
                        conflicts: Vec::new(),
                        provides: Vec::new(),
                    },
                    PACKAGE => return Err(ResolverError::malformed(line_no, "empty package name")),
                    REQUEST if allow_request && request.is_none() => {
                        Stanza::Request(RequestDescription::default())
                    }
                    REQUEST => {
                        return Err(ResolverError::malformed(line_no, "unexpected request stanza"))
                    }
                    other => {
                        return Err(ResolverError::malformed(
                            line_no,
                            format!("stanza must start with '{PACKAGE}:', got '{other}:'"),
                        ))
                    }
                });
            }
            Some(Stanza::Package {
                ordinal,
                installed,
                depends,
                conflicts,
                provides,
                ..
            }) => match tag {
                VERSION => *ordinal = Some(parse_ordinal(value, line_no)?),
                INSTALLED => *installed = parse_bool(value, line_no)?,
                DEPENDS => depends.extend(parse_clauses(value, line_no)?),
                CONFLICTS => conflicts.extend(parse_clauses(value, line_no)?),
                PROVIDES => provides.extend(parse_clauses(value, line_no)?),
                other => {
                    return Err(ResolverError::malformed(
                        line_no,
                        format!("unknown package field '{other}'"),
                    ))
                }
            },
            Some(Stanza::Request(req)) => match tag {
                INSTALL => req.install.extend(parse_clauses(value, line_no)?),
                REMOVE => req.remove.extend(parse_clauses(value, line_no)?),
                UPGRADE => req.upgrade.extend(parse_clauses(value, line_no)?),
                other => {
                    return Err(ResolverError::malformed(
                        line_no,
                        format!("unknown request field '{other}'"),
                    ))
                }
            },
        }
    }

    if let Some(stanza) = current.take() {
        finish(stanza, &mut packages, &mut request)?;
    }
    Ok((packages, request))
}

fn finish(
    stanza: Stanza,
    packages: &mut BTreeMap<String, PackageDescription>,
    request: &mut Option<RequestDescription>,
) -> Result<(), ResolverError> {
    match stanza {
        Stanza::Package {
            line,
            name,
            ordinal,
            installed,
            depends,
            conflicts,
            provides,
        } => {
            let ordinal = ordinal.ok_or_else(|| {
                ResolverError::malformed(line, format!("package '{name}' has no version"))
            })?;
            let description = PackageDescription {
                name,
                ordinal,
                installed,
                depends,
                conflicts,
                provides,
            };
            let key = description.key();
            if packages.insert(key.clone(), description).is_some() {
                return Err(ResolverError::malformed(line, format!("duplicate package {key}")));
            }
        }
        Stanza::Request(req) => *request = Some(req),
    }
    Ok(())
}

fn parse_ordinal(value: &str, line: usize) -> Result<u32, ResolverError> {
    match value.parse::<u32>() {
        Ok(ordinal) if ordinal > 0 => Ok(ordinal),
        _ => Err(ResolverError::malformed(
            line,
            format!("version must be a positive integer, got '{value}'"),
        )),
    }
}

fn parse_bool(value: &str, line: usize) -> Result<bool, ResolverError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ResolverError::malformed(
            line,
            format!("expected true or false, got '{value}'"),
        )),
    }
}

fn parse_clauses(value: &str, line: usize) -> Result<Vec<Clause>, ResolverError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_clause(part, line))
        .collect()
}

fn parse_clause(part: &str, line: usize) -> Result<Clause, ResolverError> {
    let tokens: Vec<&str> = part.split_whitespace().collect();
    match tokens.as_slice() {
        [name] => Ok(Clause::any(*name)),
        [name, op, ordinal] => {
            let k = parse_ordinal(ordinal, line)?;
            let constraint = match *op {
                "=" => Constraint::Eq(k),
                "!=" => Constraint::Ne(k),
                ">=" => Constraint::AtLeast(k),
                "<=" => Constraint::AtMost(k),
                other => {
                    return Err(ResolverError::malformed(
                        line,
                        format!("unknown operator '{other}'"),
                    ))
                }
            };
            Ok(Clause::new(*name, constraint))
        }
        _ => Err(ResolverError::malformed(
            line,
            format!("cannot parse clause '{part}'"),
        )),
    }
}
