//! Optional dependency reinstall cascade
//!
//! An installed package has to be reinstalled when one of its optional
//! dependencies starts being satisfiable, or stops being satisfied, because
//! of the planned changes.

use plugpm_types::Package;
use std::collections::BTreeSet;
use tracing::debug;

/// Install and removal sets after forced reinstalls were added
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub to_install: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
    /// `(reinstalled package id, triggering package id)` pairs
    pub forced: Vec<(String, String)>,
}

/// Add forced reinstalls for installed packages whose optional dependencies
/// change state
///
/// `lookup` resolves ids from the install set. Every forced package lands in
/// both returned sets, so the result needs ordering again.
pub fn reconcile<F>(
    installed: &[Package],
    to_install: &BTreeSet<String>,
    to_remove: &BTreeSet<String>,
    lookup: F,
) -> Reconciliation
where
    F: Fn(&str) -> Option<Package>,
{
    let incoming: Vec<Package> = to_install.iter().filter_map(|id| lookup(id)).collect();
    let mut result = Reconciliation {
        to_install: to_install.clone(),
        to_remove: to_remove.clone(),
        forced: Vec::new(),
    };

    for pkg in installed {
        let id = pkg.id();
        if to_remove.contains(&id) {
            continue;
        }

        for dependency in &pkg.optional_dependencies {
            let matched = installed.iter().find(|other| other.satisfies(dependency));
            let trigger = match matched {
                None => incoming
                    .iter()
                    .find(|other| other.satisfies(dependency))
                    .map(Package::id),
                Some(current) if to_remove.contains(&current.id()) => {
                    let still_met = installed
                        .iter()
                        .filter(|other| !to_remove.contains(&other.id()))
                        .chain(incoming.iter())
                        .any(|other| other.satisfies(dependency));
                    (!still_met).then(|| current.id())
                }
                Some(_) => None,
            };

            if let Some(trigger) = trigger {
                debug!(
                    package = %id,
                    dependency = %dependency,
                    trigger = %trigger,
                    "forcing reinstall"
                );
                result.to_install.insert(id.clone());
                result.to_remove.insert(id.clone());
                result.forced.push((id.clone(), trigger));
                break;
            }
        }
    }
    result
}
