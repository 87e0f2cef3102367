//! Branch-and-bound reference solver
//!
//! Each universe name takes at most one ordinal. Names are decided in sorted
//! order; a partial assignment is abandoned as soon as a decided clause fails
//! or its cost can no longer beat the best complete assignment found so far.

use super::{Category, ConstraintSolver, Criterion, OptimizationPreset, SolverOutput};
use crate::universe::{
    parse_document, Clause, PackageDescription, RequestDescription, UniverseText,
};
use plugpm_errors::ResolverError;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Default constraint solver shipped with the resolver
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSolver {
    node_budget: u64,
}

impl ReferenceSolver {
    #[must_use]
    pub fn new(node_budget: u64) -> Self {
        Self {
            node_budget: node_budget.max(1),
        }
    }
}

impl Default for ReferenceSolver {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl ConstraintSolver for ReferenceSolver {
    fn solve(
        &self,
        universe: &UniverseText,
        preset: OptimizationPreset,
    ) -> Result<SolverOutput, ResolverError> {
        let (packages, request) = parse_document(universe.as_str())?;
        let problem = Problem::new(
            packages.into_values().collect(),
            request.unwrap_or_default(),
        );
        let mut search = Search::new(&problem, preset, self.node_budget);
        let cost = vec![0; preset.criteria().len()];
        search.run(0, &cost);

        debug!(
            nodes = search.stats.nodes,
            pruned = search.stats.pruned,
            solutions = search.stats.solutions,
            exhausted = search.exhausted,
            "reference solver finished"
        );

        let Some(best) = search.best.take() else {
            let message = if search.exhausted {
                "search budget exhausted before a solution was found"
            } else {
                "No solution found."
            };
            return Err(ResolverError::SolverFailure {
                message: message.to_string(),
            });
        };
        Ok(problem.output(&best.assignment, !search.exhausted))
    }
}

#[derive(Debug)]
struct Slot {
    name: String,
    /// Candidates ascending by ordinal
    candidates: Vec<PackageDescription>,
    installed: Option<u32>,
    newest: u32,
    /// Values to try, as ordinals; `None` leaves the name out
    domain: Vec<Option<u32>>,
}

struct Problem {
    slots: Vec<Slot>,
    /// Last slot index whose decision can affect a clause on this name
    decided_at: HashMap<String, usize>,
    request: RequestDescription,
}

impl Problem {
    fn new(packages: Vec<PackageDescription>, request: RequestDescription) -> Self {
        let mut grouped: BTreeMap<String, Vec<PackageDescription>> = BTreeMap::new();
        for pkg in packages {
            grouped.entry(pkg.name.clone()).or_default().push(pkg);
        }

        let slots: Vec<Slot> = grouped
            .into_iter()
            .map(|(name, mut candidates)| {
                candidates.sort_by_key(|c| c.ordinal);
                let installed = candidates.iter().find(|c| c.installed).map(|c| c.ordinal);
                let newest = candidates.last().map_or(0, |c| c.ordinal);
                let mut domain: Vec<Option<u32>> = Vec::with_capacity(candidates.len() + 1);
                match installed {
                    Some(ordinal) => domain.push(Some(ordinal)),
                    None => domain.push(None),
                }
                domain.extend(
                    candidates
                        .iter()
                        .rev()
                        .map(|c| c.ordinal)
                        .filter(|ordinal| Some(*ordinal) != installed)
                        .map(Some),
                );
                if installed.is_some() {
                    domain.push(None);
                }
                Slot {
                    name,
                    candidates,
                    installed,
                    newest,
                    domain,
                }
            })
            .collect();

        let mut decided_at: HashMap<String, usize> = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.name.clone(), i))
            .collect();
        for (i, slot) in slots.iter().enumerate() {
            for provided in slot.candidates.iter().flat_map(|c| &c.provides) {
                let entry = decided_at.entry(provided.name.clone()).or_insert(i);
                *entry = (*entry).max(i);
            }
        }

        Self {
            slots,
            decided_at,
            request,
        }
    }

    fn decision_index(&self, clause: &Clause) -> usize {
        self.decided_at.get(&clause.name).copied().unwrap_or(0)
    }

    fn candidate(&self, slot: usize, ordinal: u32) -> Option<&PackageDescription> {
        self.slots[slot]
            .candidates
            .iter()
            .find(|c| c.ordinal == ordinal)
    }

    fn output(&self, assignment: &[Option<u32>], optimal: bool) -> SolverOutput {
        let mut output = SolverOutput {
            optimal,
            ..SolverOutput::default()
        };
        for (slot, value) in self.slots.iter().zip(assignment) {
            let category = match (slot.installed, *value) {
                (None, None) => continue,
                (Some(installed), None) => {
                    output
                        .classification
                        .insert((slot.name.clone(), installed), Category::Removed);
                    continue;
                }
                (None, Some(_)) => Category::New,
                (Some(installed), Some(selected)) if installed == selected => Category::Unchanged,
                (Some(_), Some(_)) => Category::VersionChanged,
            };
            if let Some(selected) = value {
                output.solution.insert((slot.name.clone(), *selected));
                output
                    .classification
                    .insert((slot.name.clone(), *selected), category);
            }
        }
        output
    }
}

#[derive(Debug, Default)]
struct SearchStats {
    nodes: u64,
    pruned: u64,
    solutions: u64,
}

struct Best {
    assignment: Vec<Option<u32>>,
    cost: Vec<u64>,
}

struct Search<'p> {
    problem: &'p Problem,
    criteria: &'static [Criterion],
    budget: u64,
    assignment: Vec<Option<u32>>,
    best: Option<Best>,
    exhausted: bool,
    stats: SearchStats,
}

impl<'p> Search<'p> {
    fn new(problem: &'p Problem, preset: OptimizationPreset, budget: u64) -> Self {
        Self {
            problem,
            criteria: preset.criteria(),
            budget,
            assignment: vec![None; problem.slots.len()],
            best: None,
            exhausted: false,
            stats: SearchStats::default(),
        }
    }

    fn run(&mut self, depth: usize, cost: &[u64]) {
        if self.exhausted {
            return;
        }
        if self.stats.nodes >= self.budget {
            self.exhausted = true;
            return;
        }
        self.stats.nodes += 1;

        if let Some(best) = &self.best {
            if cost >= best.cost.as_slice() {
                self.stats.pruned += 1;
                return;
            }
        }

        if depth == self.problem.slots.len() {
            if self.problem.slots.is_empty() && !self.request_satisfied_when_empty() {
                return;
            }
            self.stats.solutions += 1;
            self.best = Some(Best {
                assignment: self.assignment.clone(),
                cost: cost.to_vec(),
            });
            return;
        }

        let problem = self.problem;
        let slot = &problem.slots[depth];
        for &value in &slot.domain {
            self.assignment[depth] = value;
            if self.consistent(depth) {
                let next: Vec<u64> = cost
                    .iter()
                    .zip(self.criteria)
                    .map(|(total, criterion)| total + contribution(slot, value, *criterion))
                    .collect();
                self.run(depth + 1, &next);
            }
            self.assignment[depth] = None;
            if self.exhausted {
                return;
            }
        }
    }

    fn request_satisfied_when_empty(&self) -> bool {
        self.problem.request.install.is_empty() && self.problem.request.upgrade.is_empty()
    }

    fn selected(&self, upto: usize) -> impl Iterator<Item = (usize, &PackageDescription)> + '_ {
        (0..=upto).filter_map(move |slot| {
            self.assignment[slot]
                .and_then(|ordinal| self.problem.candidate(slot, ordinal))
                .map(|pkg| (slot, pkg))
        })
    }

    fn is_provided(&self, clause: &Clause, upto: usize) -> bool {
        self.selected(upto).any(|(_, pkg)| pkg.satisfies(clause))
    }

    /// Check every clause that becomes decided once `depth` is assigned
    fn consistent(&self, depth: usize) -> bool {
        let fresh = self.assignment[depth]
            .and_then(|ordinal| self.problem.candidate(depth, ordinal));

        for (slot, pkg) in self.selected(depth) {
            for clause in &pkg.depends {
                let decided = self.problem.decision_index(clause);
                let check = if slot == depth { decided <= depth } else { decided == depth };
                if check && !self.is_provided(clause, depth) {
                    return false;
                }
            }
            if let Some(fresh) = fresh {
                if slot != depth {
                    let clashes = |a: &PackageDescription, b: &PackageDescription| {
                        a.conflicts.iter().any(|clause| b.satisfies(clause))
                    };
                    if clashes(pkg, fresh) || clashes(fresh, pkg) {
                        return false;
                    }
                }
            }
        }

        let request = &self.problem.request;
        for clause in request.install.iter().chain(&request.upgrade) {
            if self.problem.decision_index(clause) == depth && !self.is_provided(clause, depth) {
                return false;
            }
        }
        let slot = &self.problem.slots[depth];
        if let (Some(installed), Some(selected)) = (slot.installed, self.assignment[depth]) {
            let upgrading = request.upgrade.iter().any(|clause| clause.name == slot.name);
            if upgrading && selected < installed {
                return false;
            }
        }
        if let Some(fresh) = fresh {
            if request
                .remove
                .iter()
                .any(|clause| clause.accepts(&fresh.name, fresh.ordinal))
            {
                return false;
            }
        }
        true
    }
}

fn contribution(slot: &Slot, value: Option<u32>, criterion: Criterion) -> u64 {
    let hit = match criterion {
        Criterion::Removed => slot.installed.is_some() && value.is_none(),
        Criterion::Changed => slot.installed != value,
        Criterion::NotUpToDate => value.is_some_and(|ordinal| ordinal < slot.newest),
        Criterion::New => slot.installed.is_none() && value.is_some(),
        Criterion::Unchanged => slot.installed.is_some() && slot.installed == value,
    };
    u64::from(hit)
}
