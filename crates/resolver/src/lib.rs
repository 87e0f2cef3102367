#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for plugpm
//!
//! A [`Request`] names packages to install, remove or upgrade. The
//! [`DependencyResolver`] facade runs it through the configured strategy,
//! either the constraint-universe encoding handed to a [`ConstraintSolver`]
//! or the solver-free [`BacktrackingResolver`], then categorizes the
//! selection, adds reinstalls required by optional dependencies and orders
//! the install and removal sequences.
//!
//! Every failure surfaces as a failed [`Resolution`] carrying the typed
//! [`ResolverError`](plugpm_errors::ResolverError).

mod catalogue;
mod legacy;
mod order;
mod reconcile;
mod request;
mod resolution;
pub mod solver;
mod strategy;
pub mod universe;

pub use catalogue::{CachedCatalogue, Catalogue, MemoryCatalogue};
pub use legacy::BacktrackingResolver;
pub use order::{OrderOutcome, Orderer};
pub use reconcile::{reconcile, Reconciliation};
pub use request::{Request, RequestedDependencies};
pub use resolution::{Outcome, Resolution};
pub use solver::{
    Category, ConstraintSolver, OptimizationPreset, ReferenceSolver, SolverAdapter, SolverOutput,
};
pub use strategy::{CudfResolver, DependencyResolver, LegacyResolver, Resolver, Strategy};
pub use universe::{Universe, UniverseBuilder, UniverseText};
