//! tyvar_graph - constraint graph for Hindley-Milner style constraint solvers.
//!
//! The graph is the index a solver consults to decide which constraints
//! mention which type variables, which variables are currently equated, and
//! which independent sub-problems can be solved in isolation or in a
//! required order. It offers three coupled services:
//!
//! - incremental, journalled maintenance of the variable/constraint
//!   incidence relation, reversible through backtracking scopes;
//! - connected-component analysis in which one-way constraints induce a
//!   dependency ordering between sub-components instead of merging them;
//! - edge contraction, which fuses variables joined by equality-like
//!   constraints ahead of the search, subject to capability checks.
//!
//! The constraint system itself — variable allocation, the external
//! union-find, fixed types, the constraint arena — stays on the caller's
//! side behind the [`ConstraintSystem`] trait.

pub mod constraint;
pub mod graph;
pub mod system;
pub mod types;

pub use constraint::{Constraint, ConstraintId, ConstraintKind};
pub use graph::{
    Component, ConstraintGraph, GatheringKind, GraphNode, GraphSnapshot, InvariantViolation,
    OneWayComponent,
};
pub use system::{ConstraintSystem, DefaultConstraintSystem};
pub use types::{TypeTerm, TypeVarId, TypeVarOptions};

#[cfg(test)]
mod tests;
