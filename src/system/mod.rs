//! Interface the graph uses to consult the owning constraint system.
//!
//! The graph is a witness of solver state, not its arbiter: type variables,
//! their union-find, fixed types, and the constraint arena all live on the
//! system side. Every graph operation therefore takes the system as an
//! explicit parameter; read paths borrow it shared, edge contraction needs
//! it mutably.

mod default_impl;

pub use default_impl::DefaultConstraintSystem;

use crate::constraint::{Constraint, ConstraintId};
use crate::types::{TypeTerm, TypeVarId};

/// Capability surface a constraint solver exposes to its graph.
pub trait ConstraintSystem {
    /// Resolves a constraint identifier to its record.
    fn constraint(&self, id: ConstraintId) -> &Constraint;

    /// Every constraint currently registered, active or inactive, in a
    /// stable order.
    fn registered_constraints(&self) -> Vec<ConstraintId>;

    /// Representative of `var` in the system's union-find.
    fn representative(&self, var: TypeVarId) -> TypeVarId;

    /// The concrete type `var` is bound to, if any.
    fn fixed_type(&self, var: TypeVarId) -> Option<&TypeTerm>;

    fn can_bind_to_lvalue(&self, var: TypeVarId) -> bool;

    fn can_bind_to_inout(&self, var: TypeVarId) -> bool;

    /// Candidate binding types the solver has computed for `var`, if any.
    fn potential_bindings(&self, var: TypeVarId) -> Option<&[TypeTerm]>;

    /// Merges the equivalence classes of `rep` and `other`, making `rep`'s
    /// representative the representative of the combined class. The system
    /// must not call back into the graph; the caller witnesses the merge on
    /// the graph side afterwards.
    fn merge_equivalence_classes(
        &mut self,
        rep: TypeVarId,
        other: TypeVarId,
        update_work_list: bool,
    );

    /// Erases `id` from the active/inactive constraint lists, returning
    /// whether it was present in either.
    fn unlist_constraint(&mut self, id: ConstraintId) -> bool;

    /// Whether a solver state is currently recording retired constraints.
    fn has_solver_state(&self) -> bool;

    /// Records that an existing constraint was retired by contraction.
    fn retire_constraint(&mut self, id: ConstraintId);

    /// Records that a generated (never listed) constraint was dropped.
    fn remove_generated_constraint(&mut self, id: ConstraintId);

    /// Constraints whose records satisfy `predicate`.
    fn find_constraints(&self, predicate: &mut dyn FnMut(&Constraint) -> bool) -> Vec<ConstraintId> {
        self.registered_constraints()
            .into_iter()
            .filter(|&id| predicate(self.constraint(id)))
            .collect()
    }
}
