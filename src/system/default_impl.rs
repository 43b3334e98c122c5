//! Self-contained reference implementation of [`ConstraintSystem`].
//!
//! Real solvers implement the trait over their own stores; this one keeps
//! just enough bookkeeping to drive the graph from tests and benches, and
//! doubles as executable documentation of the contract.

use super::ConstraintSystem;
use crate::constraint::{Constraint, ConstraintId, ConstraintKind};
use crate::types::{TypeTerm, TypeVarId, TypeVarOptions};

#[derive(Debug)]
struct VariableEntry {
    options: TypeVarOptions,
    /// Union-find parent; equals the variable itself on representatives.
    parent: TypeVarId,
    fixed: Option<TypeTerm>,
    potential_bindings: Option<Vec<TypeTerm>>,
}

/// Minimal constraint system backing the test suite and benches.
#[derive(Debug, Default)]
pub struct DefaultConstraintSystem {
    variables: Vec<VariableEntry>,
    constraints: Vec<Constraint>,
    active: Vec<ConstraintId>,
    inactive: Vec<ConstraintId>,
    solver_state: bool,
    retired: Vec<ConstraintId>,
    removed_generated: Vec<ConstraintId>,
}

impl DefaultConstraintSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh type variable with the given capabilities.
    pub fn new_type_variable(&mut self, options: TypeVarOptions) -> TypeVarId {
        let id = TypeVarId::new(self.variables.len() as u32);
        self.variables.push(VariableEntry {
            options,
            parent: id,
            fixed: None,
            potential_bindings: None,
        });
        id
    }

    /// Registers a constraint on the inactive list and returns its id.
    pub fn register_constraint(
        &mut self,
        kind: ConstraintKind,
        first: TypeTerm,
        second: TypeTerm,
    ) -> ConstraintId {
        let id = ConstraintId::new(self.constraints.len() as u32);
        self.constraints.push(Constraint::new(kind, first, second));
        self.inactive.push(id);
        id
    }

    /// Moves a registered constraint from the inactive to the active list.
    pub fn activate_constraint(&mut self, id: ConstraintId) {
        if let Some(position) = self.inactive.iter().position(|&known| known == id) {
            self.inactive.swap_remove(position);
            self.active.push(id);
        }
    }

    /// Assigns a fixed type to `var`.
    pub fn bind_fixed(&mut self, var: TypeVarId, term: TypeTerm) {
        self.entry_mut(var).fixed = Some(term);
    }

    /// Records candidate binding types for `var`.
    pub fn set_potential_bindings(&mut self, var: TypeVarId, bindings: Vec<TypeTerm>) {
        self.entry_mut(var).potential_bindings = Some(bindings);
    }

    /// Turns on the solver-state recorder consulted by edge removal.
    pub fn enable_solver_state(&mut self) {
        self.solver_state = true;
    }

    /// Constraints retired by contraction while they were listed.
    pub fn retired_constraints(&self) -> &[ConstraintId] {
        &self.retired
    }

    /// Generated constraints dropped by contraction without being listed.
    pub fn removed_generated_constraints(&self) -> &[ConstraintId] {
        &self.removed_generated
    }

    fn entry(&self, var: TypeVarId) -> &VariableEntry {
        &self.variables[var.to_raw() as usize]
    }

    fn entry_mut(&mut self, var: TypeVarId) -> &mut VariableEntry {
        &mut self.variables[var.to_raw() as usize]
    }
}

impl ConstraintSystem for DefaultConstraintSystem {
    fn constraint(&self, id: ConstraintId) -> &Constraint {
        &self.constraints[id.to_raw() as usize]
    }

    fn registered_constraints(&self) -> Vec<ConstraintId> {
        let mut ids = self.active.clone();
        ids.extend_from_slice(&self.inactive);
        ids
    }

    fn representative(&self, var: TypeVarId) -> TypeVarId {
        let mut current = var;
        loop {
            let parent = self.entry(current).parent;
            if parent == current {
                return current;
            }
            current = parent;
        }
    }

    fn fixed_type(&self, var: TypeVarId) -> Option<&TypeTerm> {
        self.entry(var).fixed.as_ref()
    }

    fn can_bind_to_lvalue(&self, var: TypeVarId) -> bool {
        self.entry(var).options.can_bind_to_lvalue
    }

    fn can_bind_to_inout(&self, var: TypeVarId) -> bool {
        self.entry(var).options.can_bind_to_inout
    }

    fn potential_bindings(&self, var: TypeVarId) -> Option<&[TypeTerm]> {
        self.entry(var).potential_bindings.as_deref()
    }

    fn merge_equivalence_classes(
        &mut self,
        rep: TypeVarId,
        other: TypeVarId,
        _update_work_list: bool,
    ) {
        let winner = self.representative(rep);
        let loser = self.representative(other);
        if winner != loser {
            self.entry_mut(loser).parent = winner;
        }
    }

    fn unlist_constraint(&mut self, id: ConstraintId) -> bool {
        if let Some(position) = self.active.iter().position(|&known| known == id) {
            self.active.swap_remove(position);
            return true;
        }
        if let Some(position) = self.inactive.iter().position(|&known| known == id) {
            self.inactive.swap_remove(position);
            return true;
        }
        false
    }

    fn has_solver_state(&self) -> bool {
        self.solver_state
    }

    fn retire_constraint(&mut self, id: ConstraintId) {
        self.retired.push(id);
    }

    fn remove_generated_constraint(&mut self, id: ConstraintId) {
        self.removed_generated.push(id);
    }
}
