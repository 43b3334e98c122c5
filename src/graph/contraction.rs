//! Edge contraction: pre-solve fusion of type variables joined by
//! equality-like constraints.

use super::ConstraintGraph;
use crate::constraint::{ConstraintId, ConstraintKind};
use crate::system::ConstraintSystem;
use tracing::{debug, trace};

/// Kinds whose edges are candidates for contraction.
fn should_contract_edge(kind: ConstraintKind) -> bool {
    matches!(
        kind,
        ConstraintKind::Bind
            | ConstraintKind::BindParam
            | ConstraintKind::BindToPointerType
            | ConstraintKind::Equal
    )
}

impl ConstraintGraph {
    /// Runs one contraction pass over the registered constraints. Returns
    /// true when at least one edge was contracted.
    pub fn contract_edges(&mut self, system: &mut impl ConstraintSystem) -> bool {
        let mut considered = 0usize;
        let candidates = system.find_constraints(&mut |constraint| {
            considered += 1;
            should_contract_edge(constraint.kind())
        });
        trace!(considered, candidates = candidates.len(), "contraction pass");

        let mut did_contract = false;
        for id in candidates {
            let constraint = system.constraint(id);
            let kind = constraint.kind();
            debug_assert!(should_contract_edge(kind));

            let first = constraint.first_type().desugared().as_type_variable();
            let second = constraint.second_type().desugared().as_type_variable();
            let (Some(var1), Some(var2)) = (first, second) else {
                continue;
            };

            let is_param_binding = kind == ConstraintKind::BindParam;

            // An argument that may bind to `inout` cannot be fused with its
            // parameter unless every candidate binding is provably free of
            // `inout` shapes and of variables that may bind to `inout`.
            if is_param_binding && system.can_bind_to_inout(var1) {
                let mut not_contractable = true;
                if let Some(bindings) = system.potential_bindings(var1) {
                    for binding in bindings {
                        not_contractable = binding.find_if(&mut |nested| {
                            if let Some(nested_var) = nested.as_type_variable() {
                                if system.can_bind_to_inout(nested_var) {
                                    return true;
                                }
                            }
                            nested.is_inout()
                        });
                        if not_contractable {
                            break;
                        }
                    }
                }

                if not_contractable {
                    continue;
                }
            }

            let rep1 = system.representative(var1);
            let rep2 = system.representative(var2);

            if system.can_bind_to_lvalue(rep1) == system.can_bind_to_lvalue(rep2)
                || is_param_binding
            {
                debug!(constraint = %system.constraint(id), "contracting constraint");

                self.remove_edge(system, id);
                if rep1 != rep2 {
                    system.merge_equivalence_classes(rep1, rep2, false);
                    // The system cannot call back into the graph, so the
                    // graph witnesses the merge itself.
                    self.merge_equivalence(system, rep1, rep2);
                }
                did_contract = true;
            }
        }

        did_contract
    }

    /// Retires a constraint from both the system's lists and the graph.
    pub fn remove_edge(&mut self, system: &mut impl ConstraintSystem, id: ConstraintId) {
        let is_existing = system.unlist_constraint(id);

        if system.has_solver_state() {
            if is_existing {
                system.retire_constraint(id);
            } else {
                system.remove_generated_constraint(id);
            }
        }

        self.remove_constraint(system, id);
    }

    /// Iterates contraction to a fixed point.
    pub fn optimize(&mut self, system: &mut impl ConstraintSystem) {
        while self.contract_edges(system) {}
    }
}
