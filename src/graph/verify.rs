//! Structural self-checks over the graph's invariants.
//!
//! Verification is read-only and may run at any quiescent point. A
//! violation means a programmer error somewhere in the mutation paths;
//! callers that want the fail-loud behavior unwrap the result.

use super::ConstraintGraph;
use crate::system::ConstraintSystem;
use crate::types::TypeVarId;
use thiserror::Error;

/// Violations reported by [`ConstraintGraph::verify`].
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error("constraint vector and index map for {var} have different sizes ({vector} vs {map})")]
    ConstraintIndexSize {
        var: TypeVarId,
        vector: usize,
        map: usize,
    },
    #[error("constraint index {index} for {var} is out of range")]
    ConstraintIndexRange { var: TypeVarId, index: usize },
    #[error("constraint index map for {var} resolves to a different constraint")]
    ConstraintIndexMismatch { var: TypeVarId },
    #[error("{var} is stored at slot {slot} but indexed at {indexed}")]
    GraphIndexMismatch {
        var: TypeVarId,
        slot: usize,
        indexed: usize,
    },
    #[error("{var} has no recorded graph index")]
    MissingGraphIndex { var: TypeVarId },
    #[error("node at slot {slot} belongs to {node_var}, not {var}")]
    NodeVariableMismatch {
        var: TypeVarId,
        node_var: TypeVarId,
        slot: usize,
    },
    #[error("representative {rep} of {var} has no node")]
    MissingRepresentativeNode { var: TypeVarId, rep: TypeVarId },
    #[error("{var} is not present in the equivalence class of its representative {rep}")]
    NotInRepresentativeClass { var: TypeVarId, rep: TypeVarId },
    #[error("{member} is in {rep}'s equivalence class but reports {actual} as representative")]
    RepresentativeMismatch {
        rep: TypeVarId,
        member: TypeVarId,
        actual: TypeVarId,
    },
    #[error("constraint `{constraint}` mentions {var}, which has no node")]
    UnknownTypeVariable { var: TypeVarId, constraint: String },
    #[error("constraint `{constraint}` is not recorded by {var}")]
    UnrecordedConstraint { var: TypeVarId, constraint: String },
}

impl ConstraintGraph {
    /// Checks every structural invariant the graph maintains.
    pub fn verify(&self, system: &impl ConstraintSystem) -> Result<(), InvariantViolation> {
        self.verify_slots()?;
        self.verify_nodes()?;
        self.verify_equivalence_classes(system)?;
        self.verify_constraint_accounting(system)
    }

    /// The variable vector and the slot index must mirror each other.
    fn verify_slots(&self) -> Result<(), InvariantViolation> {
        for (slot, &var) in self.type_variables.iter().enumerate() {
            match self.index_of.get(&var) {
                None => return Err(InvariantViolation::MissingGraphIndex { var }),
                Some(&indexed) if indexed != slot => {
                    return Err(InvariantViolation::GraphIndexMismatch { var, slot, indexed })
                }
                Some(_) => {}
            }

            let node_var = self.nodes[slot].var;
            if node_var != var {
                return Err(InvariantViolation::NodeVariableMismatch { var, node_var, slot });
            }
        }
        Ok(())
    }

    /// Each node's constraint vector and index map must stay in sync.
    fn verify_nodes(&self) -> Result<(), InvariantViolation> {
        for node in &self.nodes {
            if node.constraints.len() != node.constraint_index.len() {
                return Err(InvariantViolation::ConstraintIndexSize {
                    var: node.var,
                    vector: node.constraints.len(),
                    map: node.constraint_index.len(),
                });
            }

            for (&id, &index) in &node.constraint_index {
                if index >= node.constraints.len() {
                    return Err(InvariantViolation::ConstraintIndexRange {
                        var: node.var,
                        index,
                    });
                }
                if node.constraints[index] != id {
                    return Err(InvariantViolation::ConstraintIndexMismatch { var: node.var });
                }
            }
        }
        Ok(())
    }

    /// Every variable is either its own representative, with a class whose
    /// members agree, or a member of its representative's class.
    fn verify_equivalence_classes(
        &self,
        system: &impl ConstraintSystem,
    ) -> Result<(), InvariantViolation> {
        for &var in &self.type_variables {
            let rep = system.representative(var);
            if var != rep {
                let rep_node = match self.node(rep) {
                    Some(node) => node,
                    None => return Err(InvariantViolation::MissingRepresentativeNode { var, rep }),
                };
                if !rep_node.equivalence_class.contains(&var) {
                    return Err(InvariantViolation::NotInRepresentativeClass { var, rep });
                }
            } else {
                let node = self.node(var).expect("slot check ran first");
                for &member in &node.equivalence_class {
                    let actual = system.representative(member);
                    if actual != var {
                        return Err(InvariantViolation::RepresentativeMismatch {
                            rep: var,
                            member,
                            actual,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Every registered constraint mentioning variables must be recorded by
    /// each of those variables' nodes.
    fn verify_constraint_accounting(
        &self,
        system: &impl ConstraintSystem,
    ) -> Result<(), InvariantViolation> {
        for id in system.registered_constraints() {
            let constraint = system.constraint(id);
            for &var in constraint.type_variables() {
                let node = match self.node(var) {
                    Some(node) => node,
                    None => {
                        return Err(InvariantViolation::UnknownTypeVariable {
                            var,
                            constraint: constraint.to_string(),
                        })
                    }
                };
                if !node.constraint_index.contains_key(&id) {
                    return Err(InvariantViolation::UnrecordedConstraint {
                        var,
                        constraint: constraint.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
