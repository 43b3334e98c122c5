//! Reversible edit journal and backtracking scopes.
//!
//! Every mutation performed while a scope is open appends one [`Change`] to
//! the graph's journal. Rolling a scope back pops entries in strict LIFO
//! order and undoes each; entries are never reordered, coalesced, or
//! dropped. Undo runs with journalling suspended so it cannot record
//! itself.

use super::ConstraintGraph;
use crate::constraint::ConstraintId;
use crate::system::ConstraintSystem;
use crate::types::{TypeTerm, TypeVarId};

/// One reversible edit.
#[derive(Debug, Clone)]
pub(crate) enum Change {
    AddedTypeVariable(TypeVarId),
    AddedConstraint(ConstraintId),
    RemovedConstraint(ConstraintId),
    ExtendedEquivalenceClass { var: TypeVarId, prev_size: usize },
    /// Carries a clone of the fixed type so undo needs no external lookup.
    BoundTypeVariable { var: TypeVarId, fixed: TypeTerm },
}

impl Change {
    pub(crate) fn undo(self, graph: &mut ConstraintGraph, system: &impl ConstraintSystem) {
        match self {
            Change::AddedTypeVariable(var) => graph.remove_node(var),
            Change::AddedConstraint(id) => graph.remove_constraint(system, id),
            Change::RemovedConstraint(id) => graph.add_constraint(system, id),
            Change::ExtendedEquivalenceClass { var, prev_size } => {
                let slot = *graph
                    .index_of
                    .get(&var)
                    .expect("extended equivalence class on an unknown variable");
                graph.nodes[slot].truncate_equivalence_class(prev_size);
            }
            Change::BoundTypeVariable { var, fixed } => {
                graph.unbind_type_variable(system, var, &fixed);
            }
        }
    }
}

/// Token marking the journal position at which a scope opened.
///
/// Scopes nest and must be rolled back in LIFO order; dropping a snapshot
/// without rolling it back leaves the journal armed and trips the graph's
/// teardown assertion.
#[derive(Debug)]
#[must_use = "a snapshot must be passed back to `rollback_to`"]
pub struct GraphSnapshot {
    depth: usize,
    journal_len: usize,
}

impl ConstraintGraph {
    /// Opens a scope: subsequent mutations are journalled until the
    /// returned snapshot is rolled back.
    pub fn snapshot(&mut self) -> GraphSnapshot {
        self.active_scopes += 1;
        GraphSnapshot {
            depth: self.active_scopes,
            journal_len: self.changes.len(),
        }
    }

    /// Closes the most recent scope, undoing every edit journalled since
    /// the snapshot was taken.
    pub fn rollback_to(&mut self, system: &impl ConstraintSystem, snapshot: GraphSnapshot) {
        assert_eq!(
            snapshot.depth, self.active_scopes,
            "scopes must be rolled back in LIFO order"
        );
        assert!(
            self.changes.len() >= snapshot.journal_len,
            "journal shorter than at the snapshot"
        );

        // Undo with journalling off so the undo operations are not
        // themselves recorded.
        self.active_scopes = 0;
        while self.changes.len() > snapshot.journal_len {
            let change = self.changes.pop().expect("journal underflow");
            change.undo(self, system);
        }
        self.active_scopes = snapshot.depth - 1;
    }
}
