//! Adjacency index from type variables to the constraints that mention them.
//!
//! The graph is the solver's working memory: every node records the
//! constraints touching one type variable, the equivalence class it
//! represents, and the fixed-binding adjacencies induced by bound types.
//! All mutation is journalled (see [`change`]) so backtracking can undo it
//! exactly, and the component analysis in [`components`] partitions the
//! unbound variables into independently solvable sub-problems.

mod change;
mod components;
mod contraction;
mod verify;

pub use change::GraphSnapshot;
pub use components::{Component, OneWayComponent};
pub use verify::InvariantViolation;

use crate::constraint::{Constraint, ConstraintId};
use crate::system::ConstraintSystem;
use crate::types::{TypeTerm, TypeVarId};
use change::Change;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::fmt;

/// Per-variable record held by the graph.
#[derive(Debug)]
pub struct GraphNode {
    var: TypeVarId,
    /// Constraints mentioning this variable, in insertion order.
    constraints: Vec<ConstraintId>,
    /// Inverse of `constraints` for O(1) removal by swap-with-last.
    constraint_index: FxHashMap<ConstraintId, usize>,
    /// Meaningful only while this variable is the representative of its
    /// class; lazily initialised to `[self]` on first observation.
    equivalence_class: Vec<TypeVarId>,
    /// Variables appearing inside a fixed type bound to this variable, or
    /// whose fixed type mentions this variable. Kept symmetric; a multiset.
    fixed_bindings: Vec<TypeVarId>,
}

impl GraphNode {
    fn new(var: TypeVarId) -> Self {
        Self {
            var,
            constraints: Vec::new(),
            constraint_index: FxHashMap::default(),
            equivalence_class: Vec::new(),
            fixed_bindings: Vec::new(),
        }
    }

    /// The type variable this node indexes.
    pub fn type_variable(&self) -> TypeVarId {
        self.var
    }

    /// Constraints mentioning this variable, in insertion order.
    pub fn constraints(&self) -> &[ConstraintId] {
        &self.constraints
    }

    /// Fixed-binding adjacencies of this variable.
    pub fn fixed_bindings(&self) -> &[TypeVarId] {
        &self.fixed_bindings
    }

    fn add_constraint(&mut self, id: ConstraintId) {
        let previous = self.constraint_index.insert(id, self.constraints.len());
        assert!(previous.is_none(), "constraint re-insertion on {}", self.var);
        self.constraints.push(id);
    }

    fn remove_constraint(&mut self, id: ConstraintId) {
        let index = self
            .constraint_index
            .remove(&id)
            .expect("removing a constraint unknown to the node");
        debug_assert_eq!(self.constraints[index], id, "mismatched constraint");

        let last = self.constraints.len() - 1;
        if index != last {
            let moved = self.constraints[last];
            self.constraints[index] = moved;
            self.constraint_index.insert(moved, index);
        }
        self.constraints.pop();
    }

    /// Equivalence class without the representative check; callers verify
    /// representativeness before relying on the contents.
    fn equivalence_class_unsafe(&mut self) -> &[TypeVarId] {
        if self.equivalence_class.is_empty() {
            self.equivalence_class.push(self.var);
        }
        &self.equivalence_class
    }

    fn add_to_equivalence_class(&mut self, vars: &[TypeVarId]) {
        if self.equivalence_class.is_empty() {
            self.equivalence_class.push(self.var);
        }
        self.equivalence_class.extend_from_slice(vars);
    }

    fn truncate_equivalence_class(&mut self, len: usize) {
        self.equivalence_class.truncate(len);
    }

    fn add_fixed_binding(&mut self, var: TypeVarId) {
        self.fixed_bindings.push(var);
    }

    fn remove_fixed_binding(&mut self, var: TypeVarId) {
        let position = self
            .fixed_bindings
            .iter()
            .rposition(|&known| known == var)
            .expect("fixed binding not recorded");
        self.fixed_bindings.remove(position);
    }
}

/// Scope of a [`ConstraintGraph::gather_constraints`] walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatheringKind {
    /// Constraints on the start variable's equivalence class and its
    /// fixed-binding adjacencies.
    EquivalenceClass,
    /// Additionally follow every variable mentioned by a gathered
    /// constraint, to a fixpoint.
    AllMentions,
}

/// Index of type variables to the constraints mentioning them.
#[derive(Debug, Default)]
pub struct ConstraintGraph {
    nodes: Vec<GraphNode>,
    /// Registered variables in first-observation order; parallel to `nodes`.
    type_variables: Vec<TypeVarId>,
    index_of: FxHashMap<TypeVarId, usize>,
    /// Registered constraints mentioning no type variables.
    orphaned_constraints: Vec<ConstraintId>,
    changes: Vec<Change>,
    /// Journalling is enabled while at least one scope is open.
    active_scopes: usize,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered variables in first-observation order.
    pub fn type_variables(&self) -> &[TypeVarId] {
        &self.type_variables
    }

    /// Registered constraints mentioning no type variables.
    pub fn orphaned_constraints(&self) -> &[ConstraintId] {
        &self.orphaned_constraints
    }

    /// The node for `var`, if the variable has been observed.
    pub fn node(&self, var: TypeVarId) -> Option<&GraphNode> {
        self.index_of.get(&var).map(|&slot| &self.nodes[slot])
    }

    /// Number of journalled edits awaiting scope unwinding.
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    /// Returns the node slot for `var`, creating the node on first
    /// observation. A newly created node immediately reflects any
    /// pre-existing equivalence or fixed binding known to the system.
    pub(crate) fn lookup(&mut self, system: &impl ConstraintSystem, var: TypeVarId) -> usize {
        if let Some(&slot) = self.index_of.get(&var) {
            debug_assert!(slot < self.type_variables.len(), "out-of-bounds graph index");
            debug_assert_eq!(self.type_variables[slot], var, "type variable mismatch");
            return slot;
        }

        let slot = self.type_variables.len();
        self.type_variables.push(var);
        self.nodes.push(GraphNode::new(var));
        self.index_of.insert(var, slot);

        if self.active_scopes > 0 {
            self.changes.push(Change::AddedTypeVariable(var));
        }

        let rep = system.representative(var);
        if rep != var {
            self.merge_equivalence(system, var, rep);
        } else if let Some(fixed) = system.fixed_type(rep) {
            self.bind_type_variable(system, var, fixed);
        }

        slot
    }

    /// Drops the node for `var`. Only the journal calls this.
    pub(crate) fn remove_node(&mut self, var: TypeVarId) {
        let slot = self
            .index_of
            .remove(&var)
            .expect("removing a node for an unknown variable");
        self.nodes.swap_remove(slot);
        self.type_variables.swap_remove(slot);
        if slot < self.type_variables.len() {
            let moved = self.type_variables[slot];
            self.index_of.insert(moved, slot);
        }
    }

    /// Records `id` on every mentioned variable's node, or on the orphan
    /// list when it mentions none.
    pub fn add_constraint(&mut self, system: &impl ConstraintSystem, id: ConstraintId) {
        let mentioned = system.constraint(id).type_variables();
        for &var in mentioned {
            let slot = self.lookup(system, var);
            self.nodes[slot].add_constraint(id);
        }

        if mentioned.is_empty() {
            self.orphaned_constraints.push(id);
        }

        if self.active_scopes > 0 {
            self.changes.push(Change::AddedConstraint(id));
        }
    }

    /// Removes `id` from every mentioned variable's node, or from the
    /// orphan list.
    pub fn remove_constraint(&mut self, system: &impl ConstraintSystem, id: ConstraintId) {
        let mentioned = system.constraint(id).type_variables();
        for &var in mentioned {
            let slot = self.lookup(system, var);
            self.nodes[slot].remove_constraint(id);
        }

        if mentioned.is_empty() {
            let position = self
                .orphaned_constraints
                .iter()
                .position(|&known| known == id)
                .expect("missing orphaned constraint");
            self.orphaned_constraints.swap_remove(position);
        }

        if self.active_scopes > 0 {
            self.changes.push(Change::RemovedConstraint(id));
        }
    }

    /// Witnesses a merge already performed in the system's union-find by
    /// folding the non-representative's equivalence class into the
    /// representative's.
    pub fn merge_equivalence(&mut self, system: &impl ConstraintSystem, a: TypeVarId, b: TypeVarId) {
        assert_eq!(
            system.representative(a),
            system.representative(b),
            "type representatives do not match"
        );

        let rep = system.representative(a);
        assert!(
            a == rep || b == rep,
            "neither type variable is the new representative"
        );
        let other = if a == rep { b } else { a };

        // First observation of `other` runs the node-creation policy, which
        // performs this merge itself.
        if !self.index_of.contains_key(&other) {
            self.lookup(system, other);
            return;
        }

        let rep_slot = self.lookup(system, rep);
        let prev_size = self.nodes[rep_slot].equivalence_class_unsafe().len();
        if self.active_scopes > 0 {
            self.changes.push(Change::ExtendedEquivalenceClass {
                var: rep,
                prev_size,
            });
        }

        let other_slot = self.index_of[&other];
        let other_class: SmallVec<[TypeVarId; 4]> = self.nodes[other_slot]
            .equivalence_class_unsafe()
            .iter()
            .copied()
            .collect();
        self.nodes[rep_slot].add_to_equivalence_class(&other_class);
    }

    /// The equivalence class of a representative, lazily materialised.
    pub fn equivalence_class(
        &mut self,
        system: &impl ConstraintSystem,
        var: TypeVarId,
    ) -> &[TypeVarId] {
        assert_eq!(
            system.representative(var),
            var,
            "equivalence class requested for a non-representative"
        );
        let slot = self.lookup(system, var);
        self.nodes[slot].equivalence_class_unsafe()
    }

    /// Records the symmetric fixed-binding adjacencies between `var` and
    /// every distinct variable inside `fixed`. A fixed type mentioning no
    /// variables records nothing, so the paired undo has nothing to do.
    pub fn bind_type_variable(
        &mut self,
        system: &impl ConstraintSystem,
        var: TypeVarId,
        fixed: &TypeTerm,
    ) {
        if !fixed.has_type_variables() {
            return;
        }

        let mut mentioned: SmallVec<[TypeVarId; 4]> = SmallVec::new();
        fixed.collect_type_variables(&mut mentioned);

        let slot = self.lookup(system, var);
        let mut known: FxHashSet<TypeVarId> = FxHashSet::default();
        for other in mentioned {
            if known.insert(other) {
                if other == var {
                    continue;
                }
                let other_slot = self.lookup(system, other);
                self.nodes[other_slot].add_fixed_binding(var);
                self.nodes[slot].add_fixed_binding(other);
            }
        }

        if self.active_scopes > 0 {
            self.changes.push(Change::BoundTypeVariable {
                var,
                fixed: fixed.clone(),
            });
        }
    }

    /// Reverses [`bind_type_variable`](Self::bind_type_variable) pointwise.
    /// Only the journal calls this.
    pub(crate) fn unbind_type_variable(
        &mut self,
        system: &impl ConstraintSystem,
        var: TypeVarId,
        fixed: &TypeTerm,
    ) {
        if !fixed.has_type_variables() {
            return;
        }

        let mut mentioned: SmallVec<[TypeVarId; 4]> = SmallVec::new();
        fixed.collect_type_variables(&mut mentioned);

        let slot = self.lookup(system, var);
        let mut known: FxHashSet<TypeVarId> = FxHashSet::default();
        for other in mentioned {
            if known.insert(other) {
                if other == var {
                    continue;
                }
                let other_slot = self.lookup(system, other);
                self.nodes[other_slot].remove_fixed_binding(var);
                self.nodes[slot].remove_fixed_binding(other);
            }
        }
    }

    /// Collects every constraint the solver may need to reconsider when
    /// `var` is touched: constraints on the variable's equivalence class,
    /// on classes adjacent through fixed bindings, and — with
    /// [`GatheringKind::AllMentions`] — on classes reachable through chains
    /// of shared constraint mentions. Results are deduplicated across the
    /// whole walk and returned in discovery order.
    pub fn gather_constraints(
        &mut self,
        system: &impl ConstraintSystem,
        var: TypeVarId,
        kind: GatheringKind,
        mut accept: impl FnMut(&Constraint) -> bool,
    ) -> Vec<ConstraintId> {
        let mut gathered = Vec::new();
        let mut visited_vars: FxHashSet<TypeVarId> = FxHashSet::default();
        let mut visited_constraints: FxHashSet<ConstraintId> = FxHashSet::default();
        let mut to_walk: VecDeque<ConstraintId> = VecDeque::new();

        let rep = system.representative(var);
        let rep_slot = self.lookup(system, rep);
        let class: SmallVec<[TypeVarId; 4]> = self.nodes[rep_slot]
            .equivalence_class_unsafe()
            .iter()
            .copied()
            .collect();

        for member in class {
            let member_slot = self.lookup(system, member);
            let member_constraints: SmallVec<[ConstraintId; 8]> =
                self.nodes[member_slot].constraints.iter().copied().collect();
            for id in member_constraints {
                if visited_constraints.insert(id) {
                    if accept(system.constraint(id)) {
                        gathered.push(id);
                    }
                    if kind == GatheringKind::AllMentions {
                        to_walk.push_back(id);
                    }
                }
            }

            let adjacent: SmallVec<[TypeVarId; 4]> = self.nodes[member_slot]
                .fixed_bindings
                .iter()
                .copied()
                .collect();
            for adjacent_var in adjacent {
                self.add_adjacent_constraints(
                    system,
                    adjacent_var,
                    kind,
                    &mut visited_vars,
                    &mut visited_constraints,
                    &mut to_walk,
                    &mut accept,
                    &mut gathered,
                );
            }
        }

        while let Some(id) = to_walk.pop_front() {
            let mentioned: SmallVec<[TypeVarId; 4]> =
                system.constraint(id).type_variables().iter().copied().collect();
            for adjacent_var in mentioned {
                self.add_adjacent_constraints(
                    system,
                    adjacent_var,
                    kind,
                    &mut visited_vars,
                    &mut visited_constraints,
                    &mut to_walk,
                    &mut accept,
                    &mut gathered,
                );
            }
        }

        gathered
    }

    /// Adds constraints from the equivalence class of `adjacent`'s
    /// representative, enqueueing newly visited constraints for further
    /// walking when gathering all mentions.
    #[allow(clippy::too_many_arguments)]
    fn add_adjacent_constraints(
        &mut self,
        system: &impl ConstraintSystem,
        adjacent: TypeVarId,
        kind: GatheringKind,
        visited_vars: &mut FxHashSet<TypeVarId>,
        visited_constraints: &mut FxHashSet<ConstraintId>,
        to_walk: &mut VecDeque<ConstraintId>,
        accept: &mut impl FnMut(&Constraint) -> bool,
        gathered: &mut Vec<ConstraintId>,
    ) {
        let rep = system.representative(adjacent);
        let rep_slot = self.lookup(system, rep);
        let members: SmallVec<[TypeVarId; 4]> = self.nodes[rep_slot]
            .equivalence_class_unsafe()
            .iter()
            .copied()
            .collect();

        for member in members {
            if !visited_vars.insert(member) {
                continue;
            }
            let member_slot = self.lookup(system, member);
            let member_constraints: SmallVec<[ConstraintId; 8]> =
                self.nodes[member_slot].constraints.iter().copied().collect();
            for id in member_constraints {
                if !visited_constraints.insert(id) {
                    continue;
                }
                if accept(system.constraint(id)) {
                    gathered.push(id);
                }
                if kind == GatheringKind::AllMentions {
                    to_walk.push_back(id);
                }
            }
        }
    }

    /// Writes every node in registration order.
    pub fn print(
        &self,
        system: &impl ConstraintSystem,
        out: &mut impl fmt::Write,
    ) -> fmt::Result {
        for slot in 0..self.type_variables.len() {
            self.write_node(system, slot, out)?;
        }
        Ok(())
    }

    fn write_node(
        &self,
        system: &impl ConstraintSystem,
        slot: usize,
        out: &mut impl fmt::Write,
    ) -> fmt::Result {
        let node = &self.nodes[slot];
        writeln!(out, "  {}:", node.var)?;

        if !node.constraints.is_empty() {
            writeln!(out, "    constraints:")?;
            let mut sorted = node.constraints.clone();
            sorted.sort_unstable();
            for id in sorted {
                writeln!(out, "      {}", system.constraint(id))?;
            }
        }

        if !node.fixed_bindings.is_empty() {
            let mut sorted = node.fixed_bindings.clone();
            sorted.sort_unstable();
            write!(out, "    fixed bindings: ")?;
            for (index, var) in sorted.iter().enumerate() {
                if index > 0 {
                    write!(out, ", ")?;
                }
                write!(out, "{var}")?;
            }
            writeln!(out)?;
        }

        if system.representative(node.var) == node.var && node.equivalence_class.len() > 1 {
            write!(out, "    equivalence class:")?;
            for member in &node.equivalence_class[1..] {
                write!(out, " {member}")?;
            }
            writeln!(out)?;
        }

        Ok(())
    }

    /// Writes the connected components of every registered variable,
    /// numbered in discovery order.
    pub fn print_connected_components(
        &mut self,
        system: &impl ConstraintSystem,
        out: &mut impl fmt::Write,
    ) -> fmt::Result {
        let vars = self.type_variables.clone();
        let components = self.compute_connected_components(system, &vars);
        for (index, component) in components.iter().enumerate() {
            write!(out, "  {index}:")?;
            for var in &component.type_vars {
                write!(out, " {var}")?;
            }

            if !component.one_way_components.is_empty() {
                write!(out, ", one way components = ")?;
                for (sub_index, sub) in component.one_way_components.iter().enumerate() {
                    if sub_index > 0 {
                        write!(out, " ")?;
                    }
                    write!(out, "{{")?;
                    for (var_index, var) in sub.type_vars.iter().enumerate() {
                        if var_index > 0 {
                            write!(out, " ")?;
                        }
                        write!(out, "{var}")?;
                    }
                    if !sub.depends_on.is_empty() {
                        write!(out, " depends on ")?;
                        for (dep_index, dep) in sub.depends_on.iter().enumerate() {
                            if dep_index > 0 {
                                write!(out, ", ")?;
                            }
                            write!(out, "{dep}")?;
                        }
                    }
                    write!(out, "}}")?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Drop for ConstraintGraph {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.changes.is_empty(),
                "constraint graph dropped with {} unwound changes",
                self.changes.len()
            );
        }
    }
}
