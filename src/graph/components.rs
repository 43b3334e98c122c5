//! Connected-component analysis with one-way ordering.
//!
//! Ordinary constraints, equivalence classes, and fixed bindings merge
//! components; one-way constraints are set aside and induce a dependency
//! digraph between the sub-components they would otherwise merge. The final
//! components report that digraph as an evaluation order.

use super::ConstraintGraph;
use crate::constraint::ConstraintId;
use crate::system::ConstraintSystem;
use crate::types::TypeVarId;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// An independently solvable sub-problem.
#[derive(Debug, Default, Clone)]
pub struct Component {
    /// Unbound-component members, in first-encounter order.
    pub type_vars: Vec<TypeVarId>,
    /// Constraints touching the members, deduplicated across components.
    pub constraints: Vec<ConstraintId>,
    /// Sub-components in dependency order; empty without one-way
    /// constraints.
    pub one_way_components: Vec<OneWayComponent>,
}

/// A node of the pre-merge one-way digraph living inside a final component.
#[derive(Debug, Default, Clone)]
pub struct OneWayComponent {
    /// Type variables of the pre-merge sub-component.
    pub type_vars: SmallVec<[TypeVarId; 4]>,
    /// Indices of earlier sub-components that must be solved first.
    pub depends_on: SmallVec<[usize; 2]>,
}

/// Node of the directed graph built from one-way constraints, keyed by the
/// phase-1 representative on the corresponding side.
#[derive(Debug, Default)]
struct RawOneWayComponent {
    type_vars: SmallVec<[TypeVarId; 4]>,
    /// Uniqued representatives this component has an outgoing edge to.
    out_adjacencies: SmallVec<[TypeVarId; 2]>,
    /// Uniqued representatives with an edge into this component.
    in_adjacencies: SmallVec<[TypeVarId; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkDirection {
    Out,
    In,
}

impl ConstraintGraph {
    /// Partitions `type_vars` (and the constraints touching them) into
    /// independent sub-problems. Components containing no unbound variable
    /// are not reported.
    pub fn compute_connected_components(
        &mut self,
        system: &impl ConstraintSystem,
        type_vars: &[TypeVarId],
    ) -> Vec<Component> {
        let mut analysis = ConnectedComponents::new(self, system, type_vars);

        let one_way_constraints = analysis.collapse_ordinary_edges();
        if !one_way_constraints.is_empty() {
            analysis.build_one_way_digraph(&one_way_constraints);
            // Collapse the remaining splits so one-way constraints land in
            // a single final component; the digraph keeps the pre-collapse
            // structure for ordering.
            for &id in &one_way_constraints {
                analysis.union_sets_via_constraint(id);
            }
        }

        analysis.into_components()
    }
}

/// Union-find over the interesting type variables, local to one invocation.
struct ConnectedComponents<'a, S: ConstraintSystem> {
    graph: &'a mut ConstraintGraph,
    system: &'a S,
    type_vars: &'a [TypeVarId],
    /// Parent links; a variable without an entry is its own representative.
    parents: FxHashMap<TypeVarId, TypeVarId>,
    one_way_digraph: FxHashMap<TypeVarId, RawOneWayComponent>,
}

impl<'a, S: ConstraintSystem> ConnectedComponents<'a, S> {
    fn new(graph: &'a mut ConstraintGraph, system: &'a S, type_vars: &'a [TypeVarId]) -> Self {
        Self {
            graph,
            system,
            type_vars,
            parents: FxHashMap::default(),
            one_way_digraph: FxHashMap::default(),
        }
    }

    fn find_representative(&mut self, var: TypeVarId) -> TypeVarId {
        let mut root = var;
        while let Some(&parent) = self.parents.get(&root) {
            root = parent;
        }

        // Path compression.
        let mut current = var;
        while current != root {
            let parent = self.parents[&current];
            self.parents.insert(current, root);
            current = parent;
        }

        root
    }

    /// Joins the sets of two variables, reparenting the higher-ID root onto
    /// the lower-ID one for deterministic output. Returns true when the
    /// sets were distinct.
    fn union_sets(&mut self, a: TypeVarId, b: TypeVarId) -> bool {
        let rep_a = self.find_representative(a);
        let rep_b = self.find_representative(b);
        if rep_a == rep_b {
            return false;
        }

        if rep_a.to_raw() < rep_b.to_raw() {
            self.parents.insert(rep_b, rep_a);
        } else {
            self.parents.insert(rep_a, rep_b);
        }
        true
    }

    /// Joins every variable mentioned by `id` into one set.
    fn union_sets_via_constraint(&mut self, id: ConstraintId) -> bool {
        let mentioned: SmallVec<[TypeVarId; 4]> = self
            .system
            .constraint(id)
            .type_variables()
            .iter()
            .copied()
            .collect();
        if mentioned.len() < 2 {
            return false;
        }

        let first = mentioned[0];
        let mut any_joined = false;
        for &other in &mentioned[1..] {
            if self.union_sets(first, other) {
                any_joined = true;
            }
        }
        any_joined
    }

    /// Phase 1: union along equivalence classes, fixed bindings, and
    /// ordinary constraints, deferring one-way constraints.
    fn collapse_ordinary_edges(&mut self) -> Vec<ConstraintId> {
        let mut one_way_constraints = Vec::new();
        let mut visited: FxHashSet<ConstraintId> = FxHashSet::default();

        for &var in self.type_vars {
            let rep = self.system.representative(var);
            let rep_slot = self.graph.lookup(self.system, rep);
            let class: SmallVec<[TypeVarId; 4]> = self.graph.nodes[rep_slot]
                .equivalence_class_unsafe()
                .iter()
                .copied()
                .collect();
            for member in class {
                self.union_sets(var, member);
            }

            let slot = self.graph.lookup(self.system, var);
            let adjacent: SmallVec<[TypeVarId; 4]> = self.graph.nodes[slot]
                .fixed_bindings
                .iter()
                .copied()
                .collect();
            for adjacent_var in adjacent {
                self.union_sets(var, adjacent_var);
            }

            let constraints: SmallVec<[ConstraintId; 8]> =
                self.graph.nodes[slot].constraints.iter().copied().collect();
            for id in constraints {
                if !visited.insert(id) {
                    continue;
                }

                if self.system.constraint(id).kind().is_one_way() {
                    one_way_constraints.push(id);
                    continue;
                }

                self.union_sets_via_constraint(id);
            }
        }

        one_way_constraints
    }

    /// Phase 2: build the digraph of one-way edges between phase-1
    /// representatives, then bucket each variable into its digraph node.
    fn build_one_way_digraph(&mut self, one_way_constraints: &[ConstraintId]) {
        for &id in one_way_constraints {
            let mut lhs_vars: SmallVec<[TypeVarId; 4]> = SmallVec::new();
            let mut rhs_vars: SmallVec<[TypeVarId; 4]> = SmallVec::new();
            {
                let constraint = self.system.constraint(id);
                constraint.first_type().collect_type_variables(&mut lhs_vars);
                constraint.second_type().collect_type_variables(&mut rhs_vars);
            }
            let lhs_reps = self.unique_representatives(&lhs_vars);
            let rhs_reps = self.unique_representatives(&rhs_vars);

            // The right-hand side must be solved before the left-hand side,
            // so edges run from producer to consumer.
            for &lhs_rep in &lhs_reps {
                for &rhs_rep in &rhs_reps {
                    insert_if_unique(
                        &mut self.one_way_digraph.entry(rhs_rep).or_default().out_adjacencies,
                        lhs_rep,
                    );
                    insert_if_unique(
                        &mut self.one_way_digraph.entry(lhs_rep).or_default().in_adjacencies,
                        rhs_rep,
                    );
                }
            }
        }

        for &var in self.type_vars {
            let rep = self.find_representative(var);
            if let Some(raw) = self.one_way_digraph.get_mut(&rep) {
                raw.type_vars.push(var);
            }
        }
    }

    fn unique_representatives(&mut self, vars: &[TypeVarId]) -> SmallVec<[TypeVarId; 2]> {
        let mut reps: SmallVec<[TypeVarId; 2]> = SmallVec::new();
        for &var in vars {
            let rep = self.find_representative(var);
            insert_if_unique(&mut reps, rep);
        }
        reps
    }

    /// Phase 4: assemble reported components and their one-way ordering.
    fn into_components(mut self) -> Vec<Component> {
        // Only components with at least one unbound variable are reported.
        let mut has_unbound: FxHashSet<TypeVarId> = FxHashSet::default();
        for &var in self.type_vars {
            if self.system.fixed_type(var).is_some() {
                continue;
            }
            let rep = self.find_representative(var);
            has_unbound.insert(rep);
        }

        let mut components: Vec<Component> = Vec::new();
        let mut component_index: FxHashMap<TypeVarId, usize> = FxHashMap::default();
        let mut known_constraints: FxHashSet<ConstraintId> = FxHashSet::default();

        for &var in self.type_vars {
            let rep = self.find_representative(var);
            if !has_unbound.contains(&rep) {
                continue;
            }

            let index = *component_index.entry(rep).or_insert_with(|| {
                components.push(Component::default());
                components.len() - 1
            });

            let component = &mut components[index];
            component.type_vars.push(var);

            let slot = self.graph.lookup(self.system, var);
            for &id in &self.graph.nodes[slot].constraints {
                if known_constraints.insert(id) {
                    component.constraints.push(id);
                }
            }
        }

        if !self.one_way_digraph.is_empty() {
            self.populate_one_way_dependencies(&component_index, &mut components);
        }

        components
    }

    /// Orders each component's one-way sub-components so that every
    /// `depends_on` index precedes its owner.
    fn populate_one_way_dependencies(
        &mut self,
        component_index: &FxHashMap<TypeVarId, usize>,
        components: &mut [Component],
    ) {
        // Postorder over out-adjacencies yields dependees before
        // dependents; reversing it gives the evaluation order.
        let mut dependency_orders: Vec<SmallVec<[TypeVarId; 4]>> =
            vec![SmallVec::new(); components.len()];
        let roots = self.type_vars;
        let mut visited: FxHashSet<TypeVarId> = FxHashSet::default();
        self.postorder_walk(
            roots,
            WalkDirection::Out,
            Some(component_index),
            &mut visited,
            |analysis, var| {
                if !analysis.one_way_digraph.contains_key(&var) {
                    return;
                }
                let rep = analysis.find_representative(var);
                if let Some(&index) = component_index.get(&rep) {
                    dependency_orders[index].push(var);
                }
            },
        );

        for (component_idx, component) in components.iter_mut().enumerate() {
            let order = std::mem::take(&mut dependency_orders[component_idx]);
            if order.is_empty() {
                continue;
            }

            let mut subcomponent_index: FxHashMap<TypeVarId, usize> = FxHashMap::default();
            for &var in order.iter().rev() {
                debug_assert!(!subcomponent_index.contains_key(&var));
                subcomponent_index.insert(var, component.one_way_components.len());

                let mut sub = OneWayComponent::default();
                match self.one_way_digraph.get(&var) {
                    Some(raw) => sub.type_vars = raw.type_vars.clone(),
                    None => sub.type_vars.push(var),
                }

                // Walk the in-adjacencies backwards to find every
                // sub-component this one depends on, transitively.
                let mut reached: FxHashSet<TypeVarId> = FxHashSet::default();
                let mut depends_on: SmallVec<[usize; 2]> = SmallVec::new();
                self.postorder_walk(
                    &[var],
                    WalkDirection::In,
                    None,
                    &mut reached,
                    |_, depends| {
                        if depends == var {
                            return;
                        }
                        let index = *subcomponent_index
                            .get(&depends)
                            .expect("dependency precedes its dependents in the order");
                        depends_on.push(index);
                    },
                );

                sub.depends_on = depends_on;
                component.one_way_components.push(sub);
            }
        }
    }

    fn digraph_adjacencies(
        &mut self,
        var: TypeVarId,
        direction: WalkDirection,
        component_index: Option<&FxHashMap<TypeVarId, usize>>,
    ) -> SmallVec<[TypeVarId; 2]> {
        if let Some(index) = component_index {
            // Stop at components with no unbound variables.
            let rep = self.find_representative(var);
            if !index.contains_key(&rep) {
                return SmallVec::new();
            }
        }

        match self.one_way_digraph.get(&var) {
            None => SmallVec::new(),
            Some(raw) => match direction {
                WalkDirection::Out => raw.out_adjacencies.clone(),
                WalkDirection::In => raw.in_adjacencies.clone(),
            },
        }
    }

    /// Depth-first search over the one-way digraph with an explicit stack;
    /// `post_visit` fires after a node's adjacencies are exhausted.
    fn postorder_walk(
        &mut self,
        roots: &[TypeVarId],
        direction: WalkDirection,
        component_index: Option<&FxHashMap<TypeVarId, usize>>,
        visited: &mut FxHashSet<TypeVarId>,
        mut post_visit: impl FnMut(&mut Self, TypeVarId),
    ) {
        let mut stack: Vec<(TypeVarId, SmallVec<[TypeVarId; 2]>, usize)> = Vec::new();

        for &root in roots {
            if !visited.insert(root) {
                continue;
            }
            let adjacencies = self.digraph_adjacencies(root, direction, component_index);
            stack.push((root, adjacencies, 0));

            while let Some(frame) = stack.last_mut() {
                if frame.2 < frame.1.len() {
                    let next = frame.1[frame.2];
                    frame.2 += 1;
                    if visited.insert(next) {
                        let adjacencies =
                            self.digraph_adjacencies(next, direction, component_index);
                        stack.push((next, adjacencies, 0));
                    }
                } else {
                    let var = frame.0;
                    stack.pop();
                    post_visit(self, var);
                }
            }
        }
    }
}

fn insert_if_unique(vector: &mut SmallVec<[TypeVarId; 2]>, var: TypeVarId) {
    if !vector.contains(&var) {
        vector.push(var);
    }
}
