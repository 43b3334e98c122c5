//! End-to-end scenarios driving the graph through [`DefaultConstraintSystem`].

use crate::constraint::{ConstraintId, ConstraintKind};
use crate::graph::{ConstraintGraph, GatheringKind};
use crate::system::{ConstraintSystem, DefaultConstraintSystem};
use crate::types::{TypeTerm, TypeVarId, TypeVarOptions};

fn fresh_vars(system: &mut DefaultConstraintSystem, count: usize) -> Vec<TypeVarId> {
    (0..count)
        .map(|_| system.new_type_variable(TypeVarOptions::default()))
        .collect()
}

/// Structural summary used to compare graph states across a scope.
fn graph_state(graph: &ConstraintGraph) -> Vec<(TypeVarId, Vec<ConstraintId>, Vec<TypeVarId>)> {
    let mut state: Vec<_> = graph
        .type_variables()
        .iter()
        .map(|&var| {
            let node = graph.node(var).expect("registered variable has a node");
            let mut constraints = node.constraints().to_vec();
            constraints.sort_unstable();
            let mut bindings = node.fixed_bindings().to_vec();
            bindings.sort_unstable();
            (var, constraints, bindings)
        })
        .collect();
    state.sort_by_key(|entry| entry.0);
    state
}

#[test]
fn scope_reversal_keeps_preexisting_variables() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 2);

    let mut graph = ConstraintGraph::new();
    // Observe both variables before the scope opens.
    graph.equivalence_class(&system, vars[0]);
    graph.equivalence_class(&system, vars[1]);

    let id = system.register_constraint(
        ConstraintKind::Bind,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );

    let scope = graph.snapshot();
    graph.add_constraint(&system, id);
    graph.rollback_to(&system, scope);

    assert_eq!(graph.type_variables(), vars.as_slice());
    assert!(graph.node(vars[0]).unwrap().constraints().is_empty());
    assert!(graph.node(vars[1]).unwrap().constraints().is_empty());
    assert_eq!(graph.pending_changes(), 0);
}

#[test]
fn scope_reversal_drops_variables_first_observed_inside() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 2);
    let id = system.register_constraint(
        ConstraintKind::Bind,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );

    let mut graph = ConstraintGraph::new();
    let scope = graph.snapshot();
    graph.add_constraint(&system, id);
    graph.rollback_to(&system, scope);

    assert!(graph.type_variables().is_empty());
    assert_eq!(graph.pending_changes(), 0);
}

#[test]
fn orphan_constraints_are_tracked_separately() {
    let mut system = DefaultConstraintSystem::new();
    let id = system.register_constraint(
        ConstraintKind::Conversion,
        TypeTerm::named("Int"),
        TypeTerm::named("Double"),
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, id);

    assert_eq!(graph.orphaned_constraints(), &[id]);
    assert!(graph.type_variables().is_empty());

    graph.remove_constraint(&system, id);
    assert!(graph.orphaned_constraints().is_empty());
}

#[test]
fn equivalence_merge_unwinds_to_the_previous_class() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 2);

    let mut graph = ConstraintGraph::new();
    graph.equivalence_class(&system, vars[0]);
    graph.equivalence_class(&system, vars[1]);

    system.merge_equivalence_classes(vars[0], vars[1], false);

    let scope = graph.snapshot();
    graph.merge_equivalence(&system, vars[0], vars[1]);
    assert_eq!(graph.equivalence_class(&system, vars[0]), &[vars[0], vars[1]]);

    graph.rollback_to(&system, scope);
    assert_eq!(graph.equivalence_class(&system, vars[0]), &[vars[0]]);
    assert_eq!(graph.pending_changes(), 0);
}

#[test]
fn one_way_constraints_order_subcomponents() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 4);
    let left = system.register_constraint(
        ConstraintKind::Equal,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );
    let right = system.register_constraint(
        ConstraintKind::Equal,
        TypeTerm::var(vars[2]),
        TypeTerm::var(vars[3]),
    );
    let one_way = system.register_constraint(
        ConstraintKind::OneWayBind,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[2]),
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, left);
    graph.add_constraint(&system, right);
    graph.add_constraint(&system, one_way);

    let components = graph.compute_connected_components(&system, &vars);
    assert_eq!(components.len(), 1);

    let component = &components[0];
    assert_eq!(component.type_vars, vars);
    assert_eq!(component.constraints, vec![left, one_way, right]);

    let subs = &component.one_way_components;
    assert_eq!(subs.len(), 2);
    // The right-hand side of the one-way constraint must be solved first.
    assert_eq!(subs[0].type_vars.as_slice(), &[vars[2], vars[3]]);
    assert!(subs[0].depends_on.is_empty());
    assert_eq!(subs[1].type_vars.as_slice(), &[vars[0], vars[1]]);
    assert_eq!(subs[1].depends_on.as_slice(), &[0]);
}

#[test]
fn dependency_indices_always_precede_their_owner() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 6);
    let mut graph = ConstraintGraph::new();

    // A diamond of one-way constraints plus an ordinary link.
    for (first, second) in [(0, 2), (1, 2), (3, 0), (3, 1)] {
        let id = system.register_constraint(
            ConstraintKind::OneWayBind,
            TypeTerm::var(vars[first]),
            TypeTerm::var(vars[second]),
        );
        graph.add_constraint(&system, id);
    }
    let link = system.register_constraint(
        ConstraintKind::Equal,
        TypeTerm::var(vars[4]),
        TypeTerm::var(vars[5]),
    );
    graph.add_constraint(&system, link);

    let components = graph.compute_connected_components(&system, &vars);
    for component in &components {
        for (owner, sub) in component.one_way_components.iter().enumerate() {
            for &dependency in &sub.depends_on {
                assert!(dependency < owner, "dependency {dependency} not before {owner}");
            }
        }
    }
}

#[test]
fn contraction_is_skipped_when_inout_may_leak() {
    let mut system = DefaultConstraintSystem::new();
    let arg = system.new_type_variable(TypeVarOptions::inout());
    let param = system.new_type_variable(TypeVarOptions::default());
    let risky = system.new_type_variable(TypeVarOptions::inout());

    let id = system.register_constraint(
        ConstraintKind::BindParam,
        TypeTerm::var(arg),
        TypeTerm::var(param),
    );
    system.set_potential_bindings(
        arg,
        vec![TypeTerm::Named {
            name: "Wrapper".into(),
            args: vec![TypeTerm::var(risky)],
        }],
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, id);
    graph.optimize(&mut system);

    assert_eq!(system.representative(param), param);
    assert_eq!(graph.node(arg).unwrap().constraints(), &[id]);
    assert_eq!(system.registered_constraints(), vec![id]);
}

#[test]
fn contraction_is_skipped_on_direct_inout_candidates() {
    let mut system = DefaultConstraintSystem::new();
    let arg = system.new_type_variable(TypeVarOptions::inout());
    let param = system.new_type_variable(TypeVarOptions::default());

    let id = system.register_constraint(
        ConstraintKind::BindParam,
        TypeTerm::var(arg),
        TypeTerm::var(param),
    );
    system.set_potential_bindings(
        arg,
        vec![TypeTerm::InOut(Box::new(TypeTerm::named("Int")))],
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, id);
    graph.optimize(&mut system);

    assert_eq!(system.representative(param), param);
    assert_eq!(graph.node(arg).unwrap().constraints(), &[id]);
}

#[test]
fn gathering_all_mentions_reaches_chained_constraints() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 4);
    let c1 = system.register_constraint(
        ConstraintKind::Bind,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );
    let c2 = system.register_constraint(
        ConstraintKind::Bind,
        TypeTerm::var(vars[1]),
        TypeTerm::var(vars[2]),
    );
    let c3 = system.register_constraint(
        ConstraintKind::Equal,
        TypeTerm::var(vars[2]),
        TypeTerm::var(vars[3]),
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, c1);
    graph.add_constraint(&system, c2);
    graph.add_constraint(&system, c3);

    let gathered = graph.gather_constraints(&system, vars[0], GatheringKind::AllMentions, |_| true);
    assert_eq!(gathered, vec![c1, c2, c3]);

    // The predicate still filters what is reported.
    let only_binds = graph.gather_constraints(&system, vars[0], GatheringKind::AllMentions, |c| {
        c.kind() == ConstraintKind::Bind
    });
    assert_eq!(only_binds, vec![c1, c2]);
}

#[test]
fn mixed_mutations_under_a_scope_are_fully_reversible() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 3);
    let existing = system.register_constraint(
        ConstraintKind::Subtype,
        TypeTerm::var(vars[0]),
        TypeTerm::named("Int"),
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, existing);
    let before = graph_state(&graph);
    let orphans_before = graph.orphaned_constraints().to_vec();

    let added = system.register_constraint(
        ConstraintKind::Conversion,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );
    let orphan = system.register_constraint(
        ConstraintKind::Defaultable,
        TypeTerm::named("Int"),
        TypeTerm::named("Int"),
    );

    let scope = graph.snapshot();
    graph.add_constraint(&system, added);
    graph.add_constraint(&system, orphan);
    graph.bind_type_variable(
        &system,
        vars[0],
        &TypeTerm::Named {
            name: "Array".into(),
            args: vec![TypeTerm::var(vars[2])],
        },
    );
    graph.remove_constraint(&system, existing);
    graph.rollback_to(&system, scope);

    assert_eq!(graph_state(&graph), before);
    assert_eq!(graph.orphaned_constraints(), orphans_before.as_slice());
    assert_eq!(graph.pending_changes(), 0);
}

#[test]
fn fixed_bindings_stay_symmetric() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 4);

    let mut graph = ConstraintGraph::new();
    graph.bind_type_variable(
        &system,
        vars[0],
        &TypeTerm::Tuple(vec![TypeTerm::var(vars[1]), TypeTerm::var(vars[2])]),
    );
    graph.bind_type_variable(
        &system,
        vars[1],
        &TypeTerm::Named {
            name: "Array".into(),
            args: vec![TypeTerm::var(vars[2]), TypeTerm::var(vars[3])],
        },
    );

    for &u in graph.type_variables() {
        let u_bindings = graph.node(u).unwrap().fixed_bindings().to_vec();
        for &v in &u_bindings {
            let forward = u_bindings.iter().filter(|&&known| known == v).count();
            let backward = graph
                .node(v)
                .unwrap()
                .fixed_bindings()
                .iter()
                .filter(|&&known| known == u)
                .count();
            assert_eq!(forward, backward, "asymmetry between {u} and {v}");
        }
    }
}

#[test]
fn optimize_is_idempotent() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 4);
    let fuse_a = system.register_constraint(
        ConstraintKind::Equal,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );
    let fuse_b = system.register_constraint(
        ConstraintKind::Bind,
        TypeTerm::var(vars[1]),
        TypeTerm::var(vars[2]),
    );
    let kept = system.register_constraint(
        ConstraintKind::Subtype,
        TypeTerm::var(vars[2]),
        TypeTerm::var(vars[3]),
    );
    let concrete = system.register_constraint(
        ConstraintKind::Equal,
        TypeTerm::var(vars[3]),
        TypeTerm::named("Int"),
    );

    let mut graph = ConstraintGraph::new();
    for id in [fuse_a, fuse_b, kept, concrete] {
        graph.add_constraint(&system, id);
    }

    graph.optimize(&mut system);
    let state = graph_state(&graph);
    let registered = system.registered_constraints();
    let class: Vec<_> = graph.equivalence_class(&system, vars[0]).to_vec();

    graph.optimize(&mut system);
    assert_eq!(graph_state(&graph), state);
    assert_eq!(system.registered_constraints(), registered);
    assert_eq!(graph.equivalence_class(&system, vars[0]), class.as_slice());
    graph.verify(&system).expect("graph invariants hold");
}

#[test]
fn node_printing_is_stable() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 2);
    let id = system.register_constraint(
        ConstraintKind::Bind,
        TypeTerm::var(vars[0]),
        TypeTerm::var(vars[1]),
    );

    let mut graph = ConstraintGraph::new();
    graph.add_constraint(&system, id);

    let mut out = String::new();
    graph.print(&system, &mut out).unwrap();
    assert_eq!(
        out,
        "  $T0:\n    constraints:\n      $T0 bind $T1\n  $T1:\n    constraints:\n      $T0 bind $T1\n"
    );
}

#[test]
fn component_printing_lists_one_way_dependencies() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 4);
    for (kind, first, second) in [
        (ConstraintKind::Equal, 0, 1),
        (ConstraintKind::Equal, 2, 3),
        (ConstraintKind::OneWayBind, 0, 2),
    ] {
        system.register_constraint(kind, TypeTerm::var(vars[first]), TypeTerm::var(vars[second]));
    }

    let mut graph = ConstraintGraph::new();
    for id in system.registered_constraints() {
        graph.add_constraint(&system, id);
    }

    let mut out = String::new();
    graph.print_connected_components(&system, &mut out).unwrap();
    assert_eq!(
        out,
        "  0: $T0 $T1 $T2 $T3, one way components = {$T2 $T3} {$T0 $T1 depends on 0}\n"
    );
}

#[test]
fn components_report_every_unbound_connection() {
    let mut system = DefaultConstraintSystem::new();
    let vars = fresh_vars(&mut system, 5);
    let pairs = [(0, 1), (1, 2), (3, 4)];
    let mut graph = ConstraintGraph::new();
    for &(first, second) in &pairs {
        let id = system.register_constraint(
            ConstraintKind::Subtype,
            TypeTerm::var(vars[first]),
            TypeTerm::var(vars[second]),
        );
        graph.add_constraint(&system, id);
    }

    let components = graph.compute_connected_components(&system, &vars);
    assert_eq!(components.len(), 2);
    assert_eq!(components[0].type_vars, vec![vars[0], vars[1], vars[2]]);
    assert_eq!(components[1].type_vars, vec![vars[3], vars[4]]);
}
