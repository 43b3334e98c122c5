use std::time::Instant;

use tyvar_graph::{
    ConstraintGraph, ConstraintKind, ConstraintSystem, DefaultConstraintSystem, GatheringKind,
    TypeTerm, TypeVarId, TypeVarOptions,
};

fn main() {
    let scenarios = [
        ("small", 50usize),
        ("medium", 500usize),
        ("large", 5000usize),
    ];

    for (name, variable_count) in scenarios {
        run_scenario(name, variable_count);
    }
}

fn run_scenario(label: &str, variable_count: usize) {
    let mut system = DefaultConstraintSystem::new();
    let vars: Vec<TypeVarId> = (0..variable_count)
        .map(|_| system.new_type_variable(TypeVarOptions::default()))
        .collect();

    // Chains of ordinary constraints broken into islands, bridged by
    // one-way constraints, with an equality-like edge every few links so
    // contraction has work to do.
    let island = 10usize.min(variable_count);
    for window in vars.windows(2) {
        let [left, right] = window else { continue };
        let position = left.to_raw() as usize;
        let kind = if position % island == island - 1 {
            ConstraintKind::OneWayBind
        } else if position % 3 == 0 {
            ConstraintKind::Equal
        } else {
            ConstraintKind::Subtype
        };
        system.register_constraint(kind, TypeTerm::var(*left), TypeTerm::var(*right));
    }

    let build_start = Instant::now();
    let mut graph = ConstraintGraph::new();
    for id in system.registered_constraints() {
        graph.add_constraint(&system, id);
    }
    let build_elapsed = build_start.elapsed();

    let components_start = Instant::now();
    let components = graph.compute_connected_components(&system, &vars);
    let components_elapsed = components_start.elapsed();

    let gather_start = Instant::now();
    let gathered =
        graph.gather_constraints(&system, vars[0], GatheringKind::AllMentions, |_| true);
    let gather_elapsed = gather_start.elapsed();

    let contract_start = Instant::now();
    graph.optimize(&mut system);
    let contract_elapsed = contract_start.elapsed();

    graph.verify(&system).expect("graph invariants hold");

    println!(
        "{label}: vars={} components={} gathered={} build_ms={:.2} components_ms={:.2} gather_ms={:.2} contract_ms={:.2}",
        variable_count,
        components.len(),
        gathered.len(),
        build_elapsed.as_secs_f64() * 1000.0,
        components_elapsed.as_secs_f64() * 1000.0,
        gather_elapsed.as_secs_f64() * 1000.0,
        contract_elapsed.as_secs_f64() * 1000.0,
    );
}
