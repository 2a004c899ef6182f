use std::cell::Cell;
use std::rc::Rc;

use medusa::{
    CenterForce, CollideForce, Force, Link, LinkForce, ManyBodyForce, PositionForce, RadialForce,
    SimNode, Simulation, XorShift64Star,
};

fn node(id: &str, x: f64, y: f64) -> SimNode {
    SimNode::at(id, x, y)
}

#[test]
fn undriven_alpha_converges_and_self_stops_within_bounded_steps() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0), node("b", 10.0, 0.0)]);
    sim.start();

    let mut frames = 0;
    while sim.step() {
        frames += 1;
        assert!(frames < 1000, "simulation failed to converge");
    }
    // alpha(n) = (1 − alpha_decay)^n with the default decay reaches
    // alpha_min ≈ 0.001 at n ≈ 300.
    assert!((295..=305).contains(&frames), "converged after {frames} frames");
    assert!(sim.alpha() < sim.alpha_min());
    assert!(!sim.is_running());
}

#[test]
fn tick_advances_regardless_of_run_state_and_fires_no_tick_events() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0)]);

    let ticks = Rc::new(Cell::new(0u32));
    let seen = ticks.clone();
    sim.on_tick(move |_| seen.set(seen.get() + 1));

    sim.tick(5);
    assert_eq!(ticks.get(), 0);
    assert_eq!(sim.metrics().total_ticks, 5);
    assert!(sim.alpha() < 1.0);
}

#[test]
fn end_fires_exactly_once_when_a_running_simulation_cools_out() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0)]);

    let ends = Rc::new(Cell::new(0u32));
    let seen = ends.clone();
    sim.on_end(move |_| seen.set(seen.get() + 1));

    sim.start();
    sim.tick(400);
    assert!(!sim.is_running());
    assert_eq!(ends.get(), 1);

    // Further ticks stay idle and must not re-fire.
    sim.tick(10);
    assert_eq!(ends.get(), 1);
}

#[test]
fn tick_events_deliver_a_snapshot_every_frame() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0), node("b", 5.0, 5.0)]);

    let ticks = Rc::new(Cell::new(0u32));
    let seen = ticks.clone();
    sim.on_tick(move |nodes| {
        assert_eq!(nodes.len(), 2);
        seen.set(seen.get() + 1);
    });

    sim.start();
    for _ in 0..10 {
        sim.step();
    }
    assert_eq!(ticks.get(), 10);
}

#[test]
fn stop_is_idempotent_and_restart_reheats_to_alpha_one() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0)]);
    sim.start();
    sim.step();
    assert!(sim.alpha() < 1.0);

    sim.stop();
    sim.stop();
    assert!(!sim.step());

    sim.restart();
    assert!(sim.is_running());
    assert_eq!(sim.alpha(), 1.0);
    assert!(sim.step());
}

#[test]
fn pinned_axes_override_every_force_after_each_tick() {
    let mut pinned = node("a", 0.0, 0.0);
    pinned.pin(0.0, 0.0);
    let mut sim = Simulation::new();
    sim.set_nodes(vec![pinned, node("b", 30.0, 0.0), node("c", 0.0, 30.0)]);

    let mut link = LinkForce::new(vec![Link::new("a", "b"), Link::new("a", "c")]);
    link.distance = 50.0;
    sim.add_force("link", Force::Link(link));
    sim.add_force("charge", Force::ManyBody(ManyBodyForce::default()));
    sim.add_force("center", Force::Center(CenterForce::at(100.0, 100.0)));

    for _ in 0..20 {
        sim.tick(1);
        let a = &sim.nodes()[0];
        assert_eq!(a.x, 0.0);
        assert_eq!(a.y, 0.0);
        assert_eq!(a.vx, 0.0);
        assert_eq!(a.vy, 0.0);
    }
    // The unpinned nodes did move.
    assert!(sim.nodes()[1].x != 30.0);
}

#[test]
fn single_link_settles_at_its_rest_distance() {
    // A(0,0), B(100,0), distance 50, strength 1, no other forces: after the
    // cooling schedule runs out, the separation sits within 1 of the rest
    // length.
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0), node("b", 100.0, 0.0)]);
    let mut link = LinkForce::new(vec![Link::new("a", "b")]);
    link.distance = 50.0;
    link.strength = Some(1.0);
    sim.add_force("link", Force::Link(link));

    sim.start();
    sim.tick(400);
    assert!(!sim.is_running());

    let nodes = sim.nodes();
    let dx = nodes[1].x - nodes[0].x;
    let dy = nodes[1].y - nodes[0].y;
    let dist = (dx * dx + dy * dy).sqrt();
    assert!(
        (dist - 50.0).abs() < 1.0,
        "settled at {dist}, expected 50 ± 1"
    );
}

#[test]
fn center_force_moves_the_centroid_onto_the_target() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![
        node("a", 0.0, 0.0),
        node("b", 10.0, 0.0),
        node("c", 20.0, 10.0),
    ]);
    sim.add_force("center", Force::Center(CenterForce::at(100.0, 50.0)));
    sim.tick(10);

    let nodes = sim.nodes();
    let cx = nodes.iter().map(|n| n.x).sum::<f64>() / 3.0;
    let cy = nodes.iter().map(|n| n.y).sum::<f64>() / 3.0;
    assert!((cx - 100.0).abs() < 0.01);
    assert!((cy - 50.0).abs() < 0.01);
    // Relative geometry is untouched: centering translates, never deforms.
    assert!((nodes[1].x - nodes[0].x - 10.0).abs() < 1e-9);
}

#[test]
fn axis_force_pulls_onto_the_target_coordinate() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 7.0)]);
    let mut fx = PositionForce::x(100.0);
    fx.strength = 1.0;
    sim.add_force("x", Force::Position(fx));
    sim.tick(350);

    let a = &sim.nodes()[0];
    assert!((a.x - 100.0).abs() < 0.5, "x = {}", a.x);
    assert_eq!(a.y, 7.0);
}

#[test]
fn radial_force_pulls_onto_the_ring() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 3.0, 4.0)]);
    let mut radial = RadialForce::new(50.0);
    radial.strength = 1.0;
    sim.add_force("r", Force::Radial(radial));
    sim.tick(350);

    let a = &sim.nodes()[0];
    let r = (a.x * a.x + a.y * a.y).sqrt();
    assert!((r - 50.0).abs() < 1.0, "radius = {r}");
}

#[test]
fn collide_force_separates_overlapping_nodes() {
    let mut a = node("a", 0.0, 0.0);
    let mut b = node("b", 5.0, 0.0);
    a.radius = 10.0;
    b.radius = 10.0;
    let mut sim = Simulation::new();
    sim.set_nodes(vec![a, b]);
    sim.add_force("collide", Force::Collide(CollideForce::default()));
    sim.tick(50);

    let nodes = sim.nodes();
    let dist = (nodes[1].x - nodes[0].x).abs();
    assert!(dist > 19.0, "separation = {dist}");
}

#[test]
fn find_returns_the_nearest_node_within_the_radius() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![
        node("a", 0.0, 0.0),
        node("b", 50.0, 0.0),
        node("c", 100.0, 0.0),
    ]);
    assert_eq!(sim.find(40.0, 5.0, None).map(|n| n.id.as_str()), Some("b"));
    assert!(sim.find(40.0, 5.0, Some(5.0)).is_none());
    assert_eq!(
        sim.find(40.0, 5.0, Some(20.0)).map(|n| n.id.as_str()),
        Some("b")
    );
}

#[test]
fn unplaced_nodes_are_assigned_distinct_finite_positions() {
    let mut sim = Simulation::new();
    sim.set_nodes((0..20).map(|i| SimNode::new(format!("n{i}"))).collect());
    let nodes = sim.nodes();
    for n in nodes {
        assert!(n.x.is_finite() && n.y.is_finite());
        assert_eq!(n.vx, 0.0);
    }
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            assert!(
                nodes[i].x != nodes[j].x || nodes[i].y != nodes[j].y,
                "nodes {i} and {j} placed coincident"
            );
        }
    }
}

#[test]
fn invalid_node_parameters_are_sanitized_on_set() {
    let mut bad = node("a", 1.0, 2.0);
    bad.mass = -3.0;
    bad.radius = f64::NAN;
    bad.vx = f64::INFINITY;
    let mut sim = Simulation::new();
    sim.set_nodes(vec![bad]);
    let n = &sim.nodes()[0];
    assert_eq!(n.mass, 1.0);
    assert_eq!(n.radius, 8.0);
    assert_eq!(n.vx, 0.0);
}

#[test]
fn configuration_writes_clamp_to_valid_domains() {
    let mut sim = Simulation::new();
    sim.set_alpha(7.0);
    assert_eq!(sim.alpha(), 1.0);
    sim.set_velocity_decay(-0.5);
    assert_eq!(sim.velocity_decay(), 0.0);
    sim.set_alpha_decay(f64::NAN);
    assert!(sim.alpha_decay() > 0.0);
    sim.set_alpha_target(0.3);
    assert_eq!(sim.alpha_target(), 0.3);
}

#[test]
fn driven_alpha_holds_at_the_target_and_never_stops() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0)]);
    sim.set_alpha_target(0.3);
    sim.start();
    sim.tick(500);
    assert!(sim.is_running());
    assert!((sim.alpha() - 0.3).abs() < 1e-4);
}

#[test]
fn replacing_the_node_set_reinitializes_forces() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0), node("b", 10.0, 0.0)]);
    let link = LinkForce::new(vec![Link::new("a", "b"), Link::new("a", "ghost")]);
    sim.add_force("link", Force::Link(link));

    let resolved = |sim: &Simulation| match sim.force("link") {
        Some(Force::Link(f)) => f.resolved_count(),
        _ => panic!("link force missing"),
    };
    assert_eq!(resolved(&sim), 1);

    // The dangling endpoint appears: the retained raw link resolves now.
    sim.set_nodes(vec![
        node("a", 0.0, 0.0),
        node("b", 10.0, 0.0),
        node("ghost", 5.0, 5.0),
    ]);
    assert_eq!(resolved(&sim), 2);
}

#[test]
fn forces_are_addressable_and_removable_by_name() {
    let mut sim = Simulation::new();
    sim.set_nodes(vec![node("a", 0.0, 0.0)]);
    sim.add_force("charge", Force::ManyBody(ManyBodyForce::with_strength(-10.0)));

    match sim.force_mut("charge") {
        Some(Force::ManyBody(f)) => f.strength = -60.0,
        _ => panic!("charge force missing"),
    }
    match sim.force("charge") {
        Some(Force::ManyBody(f)) => assert_eq!(f.strength, -60.0),
        _ => panic!("charge force missing"),
    }
    assert!(sim.remove_force("charge").is_some());
    assert!(sim.force("charge").is_none());
}

#[test]
fn repulsion_only_cloud_stays_bounded_and_sublinear_in_visits() {
    // 500 scattered nodes under pure many-body repulsion: motion must stay
    // bounded over 50 ticks, and the tree walk must beat the O(n²)
    // pairwise baseline by a wide margin.
    let mut rng = XorShift64Star::new(99);
    let nodes: Vec<SimNode> = (0..500)
        .map(|i| {
            SimNode::at(
                format!("n{i}"),
                rng.next_f64_unit() * 500.0,
                rng.next_f64_unit() * 500.0,
            )
        })
        .collect();
    let initial: Vec<(f64, f64)> = nodes.iter().map(|n| (n.x, n.y)).collect();

    let mut sim = Simulation::new();
    sim.set_nodes(nodes);
    sim.add_force("charge", Force::ManyBody(ManyBodyForce::default()));
    sim.tick(50);

    let mut total_displacement = 0.0;
    for (n, (x0, y0)) in sim.nodes().iter().zip(&initial) {
        assert!(n.x.is_finite() && n.y.is_finite());
        total_displacement += ((n.x - x0).powi(2) + (n.y - y0).powi(2)).sqrt();
    }
    let avg_per_tick = total_displacement / 500.0 / 50.0;
    assert!(avg_per_tick < 20.0, "average displacement {avg_per_tick} per tick");

    let visits = match sim.force("charge") {
        Some(Force::ManyBody(f)) => f.last_visit_count(),
        _ => panic!("charge force missing"),
    };
    assert!(
        visits < 500 * 500 / 2,
        "visited {visits} tree nodes, expected well under the pairwise baseline"
    );
}
