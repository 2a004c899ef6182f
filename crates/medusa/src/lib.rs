#![forbid(unsafe_code)]

//! Headless force-directed graph layout simulation.
//!
//! `medusa` computes 2D positions for graph nodes with a composable force
//! stack over an arena quadtree: Barnes-Hut many-body charge, link springs
//! with degree bias, collision, centering, and axis/radial alignment,
//! integrated under an alpha-cooling schedule.
//!
//! The engine is runtime-agnostic: it exposes only synchronous stepping
//! (drive [`sim::Scheduler::step`] from your own frame loop, or call
//! [`layout`] for one-shot batch convergence). Rendering, event wiring, and
//! data loading live with the host.

pub mod error;
pub mod force;
pub mod graph;
pub mod quadtree;
pub mod sim;

pub use error::{Error, Result};
pub use force::{
    Axis, CenterForce, CollideForce, Force, Link, LinkEnd, LinkForce, ManyBodyForce,
    PositionForce, RadialForce,
};
pub use graph::{Edge, Graph, LayoutResult, Node, Point};
pub use quadtree::{Quad, QuadNode, Quadtree};
pub use sim::{RandomSource, Scheduler, SimNode, Simulation, TickMetrics, XorShift64Star};

/// Options for the one-shot [`layout`] entry point. Every field is
/// independently overridable; defaults match the interactive simulation's.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    /// Seed for the deterministic generator used for degenerate-geometry
    /// jitter.
    pub random_seed: u64,
    pub link_distance: f64,
    /// `None` keeps the degree-derived per-link default.
    pub link_strength: Option<f64>,
    pub charge_strength: f64,
    pub theta: f64,
    /// When set, nodes get this radius and a collide force joins the stack.
    pub collide_radius: Option<f64>,
    pub center: Point,
    pub max_ticks: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            random_seed: 0,
            link_distance: 30.0,
            link_strength: None,
            charge_strength: -30.0,
            theta: 0.9,
            collide_radius: None,
            center: Point { x: 0.0, y: 0.0 },
            max_ticks: 300,
        }
    }
}

/// Headless layout entry point: build the standard center + charge + link
/// stack, run the cooling schedule to convergence, return final positions
/// keyed by node id.
pub fn layout(graph: &Graph, opts: &LayoutOptions) -> Result<LayoutResult> {
    graph.validate()?;

    let mut sim = Simulation::new();
    sim.set_random_seed(opts.random_seed);

    let mut nodes: Vec<SimNode> = graph.nodes.iter().map(SimNode::from).collect();
    if let Some(r) = opts.collide_radius {
        for n in &mut nodes {
            n.radius = r;
        }
    }
    sim.set_nodes(nodes);

    sim.add_force(
        "center",
        Force::Center(CenterForce::at(opts.center.x, opts.center.y)),
    );
    let mut charge = ManyBodyForce::with_strength(opts.charge_strength);
    charge.theta = opts.theta;
    sim.add_force("charge", Force::ManyBody(charge));
    let links = graph
        .edges
        .iter()
        .map(|e| Link::new(e.source.as_str(), e.target.as_str()))
        .collect();
    let mut link = LinkForce::new(links);
    link.distance = opts.link_distance;
    link.strength = opts.link_strength;
    sim.add_force("link", Force::Link(link));
    if opts.collide_radius.is_some() {
        sim.add_force("collide", Force::Collide(CollideForce::default()));
    }

    sim.start();
    let mut scheduler = Scheduler::new();
    scheduler.run_to_convergence(&mut sim, opts.max_ticks.max(1));

    let mut positions = std::collections::BTreeMap::new();
    for n in sim.nodes() {
        positions.insert(n.id.clone(), Point { x: n.x, y: n.y });
    }
    Ok(LayoutResult { positions })
}
