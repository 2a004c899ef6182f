//! The integrator: owns node state, the alpha-cooling schedule, and the
//! force registry, and advances the simulation one synchronous step at a
//! time. No timers live here; pacing belongs to the host (see
//! [`Scheduler`]).

use std::fmt;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::force::Force;

pub mod node;
pub mod rng;
pub mod scheduler;

pub use node::SimNode;
pub use rng::{RandomSource, XorShift64Star};
pub use scheduler::Scheduler;

/// Phyllotaxis placement for nodes without an initial position: nodes land
/// on a golden-angle spiral disc, so no two start coincident.
const INITIAL_RADIUS: f64 = 10.0;
const INITIAL_ANGLE: f64 = 2.399963229728653; // π(3 − √5)

const DEFAULT_ALPHA_MIN: f64 = 0.001;
/// `1 − 0.001^(1/300)`: undriven alpha decays from 1 to below
/// `DEFAULT_ALPHA_MIN` in ~300 steps.
const DEFAULT_ALPHA_DECAY: f64 = 0.022_762_779_044_189_33;
const DEFAULT_VELOCITY_DECAY: f64 = 0.4;

/// Observability snapshot: tick durations, counts, and instantaneous frame
/// rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickMetrics {
    pub last_tick: Duration,
    pub average_tick: Duration,
    pub total_ticks: u64,
    /// Derived from the spacing of the last two steps; zero until two steps
    /// have run.
    pub fps: f64,
}

type NodeHandler = Box<dyn FnMut(&[SimNode])>;

/// Force-directed simulation over a dense node arena.
///
/// State machine: idle → running → idle via `start`/`stop`; `restart`
/// resets alpha to 1 and resumes. `tick(n)` advances synchronously
/// regardless of run state and fires no tick events — the deterministic
/// testing path. The frame path (`step`, normally driven through a
/// [`Scheduler`]) fires "tick" after every step and "end" once alpha cools
/// below `alpha_min`.
pub struct Simulation {
    nodes: Vec<SimNode>,
    forces: IndexMap<String, Force>,
    alpha: f64,
    alpha_min: f64,
    alpha_decay: f64,
    alpha_target: f64,
    velocity_decay: f64,
    running: bool,
    rng: Box<dyn RandomSource>,
    tick_handlers: Vec<NodeHandler>,
    end_handlers: Vec<NodeHandler>,
    metrics: TickMetrics,
    total_tick_time: Duration,
    last_step_at: Option<Instant>,
    timing: bool,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("nodes", &self.nodes.len())
            .field("forces", &self.forces.keys().collect::<Vec<_>>())
            .field("alpha", &self.alpha)
            .field("running", &self.running)
            .finish()
    }
}

impl Simulation {
    pub fn new() -> Self {
        let timing = std::env::var("MEDUSA_TICK_TIMING").ok().as_deref() == Some("1");
        Self {
            nodes: Vec::new(),
            forces: IndexMap::new(),
            alpha: 1.0,
            alpha_min: DEFAULT_ALPHA_MIN,
            alpha_decay: DEFAULT_ALPHA_DECAY,
            alpha_target: 0.0,
            velocity_decay: DEFAULT_VELOCITY_DECAY,
            running: false,
            rng: Box::new(XorShift64Star::default()),
            tick_handlers: Vec::new(),
            end_handlers: Vec::new(),
            metrics: TickMetrics::default(),
            total_tick_time: Duration::ZERO,
            last_step_at: None,
            timing,
        }
    }

    // ---- node arena ------------------------------------------------------

    /// Replace the node set wholesale. Slot indices are reassigned, missing
    /// fields get their defaults (phyllotaxis position, zero velocity, mass
    /// 1, radius 8), and every registered force is re-initialized. Physics
    /// state is not diffed across calls: pre-seed positions on the incoming
    /// nodes to preserve continuity.
    pub fn set_nodes(&mut self, mut nodes: Vec<SimNode>) {
        for (i, n) in nodes.iter_mut().enumerate() {
            n.index = i;
            if let Some(fx) = n.fx {
                n.x = fx;
            }
            if let Some(fy) = n.fy {
                n.y = fy;
            }
            if !(n.x.is_finite() && n.y.is_finite()) {
                let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                let angle = i as f64 * INITIAL_ANGLE;
                n.x = radius * angle.cos();
                n.y = radius * angle.sin();
            }
            if !n.vx.is_finite() {
                n.vx = 0.0;
            }
            if !n.vy.is_finite() {
                n.vy = 0.0;
            }
            if !(n.mass.is_finite() && n.mass > 0.0) {
                n.mass = SimNode::DEFAULT_MASS;
            }
            if !(n.radius.is_finite() && n.radius >= 0.0) {
                n.radius = SimNode::DEFAULT_RADIUS;
            }
        }
        self.nodes = nodes;
        self.initialize_forces();
    }

    /// Read-only snapshot of the node arena, valid until the next step.
    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// Pin a node on both axes — the sanctioned mutation channel for drag
    /// interactions.
    pub fn pin_node(&mut self, index: usize, x: f64, y: f64) {
        if let Some(n) = self.nodes.get_mut(index) {
            n.pin(x, y);
        }
    }

    pub fn unpin_node(&mut self, index: usize) {
        if let Some(n) = self.nodes.get_mut(index) {
            n.unpin();
        }
    }

    // ---- force registry --------------------------------------------------

    /// Register (or replace) a force under a name. Forces run in insertion
    /// order each step; re-registering under an existing name keeps the
    /// original position. The force is initialized against the current
    /// nodes immediately.
    pub fn add_force(&mut self, name: impl Into<String>, mut force: Force) {
        force.initialize(&self.nodes);
        self.forces.insert(name.into(), force);
    }

    pub fn force(&self, name: &str) -> Option<&Force> {
        self.forces.get(name)
    }

    pub fn force_mut(&mut self, name: &str) -> Option<&mut Force> {
        self.forces.get_mut(name)
    }

    pub fn remove_force(&mut self, name: &str) -> Option<Force> {
        self.forces.shift_remove(name)
    }

    fn initialize_forces(&mut self) {
        for (_, force) in self.forces.iter_mut() {
            force.initialize(&self.nodes);
        }
    }

    // ---- cooling schedule ------------------------------------------------

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) {
        self.alpha = clamp_unit(alpha, self.alpha);
    }

    pub fn alpha_min(&self) -> f64 {
        self.alpha_min
    }

    pub fn set_alpha_min(&mut self, alpha_min: f64) {
        self.alpha_min = clamp_unit(alpha_min, self.alpha_min);
    }

    pub fn alpha_decay(&self) -> f64 {
        self.alpha_decay
    }

    pub fn set_alpha_decay(&mut self, alpha_decay: f64) {
        self.alpha_decay = clamp_unit(alpha_decay, self.alpha_decay);
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    pub fn set_alpha_target(&mut self, alpha_target: f64) {
        self.alpha_target = clamp_unit(alpha_target, self.alpha_target);
    }

    pub fn velocity_decay(&self) -> f64 {
        self.velocity_decay
    }

    pub fn set_velocity_decay(&mut self, velocity_decay: f64) {
        self.velocity_decay = clamp_unit(velocity_decay, self.velocity_decay);
    }

    // ---- randomness ------------------------------------------------------

    /// Reset the default generator with a seed, for reproducible runs.
    pub fn set_random_seed(&mut self, seed: u64) {
        self.rng = Box::new(XorShift64Star::new(seed));
    }

    /// Swap in a caller-supplied generator.
    pub fn set_random_source(&mut self, rng: Box<dyn RandomSource>) {
        self.rng = rng;
    }

    // ---- run state -------------------------------------------------------

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Idempotent; takes effect before the next frame. The current
    /// synchronous step, if any, always completes.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Reheat to alpha 1 and resume.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
        self.running = true;
    }

    // ---- stepping --------------------------------------------------------

    /// Execute `iterations` steps synchronously, regardless of run state and
    /// without firing tick events. Crossing `alpha_min` still transitions a
    /// running simulation to idle (firing "end" once).
    pub fn tick(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.timed_step();
            self.check_converged();
        }
    }

    /// One frame: a single step plus tick-event dispatch. Returns whether
    /// the simulation still wants frames. No-op when idle.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.timed_step();
        self.emit(EventKind::Tick);
        self.check_converged();
        self.running
    }

    fn timed_step(&mut self) {
        let started = Instant::now();
        self.step_once();
        let elapsed = started.elapsed();

        if let Some(prev) = self.last_step_at.replace(started) {
            let gap = started.duration_since(prev).as_secs_f64();
            if gap > 0.0 {
                self.metrics.fps = 1.0 / gap;
            }
        }
        self.metrics.last_tick = elapsed;
        self.metrics.total_ticks += 1;
        self.total_tick_time += elapsed;
        self.metrics.average_tick = self.total_tick_time / self.metrics.total_ticks as u32;

        if self.timing && self.metrics.total_ticks.is_multiple_of(100) {
            eprintln!(
                "[medusa-tick-timing] ticks={} last={:?} avg={:?} alpha={:.6} nodes={}",
                self.metrics.total_ticks,
                self.metrics.last_tick,
                self.metrics.average_tick,
                self.alpha,
                self.nodes.len(),
            );
        }
    }

    fn step_once(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;

        let alpha = self.alpha;
        for (_, force) in self.forces.iter_mut() {
            force.apply(&mut self.nodes, alpha, &mut *self.rng);
        }

        for n in self.nodes.iter_mut() {
            match n.fx {
                Some(fx) => {
                    n.x = fx;
                    n.vx = 0.0;
                }
                None => {
                    n.vx *= self.velocity_decay;
                    n.x += n.vx;
                }
            }
            match n.fy {
                Some(fy) => {
                    n.y = fy;
                    n.vy = 0.0;
                }
                None => {
                    n.vy *= self.velocity_decay;
                    n.y += n.vy;
                }
            }
        }
    }

    fn check_converged(&mut self) {
        if self.running && self.alpha < self.alpha_min {
            self.running = false;
            self.emit(EventKind::End);
        }
    }

    // ---- queries ---------------------------------------------------------

    /// Nearest node to `(x, y)`, optionally within `radius`. A linear scan
    /// over the arena; the simulation keeps no spatial index between steps.
    pub fn find(&self, x: f64, y: f64, radius: Option<f64>) -> Option<&SimNode> {
        let mut best: Option<&SimNode> = None;
        let mut best_d2 = match radius {
            Some(r) => r * r,
            None => f64::INFINITY,
        };
        for n in &self.nodes {
            let dx = x - n.x;
            let dy = y - n.y;
            let d2 = dx * dx + dy * dy;
            if d2 < best_d2 {
                best_d2 = d2;
                best = Some(n);
            }
        }
        best
    }

    pub fn metrics(&self) -> TickMetrics {
        self.metrics
    }

    // ---- events ----------------------------------------------------------

    /// Subscribe to tick events. Handlers receive the node arena as a
    /// read-only snapshot, valid for the duration of the call.
    pub fn on_tick(&mut self, handler: impl FnMut(&[SimNode]) + 'static) {
        self.tick_handlers.push(Box::new(handler));
    }

    /// Subscribe to the end event, fired once when a running simulation
    /// cools below `alpha_min`.
    pub fn on_end(&mut self, handler: impl FnMut(&[SimNode]) + 'static) {
        self.end_handlers.push(Box::new(handler));
    }

    fn emit(&mut self, kind: EventKind) {
        let handlers = match kind {
            EventKind::Tick => &mut self.tick_handlers,
            EventKind::End => &mut self.end_handlers,
        };
        if handlers.is_empty() {
            return;
        }
        let mut handlers = std::mem::take(handlers);
        for h in handlers.iter_mut() {
            h(&self.nodes);
        }
        match kind {
            EventKind::Tick => self.tick_handlers = handlers,
            EventKind::End => self.end_handlers = handlers,
        }
    }
}

#[derive(Clone, Copy)]
enum EventKind {
    Tick,
    End,
}

/// Continuously-tunable parameters clamp instead of rejecting; a NaN write
/// keeps the previous value.
fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}
