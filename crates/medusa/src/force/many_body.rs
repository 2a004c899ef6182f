use std::fmt;

use crate::quadtree::{QuadNode, Quadtree};
use crate::sim::{RandomSource, SimNode, rng::jiggle};

/// Per-arena-slot Barnes-Hut aggregate: total charge, mass-weighted
/// centroid, and total mass of the subtree. Rebuilt bottom-up once per
/// application; never maintained incrementally.
#[derive(Debug, Clone, Copy, Default)]
struct Summary {
    /// Σ mass × strength over the subtree. Negative repels.
    value: f64,
    x: f64,
    y: f64,
    /// Σ mass over the subtree.
    weight: f64,
}

/// Approximates the all-pairs charge force in O(n log n).
///
/// Each application builds a fresh quadtree over current positions,
/// aggregates subtree summaries post-order, then walks the tree per node:
/// a quadrant whose side-to-distance ratio falls below `theta` is applied
/// as a single body at its centroid and its children are skipped.
pub struct ManyBodyForce {
    /// Uniform charge strength; negative repels, positive attracts.
    /// Ignored for nodes covered by a per-node strength function.
    pub strength: f64,
    /// Accuracy/performance trade-off in `(0, 1]`; smaller is more
    /// accurate and slower.
    pub theta: f64,
    /// Lower distance clamp, guarding the singularity at zero separation.
    pub distance_min: f64,
    /// Influence cutoff for far bodies.
    pub distance_max: f64,
    strength_fn: Option<Box<dyn Fn(&SimNode) -> f64>>,
    /// Per-node `mass × strength`, cached at initialization.
    charges: Vec<f64>,
    masses: Vec<f64>,
    visited: usize,
}

impl Default for ManyBodyForce {
    fn default() -> Self {
        Self {
            strength: -30.0,
            theta: 0.9,
            distance_min: 1.0,
            distance_max: f64::INFINITY,
            strength_fn: None,
            charges: Vec::new(),
            masses: Vec::new(),
            visited: 0,
        }
    }
}

impl fmt::Debug for ManyBodyForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyBodyForce")
            .field("strength", &self.strength)
            .field("theta", &self.theta)
            .field("distance_min", &self.distance_min)
            .field("distance_max", &self.distance_max)
            .field("strength_fn", &self.strength_fn.is_some())
            .finish()
    }
}

impl ManyBodyForce {
    pub fn with_strength(strength: f64) -> Self {
        Self {
            strength,
            ..Self::default()
        }
    }

    /// Per-node strength override, evaluated once per force
    /// initialization.
    pub fn set_strength_fn(&mut self, f: impl Fn(&SimNode) -> f64 + 'static) {
        self.strength_fn = Some(Box::new(f));
    }

    /// Tree nodes touched by the last application, across all targets.
    /// Instrumentation for the O(n log n) claim.
    pub fn last_visit_count(&self) -> usize {
        self.visited
    }

    pub(crate) fn initialize(&mut self, nodes: &[SimNode]) {
        self.charges = nodes
            .iter()
            .map(|n| {
                let s = match &self.strength_fn {
                    Some(f) => f(n),
                    None => self.strength,
                };
                n.mass * s
            })
            .collect();
        self.masses = nodes.iter().map(|n| n.mass).collect();
    }

    pub(crate) fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, rng: &mut dyn RandomSource) {
        if nodes.is_empty() {
            self.visited = 0;
            return;
        }
        if self.charges.len() != nodes.len() {
            self.initialize(nodes);
        }

        let mut tree = Quadtree::new();
        tree.insert_all(nodes.iter().map(|n| (n.x, n.y, n.index)));

        let charges = &self.charges;
        let masses = &self.masses;

        // Bottom-up aggregation into a parallel per-slot vector.
        let mut summaries = vec![Summary::default(); tree.slot_count()];
        tree.visit_after(|idx, node, _| {
            let s = match *node {
                QuadNode::Leaf { x, y, .. } => {
                    let mut value = 0.0;
                    let mut weight = 0.0;
                    let mut cur = Some(idx);
                    while let Some(c) = cur {
                        match *tree.node(c) {
                            QuadNode::Leaf { index, next, .. } => {
                                value += charges.get(index).copied().unwrap_or(0.0);
                                weight += masses.get(index).copied().unwrap_or(1.0);
                                cur = next;
                            }
                            QuadNode::Internal { .. } => break,
                        }
                    }
                    Summary {
                        value,
                        x,
                        y,
                        weight,
                    }
                }
                QuadNode::Internal { children } => {
                    let mut value = 0.0;
                    let mut weight = 0.0;
                    let mut sx = 0.0;
                    let mut sy = 0.0;
                    for c in children.into_iter().flatten() {
                        let cs = summaries[c as usize];
                        value += cs.value;
                        weight += cs.weight;
                        sx += cs.weight * cs.x;
                        sy += cs.weight * cs.y;
                    }
                    if weight > 0.0 {
                        Summary {
                            value,
                            x: sx / weight,
                            y: sy / weight,
                            weight,
                        }
                    } else {
                        Summary::default()
                    }
                }
            };
            summaries[idx as usize] = s;
        });

        let theta2 = self.theta.clamp(0.0, 1.0).powi(2);
        let distance_min2 = self.distance_min.max(0.0).powi(2);
        let distance_max2 = self.distance_max.powi(2);

        let mut visited = 0usize;
        for ti in 0..nodes.len() {
            let tx = nodes[ti].x;
            let ty = nodes[ti].y;
            if !(tx.is_finite() && ty.is_finite()) {
                continue;
            }
            let mut dvx = 0.0;
            let mut dvy = 0.0;
            tree.visit(|idx, qn, quad| {
                visited += 1;
                let s = summaries[idx as usize];
                if s.value == 0.0 {
                    return true;
                }
                let mut dx = s.x - tx;
                let mut dy = s.y - ty;
                let w = quad.side();
                let mut l = dx * dx + dy * dy;

                // Compression: a quadrant far enough away acts as a single
                // body at its centroid, and its children are skipped.
                if w * w < theta2 * l {
                    if l < distance_max2 {
                        if dx == 0.0 {
                            dx = jiggle(rng);
                            l += dx * dx;
                        }
                        if dy == 0.0 {
                            dy = jiggle(rng);
                            l += dy * dy;
                        }
                        if l < distance_min2 {
                            l = (distance_min2 * l).sqrt();
                        }
                        dvx += dx * s.value * alpha / l;
                        dvy += dy * s.value * alpha / l;
                    }
                    return true;
                }

                match *qn {
                    QuadNode::Internal { .. } => false,
                    QuadNode::Leaf { next, index, .. } => {
                        if l >= distance_max2 {
                            return true;
                        }
                        // The node's own leaf contributes no self-force; a
                        // shared leaf (coincident chain) still needs the
                        // degenerate-distance guards.
                        if index != ti || next.is_some() {
                            if dx == 0.0 {
                                dx = jiggle(rng);
                                l += dx * dx;
                            }
                            if dy == 0.0 {
                                dy = jiggle(rng);
                                l += dy * dy;
                            }
                            if l < distance_min2 {
                                l = (distance_min2 * l).sqrt();
                            }
                        }
                        let mut cur = Some(idx);
                        while let Some(c) = cur {
                            match *tree.node(c) {
                                QuadNode::Leaf { index, next, .. } => {
                                    if index != ti {
                                        let k =
                                            charges.get(index).copied().unwrap_or(0.0) * alpha / l;
                                        dvx += dx * k;
                                        dvy += dy * k;
                                    }
                                    cur = next;
                                }
                                QuadNode::Internal { .. } => break,
                            }
                        }
                        true
                    }
                }
            });
            let n = &mut nodes[ti];
            if n.fx.is_none() {
                n.vx += dvx;
            }
            if n.fy.is_none() {
                n.vy += dvy;
            }
        }
        self.visited = visited;
    }
}
