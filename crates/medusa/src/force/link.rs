use rustc_hash::FxHashMap;

use crate::sim::{RandomSource, SimNode, rng::jiggle};

/// One endpoint of a link: a node id, or a pre-resolved slot index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEnd {
    Id(String),
    Index(usize),
}

impl From<&str> for LinkEnd {
    fn from(id: &str) -> Self {
        LinkEnd::Id(id.to_string())
    }
}

impl From<String> for LinkEnd {
    fn from(id: String) -> Self {
        LinkEnd::Id(id)
    }
}

impl From<usize> for LinkEnd {
    fn from(index: usize) -> Self {
        LinkEnd::Index(index)
    }
}

/// A directed pairing of two endpoints. Per-link `distance`/`strength`
/// override the force-level defaults when set.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub source: LinkEnd,
    pub target: LinkEnd,
    pub distance: Option<f64>,
    pub strength: Option<f64>,
}

impl Link {
    pub fn new(source: impl Into<LinkEnd>, target: impl Into<LinkEnd>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            distance: None,
            strength: None,
        }
    }
}

/// A link whose endpoints have been mapped to live node slots for the
/// current node set. `bias` splits the spring displacement between the
/// endpoints by relative degree: nodes with more connections move less.
#[derive(Debug, Clone, Copy)]
struct ResolvedLink {
    source: usize,
    target: usize,
    distance: f64,
    strength: f64,
    bias: f64,
}

/// Spring force over resolved links. Links with a dangling endpoint are
/// dropped from the resolved set but retained in the raw list, so they come
/// back if the missing node appears in a later node set.
#[derive(Debug)]
pub struct LinkForce {
    links: Vec<Link>,
    /// Default rest length for links without their own `distance`.
    pub distance: f64,
    /// Default strength for links without their own. `None` keeps the
    /// degree-derived default `1 / min(deg(source), deg(target))`.
    pub strength: Option<f64>,
    /// Relaxation passes per tick.
    pub iterations: usize,
    resolved: Vec<ResolvedLink>,
    dirty: bool,
}

impl Default for LinkForce {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LinkForce {
    pub fn new(links: Vec<Link>) -> Self {
        Self {
            links,
            distance: 30.0,
            strength: None,
            iterations: 1,
            resolved: Vec::new(),
            dirty: true,
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Replace the link set. Resolution (including the degree bias) happens
    /// on the next application or force re-initialization; the bias is
    /// frozen until then.
    pub fn set_links(&mut self, links: Vec<Link>) {
        self.links = links;
        self.dirty = true;
    }

    /// Links that resolved against the current node set.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    pub(crate) fn initialize(&mut self, nodes: &[SimNode]) {
        self.resolve(nodes);
    }

    fn resolve(&mut self, nodes: &[SimNode]) {
        let by_id: FxHashMap<&str, usize> =
            nodes.iter().map(|n| (n.id.as_str(), n.index)).collect();
        let resolve_end = |end: &LinkEnd| -> Option<usize> {
            match end {
                LinkEnd::Id(id) => by_id.get(id.as_str()).copied(),
                LinkEnd::Index(i) if *i < nodes.len() => Some(*i),
                LinkEnd::Index(_) => None,
            }
        };

        let mut pairs: Vec<(usize, usize, usize)> = Vec::new();
        for (li, l) in self.links.iter().enumerate() {
            match (resolve_end(&l.source), resolve_end(&l.target)) {
                (Some(s), Some(t)) => pairs.push((li, s, t)),
                // Dangling endpoint: dropped from the resolved set only.
                _ => {}
            }
        }

        let mut degree = vec![0u32; nodes.len()];
        for &(_, s, t) in &pairs {
            degree[s] += 1;
            degree[t] += 1;
        }

        self.resolved = pairs
            .into_iter()
            .map(|(li, s, t)| {
                let l = &self.links[li];
                let ds = degree[s].max(1) as f64;
                let dt = degree[t].max(1) as f64;
                ResolvedLink {
                    source: s,
                    target: t,
                    distance: l.distance.unwrap_or(self.distance),
                    strength: l
                        .strength
                        .or(self.strength)
                        .unwrap_or_else(|| 1.0 / ds.min(dt)),
                    bias: ds / (ds + dt),
                }
            })
            .collect();
        self.dirty = false;
    }

    pub(crate) fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, rng: &mut dyn RandomSource) {
        if self.dirty {
            self.resolve(nodes);
        }
        for _ in 0..self.iterations.max(1) {
            for rl in &self.resolved {
                let (s, t) = (rl.source, rl.target);
                if s >= nodes.len() || t >= nodes.len() {
                    continue;
                }
                // Spring extension measured on projected positions so that
                // within-tick velocity changes from earlier links are seen.
                let mut dx = (nodes[t].x + nodes[t].vx) - (nodes[s].x + nodes[s].vx);
                let mut dy = (nodes[t].y + nodes[t].vy) - (nodes[s].y + nodes[s].vy);
                if dx == 0.0 {
                    dx = jiggle(rng);
                }
                if dy == 0.0 {
                    dy = jiggle(rng);
                }
                let l = (dx * dx + dy * dy).sqrt();
                let k = (l - rl.distance) / l * alpha * rl.strength;
                let fx = dx * k;
                let fy = dy * k;

                let b = rl.bias;
                if nodes[t].fx.is_none() {
                    nodes[t].vx -= fx * b;
                }
                if nodes[t].fy.is_none() {
                    nodes[t].vy -= fy * b;
                }
                let b = 1.0 - b;
                if nodes[s].fx.is_none() {
                    nodes[s].vx += fx * b;
                }
                if nodes[s].fy.is_none() {
                    nodes[s].vy += fy * b;
                }
            }
        }
    }
}
