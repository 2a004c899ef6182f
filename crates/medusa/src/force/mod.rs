//! Composable forces applied by the simulation each tick, in registration
//! order. Every force reads and writes node velocities (the centering force
//! adjusts positions directly) scaled by the current alpha, and skips writes
//! on pinned axes.

use crate::sim::{RandomSource, SimNode};

pub mod center;
pub mod collide;
pub mod link;
pub mod many_body;
pub mod position;

pub use center::CenterForce;
pub use collide::CollideForce;
pub use link::{Link, LinkEnd, LinkForce};
pub use many_body::ManyBodyForce;
pub use position::{Axis, PositionForce, RadialForce};

/// A registered force. Forces that cache per-node or per-link derived state
/// (resolved links, radii, charges) rebuild it in `initialize`, which the
/// simulation invokes whenever the node array identity changes.
#[derive(Debug)]
pub enum Force {
    Center(CenterForce),
    Link(LinkForce),
    ManyBody(ManyBodyForce),
    Collide(CollideForce),
    Position(PositionForce),
    Radial(RadialForce),
}

impl Force {
    pub(crate) fn initialize(&mut self, nodes: &[SimNode]) {
        match self {
            Force::Link(f) => f.initialize(nodes),
            Force::ManyBody(f) => f.initialize(nodes),
            Force::Collide(f) => f.initialize(nodes),
            Force::Center(_) | Force::Position(_) | Force::Radial(_) => {}
        }
    }

    pub(crate) fn apply(&mut self, nodes: &mut [SimNode], alpha: f64, rng: &mut dyn RandomSource) {
        match self {
            Force::Center(f) => f.apply(nodes, alpha),
            Force::Link(f) => f.apply(nodes, alpha, rng),
            Force::ManyBody(f) => f.apply(nodes, alpha, rng),
            Force::Collide(f) => f.apply(nodes, rng),
            Force::Position(f) => f.apply(nodes, alpha),
            Force::Radial(f) => f.apply(nodes, alpha),
        }
    }
}
