/// Uniform random source consumed by the simulation for degenerate-geometry
/// jitter. Hosts and tests can swap the default generator via
/// [`Simulation::set_random_source`](crate::sim::Simulation::set_random_source).
pub trait RandomSource {
    /// Uniform sample in `[0, 1)`.
    fn next_f64(&mut self) -> f64;
}

/// xorshift64* with a 53-bit float mapping, so seeded runs reproduce exactly
/// across platforms. The upstream JS engines this engine is measured against
/// rely on `Math.random`; a small owned generator keeps layout baselines
/// deterministic without pulling in a rand stack.
#[derive(Debug, Clone)]
pub struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    /// Map to `[0, 1)` with 53 bits of precision.
    pub fn next_f64_unit(&mut self) -> f64 {
        let u = self.next_u64() >> 11;
        (u as f64) / ((1u64 << 53) as f64)
    }

    /// Map to `[-1, 1]` (exclusive).
    pub fn next_f64_signed(&mut self) -> f64 {
        (self.next_f64_unit() * 2.0) - 1.0
    }
}

impl Default for XorShift64Star {
    fn default() -> Self {
        Self::new(0)
    }
}

impl RandomSource for XorShift64Star {
    fn next_f64(&mut self) -> f64 {
        self.next_f64_unit()
    }
}

/// Small symmetric perturbation used wherever a zero-length separation would
/// otherwise divide by zero (coincident repulsion targets, zero-length links).
pub(crate) fn jiggle(rng: &mut dyn RandomSource) -> f64 {
    (rng.next_f64() - 0.5) * 1e-6
}
