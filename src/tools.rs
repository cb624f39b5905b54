//! Particle distributions for tests and benchmarks.
use rand::{
    distributions::{Distribution, Uniform},
    rngs::StdRng,
    SeedableRng,
};

use crate::types::{real, RealScalar};

/// Uniformly distributed particles in `[min, max)^DIM`, `[0, 1)^DIM` if no bounds are given.
pub fn make_uniform_particle_array<T: RealScalar, const DIM: usize>(
    npoints: usize,
    min: Option<f64>,
    max: Option<f64>,
    seed: u64,
) -> Vec<[T; DIM]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let between = match (min, max) {
        (Some(min), Some(max)) => Uniform::from(min..max),
        _ => Uniform::from(0.0..1.0),
    };

    (0..npoints)
        .map(|_| std::array::from_fn(|_| real(between.sample(&mut rng))))
        .collect()
}

/// Particles whose coordinates are independent standard normal samples.
pub fn make_normal_particle_array<T: RealScalar, const DIM: usize>(
    npoints: usize,
    seed: u64,
) -> Vec<[T; DIM]> {
    let mut rng = StdRng::seed_from_u64(seed);
    // Box-Muller, 1 - u avoids the logarithm of zero
    let unit = Uniform::from(0.0f64..1.0);
    let mut normal = move || {
        let u1: f64 = 1.0 - unit.sample(&mut rng);
        let u2: f64 = unit.sample(&mut rng);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    };

    (0..npoints)
        .map(|_| std::array::from_fn(|_| real(normal())))
        .collect()
}
