//! Seeded initial latents.

use crate::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Draw `x ~ N(0, sigma^2 I)` with the given shape (axis 0 = batch).
///
/// The same `(shape, sigma, seed)` always yields the same array. Pass `sigmas[0]` as `sigma` to
/// start a trajectory at the top of a schedule.
pub fn gaussian_latent(shape: &[usize], sigma: f32, seed: u64) -> Result<ArrayD<f32>> {
    if shape.len() < 2 {
        return Err(Error::Shape("latent shape needs a batch axis plus at least one more axis"));
    }
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(Error::Domain("sigma must be finite and nonnegative"));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok(ArrayD::from_shape_simple_fn(IxDyn(shape), || {
        let z: f32 = StandardNormal.sample(&mut rng);
        sigma * z
    }))
}
