//! The model contract and the velocity probe.
//!
//! A model here is any denoiser \(D(x, \sigma)\) that predicts the clean signal from a noisy
//! state. For rectified flow the velocity in \(\sigma\) is recovered as
//! \[
//! d = \frac{x - D(x,\sigma)}{\sigma}.
//! \]

use crate::{Error, Result};
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD};

/// A black-box denoiser.
///
/// - `x`: batched state (axis 0 = batch)
/// - `sigma`: per-sample noise levels, `sigma.len() == x.shape()[0]`
/// - `extra`: caller-owned arguments, forwarded verbatim on every call
///
/// The returned array must have exactly the shape of `x`.
pub trait Denoiser<A: ?Sized = ()> {
    fn denoise(
        &mut self,
        x: &ArrayViewD<'_, f32>,
        sigma: &ArrayView1<'_, f32>,
        extra: &A,
    ) -> Result<ArrayD<f32>>;
}

impl<A, F> Denoiser<A> for F
where
    A: ?Sized,
    F: FnMut(&ArrayViewD<'_, f32>, &ArrayView1<'_, f32>, &A) -> Result<ArrayD<f32>>,
{
    fn denoise(
        &mut self,
        x: &ArrayViewD<'_, f32>,
        sigma: &ArrayView1<'_, f32>,
        extra: &A,
    ) -> Result<ArrayD<f32>> {
        self(x, sigma, extra)
    }
}

/// Output of one model probe.
#[derive(Debug, Clone)]
pub struct Probe {
    /// The model's clean-signal estimate at the probed point.
    pub denoised: ArrayD<f32>,
    /// Derivative of the state w.r.t. the noise level.
    pub derivative: ArrayD<f32>,
}

/// Query `model` at `(x, sigma)` and turn its prediction into a derivative.
///
/// `d = (x - denoised) / sigma` when `sigma > eps`, else `d = x - denoised`.
pub fn probe_derivative<A, D>(
    model: &mut D,
    x: &ArrayViewD<'_, f32>,
    sigma: f32,
    extra: &A,
    eps: f32,
) -> Result<Probe>
where
    A: ?Sized,
    D: Denoiser<A> + ?Sized,
{
    let batch = x.shape().first().copied().unwrap_or(0);
    let s_in = Array1::from_elem(batch, sigma);

    let denoised = model.denoise(x, &s_in.view(), extra)?;
    if denoised.shape() != x.shape() {
        return Err(Error::Shape("model output shape must match the state"));
    }

    let mut derivative = x - &denoised;
    if sigma > eps {
        derivative.mapv_inplace(|v| v / sigma);
    }

    Ok(Probe {
        denoised,
        derivative,
    })
}
