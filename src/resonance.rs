//! High-frequency resonance injection.
//!
//! Discrete integration attenuates fine detail. Once the trajectory has made enough progress we
//! estimate the clean signal \(\hat x_0 = x_{t+1} - d'\,\sigma_{t+1}\), isolate its high
//! frequencies as \(\hat x_0 - \mathrm{blur}(\hat x_0)\), and add a small multiple back.
//!
//! The low-pass is a 3×3 box mean over the last two axes, unit stride, zero padding of one,
//! divisor always 9 (padding counts toward the mean). Borders therefore pick up part of the
//! signal itself as "high frequency".

use crate::{Error, Result};
use ndarray::{
    Array2, Array3, ArrayD, ArrayView1, ArrayView2, ArrayViewD, ArrayViewMut1, ArrayViewMut2, Ix2,
};

/// Normalized trajectory progress `1 - σ/σ_max`.
///
/// A zero `σ_max` has no meaningful progress; it is reported as `0`.
pub fn progress(sigma: f32, sigma_max: f32) -> f32 {
    if sigma_max > 0.0 {
        1.0 - sigma / sigma_max
    } else {
        0.0
    }
}

/// Whether step `i` of `steps` injects resonance.
///
/// Requires `i < steps - 1` (never the final step) and progress strictly above `start`.
pub fn resonance_active(i: usize, steps: usize, sigma: f32, sigma_max: f32, start: f32) -> bool {
    i + 1 < steps && progress(sigma, sigma_max) > start
}

/// Injection strength at noise level `sigma`: `scale * (1 - σ/σ_max)`.
pub fn resonance_factor(sigma: f32, sigma_max: f32, scale: f32) -> f32 {
    scale * progress(sigma, sigma_max)
}

fn box_mean_3x3(src: &ArrayView2<'_, f32>, mut dst: ArrayViewMut2<'_, f32>) {
    let (h, w) = src.dim();
    for r in 0..h {
        let r0 = r.saturating_sub(1);
        let r1 = (r + 1).min(h - 1);
        for c in 0..w {
            let c0 = c.saturating_sub(1);
            let c1 = (c + 1).min(w - 1);
            let mut s = 0.0f32;
            for rr in r0..=r1 {
                for cc in c0..=c1 {
                    s += src[[rr, cc]];
                }
            }
            dst[[r, c]] = s / 9.0;
        }
    }
}

fn box_mean_3(src: &ArrayView1<'_, f32>, mut dst: ArrayViewMut1<'_, f32>) {
    let n = src.len();
    for i in 0..n {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(n - 1);
        let mut s = 0.0f32;
        for k in lo..=hi {
            s += src[k];
        }
        dst[i] = s / 3.0;
    }
}

/// Zero-padded box low-pass of a batched latent.
///
/// - rank ≥ 3: 3×3 mean over the last two axes, every leading index filtered independently
/// - rank 2 (`batch × features`): 3-tap mean along the feature axis
///
/// The output has the shape of the input.
pub fn box_blur(x: &ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
    match x.ndim() {
        0 | 1 => Err(Error::Shape("low-pass needs a batch axis and at least one more axis")),
        2 => {
            let x2 = x
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|_| Error::Shape("expected a rank-2 latent"))?;
            let mut out = Array2::<f32>::zeros(x2.raw_dim());
            for (src, dst) in x2.outer_iter().zip(out.outer_iter_mut()) {
                box_mean_3(&src, dst);
            }
            Ok(out.into_dyn())
        }
        nd => {
            let h = x.shape()[nd - 2];
            let w = x.shape()[nd - 1];
            let planes = x.len() / (h * w).max(1);
            let stacked = x
                .to_shape((planes, h, w))
                .map_err(|_| Error::Shape("latent cannot be viewed as a stack of planes"))?;

            let mut out = Array3::<f32>::zeros((planes, h, w));
            for (src, dst) in stacked.outer_iter().zip(out.outer_iter_mut()) {
                box_mean_3x3(&src, dst);
            }
            out.into_shape_with_order(x.shape())
                .map_err(|_| Error::Shape("low-pass output does not match the latent"))
        }
    }
}

/// Add `factor * (x0_est - blur(x0_est))` to `x_next`, where `x0_est = x_next - d_prime * σ_next`.
pub fn inject_resonance(
    x_next: &mut ArrayD<f32>,
    d_prime: &ArrayViewD<'_, f32>,
    sigma_next: f32,
    factor: f32,
) -> Result<()> {
    if d_prime.shape() != x_next.shape() {
        return Err(Error::Shape("derivative and state must share a shape"));
    }
    let mut x0_est = x_next.clone();
    x0_est.scaled_add(-sigma_next, d_prime);

    let blurred = box_blur(&x0_est.view())?;
    let high_freq = x0_est - &blurred;
    x_next.scaled_add(factor, &high_freq);
    Ok(())
}
