//! The RRF schedule walker.
//!
//! One step from \(\sigma_i\) to \(\sigma_{i+1}\), with \(\Delta = \sigma_{i+1} - \sigma_i\):
//!
//! - predictor: \(d = (x - D(x,\sigma_i)) / \sigma_i\)
//! - if \(\sigma_{i+1} > \epsilon\): corrector at \(x + d\Delta\), damped and averaged into \(d'\);
//!   otherwise \(d' = d\) (first-order terminal step)
//! - update: \(x \leftarrow x + d'\Delta\)
//! - resonance injection when the step is not the last and progress exceeds the start threshold
//!
//! Steps run strictly in schedule order; both probes of a step are issued in order.

use crate::config::RrfConfig;
use crate::correct::damped_average;
use crate::model::{probe_derivative, Denoiser, Probe};
use crate::observer::{StepObserver, StepRecord};
use crate::resonance::{inject_resonance, resonance_active, resonance_factor};
use crate::{Error, Result};
use ndarray::ArrayD;
use tracing::{debug, info_span};

/// Result of a single step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// State after the step.
    pub x: ArrayD<f32>,
    /// Predictor probe's clean-signal estimate.
    pub denoised: ArrayD<f32>,
    /// Whether the corrector probe ran (`sigma_next > probe_eps`).
    pub corrected: bool,
    /// Whether resonance was injected.
    pub resonance: bool,
}

fn check_schedule(sigmas: &[f32]) -> Result<()> {
    if sigmas.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(Error::Domain("sigmas must be finite and nonnegative"));
    }
    Ok(())
}

fn check_latent(x: &ArrayD<f32>) -> Result<()> {
    if x.ndim() < 2 {
        return Err(Error::Shape("latent must have a batch axis plus at least one more axis"));
    }
    if x.shape()[0] == 0 {
        return Err(Error::Shape("latent batch must be non-empty"));
    }
    Ok(())
}

fn step<A, D>(
    model: &mut D,
    x: &ArrayD<f32>,
    i: usize,
    sigmas: &[f32],
    extra: &A,
    cfg: &RrfConfig,
) -> Result<StepOutcome>
where
    A: ?Sized,
    D: Denoiser<A> + ?Sized,
{
    let steps = sigmas.len() - 1;
    let sigma_max = sigmas[0];
    let sigma_curr = sigmas[i];
    let sigma_next = sigmas[i + 1];
    let dt = sigma_next - sigma_curr;

    let Probe {
        denoised,
        derivative: d_curr,
    } = probe_derivative(model, &x.view(), sigma_curr, extra, cfg.probe_eps)?;

    let corrected = sigma_next > cfg.probe_eps;
    let d_prime = if corrected {
        let mut x_pred = x.clone();
        x_pred.scaled_add(dt, &d_curr);
        let next = probe_derivative(model, &x_pred.view(), sigma_next, extra, cfg.probe_eps)?;
        damped_average(
            &d_curr.view(),
            &next.derivative.view(),
            cfg.damping,
            cfg.norm_floor,
        )
    } else {
        d_curr
    };

    let mut x_next = x.clone();
    x_next.scaled_add(dt, &d_prime);

    let resonance = resonance_active(i, steps, sigma_curr, sigma_max, cfg.resonance_start);
    if resonance {
        let factor = resonance_factor(sigma_curr, sigma_max, cfg.resonance_scale);
        inject_resonance(&mut x_next, &d_prime.view(), sigma_next, factor)?;
    }

    Ok(StepOutcome {
        x: x_next,
        denoised,
        corrected,
        resonance,
    })
}

/// Run step `i` of the schedule on `x` without touching any other state.
///
/// Useful for callers driving their own loop. `i` must satisfy `i + 1 < sigmas.len()`.
pub fn rrf_step<A, D>(
    model: &mut D,
    x: &ArrayD<f32>,
    i: usize,
    sigmas: &[f32],
    extra: &A,
    cfg: &RrfConfig,
) -> Result<StepOutcome>
where
    A: ?Sized,
    D: Denoiser<A> + ?Sized,
{
    cfg.validate()?;
    check_schedule(sigmas)?;
    check_latent(x)?;
    if i + 1 >= sigmas.len() {
        return Err(Error::Domain("step index outside the schedule"));
    }
    step(model, x, i, sigmas, extra, cfg)
}

/// Integrate `x` over the whole schedule and return the final state.
///
/// `sigmas` has length `T + 1`; fewer than two entries means zero steps and `x` is returned as is.
pub fn sample_rrf<A, D>(
    model: &mut D,
    x: ArrayD<f32>,
    sigmas: &[f32],
    extra: &A,
    cfg: &RrfConfig,
) -> Result<ArrayD<f32>>
where
    A: ?Sized,
    D: Denoiser<A> + ?Sized,
{
    sample_rrf_with_observer(model, x, sigmas, extra, cfg, None)
}

/// Like [`sample_rrf`], but emits one [`StepRecord`] per step to `observer`.
pub fn sample_rrf_with_observer<A, D>(
    model: &mut D,
    x: ArrayD<f32>,
    sigmas: &[f32],
    extra: &A,
    cfg: &RrfConfig,
    mut observer: Option<&mut dyn StepObserver>,
) -> Result<ArrayD<f32>>
where
    A: ?Sized,
    D: Denoiser<A> + ?Sized,
{
    cfg.validate()?;
    check_schedule(sigmas)?;

    let steps = sigmas.len().saturating_sub(1);
    if steps == 0 {
        return Ok(x);
    }
    check_latent(&x)?;

    let batch = x.shape()[0];
    let _scope = info_span!("rrf_sample", steps, batch).entered();

    let mut x = x;
    for i in 0..steps {
        let out = step(model, &x, i, sigmas, extra, cfg)?;
        if !cfg.quiet {
            debug!(
                step = i,
                sigma = sigmas[i],
                sigma_next = sigmas[i + 1],
                corrected = out.corrected,
                resonance = out.resonance,
                "rrf step"
            );
        }

        x = out.x;
        if let Some(obs) = observer.as_mut() {
            obs.on_step(StepRecord {
                x: x.clone(),
                i,
                sigma: sigmas[i],
                sigma_hat: sigmas[i],
                denoised: out.denoised,
            });
        }
    }

    Ok(x)
}
