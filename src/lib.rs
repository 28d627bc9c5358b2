//! # rrflow
//!
//! Reverse-time ODE sampling for rectified-flow style models, one fixed schedule at a time.
//!
//! The sampler ("relativistic resonant flow", RRF) walks a non-increasing noise schedule
//! \(\sigma_0 \ge \sigma_1 \ge \dots \ge \sigma_T\) and advances a batched latent state with a
//! curvature-corrected Euler step:
//!
//! 1. probe the model at the current state to get a derivative \(d_t\),
//! 2. probe again at the Euler-predicted point to get \(d_{t+1}\),
//! 3. split \(d_{t+1}\) into parts parallel/orthogonal to \(d_t\), damp the orthogonal part,
//! 4. average the two derivatives (Heun-style) and step,
//! 5. after a fraction of the trajectory, re-inject a scaled high-frequency residual of the
//!    clean-signal estimate.
//!
//! ## Public invariants (must not change)
//!
//! - **Deterministic**: no randomness inside the sampler. Same model, schedule, state and config
//!   produce bit-identical output. The only seeded randomness is [`latent::gaussian_latent`].
//! - **Constants are explicit**: every numeric knob lives in [`config::RrfConfig`].
//! - **Rank-agnostic**: latents are `ArrayD<f32>` with axis 0 = batch; per-sample reductions run
//!   over all remaining axes.
//! - **The model is a black box**: it is called through [`model::Denoiser`], twice per interior
//!   step, and its errors propagate unchanged.
//!
//! ## Module map
//!
//! - `config`: sampler configuration (`RrfConfig`)
//! - `model`: the `Denoiser` contract and the velocity probe
//! - `correct`: per-sample projection, tangential damping, corrected derivative
//! - `resonance`: high-frequency resonance injection (3×3 box low-pass)
//! - `observer`: per-step observation records
//! - `sampler`: the schedule walker (`sample_rrf`, `rrf_step`)
//! - `latent`: seeded Gaussian initial latents

pub mod config;
pub mod correct;
pub mod latent;
pub mod model;
pub mod observer;
pub mod resonance;
pub mod sampler;

/// rrflow error variants.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("shape mismatch: {0}")]
    Shape(&'static str),
    #[error("domain error: {0}")]
    Domain(&'static str),
    #[error("model failed: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary model-side failure.
    pub fn model(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Model(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub use config::RrfConfig;
pub use model::Denoiser;
pub use observer::{StepObserver, StepRecord, TrajectoryRecorder};
pub use sampler::{rrf_step, sample_rrf, sample_rrf_with_observer, StepOutcome};
