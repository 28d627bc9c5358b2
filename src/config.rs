//! Sampler configuration.

use crate::{Error, Result};

/// Configuration for the RRF sampler.
///
/// Defaults reproduce the reference constants: damping `0.85`, resonance start `0.2`,
/// resonance scale `0.05`, probe epsilon `1e-4`, norm floor `1e-6`.
#[derive(Debug, Clone)]
pub struct RrfConfig {
    /// Scale `k ∈ [0, 1]` applied to the orthogonal part of the corrector derivative.
    ///
    /// `1.0` disables damping (plain Heun); `0.0` keeps only the parallel part.
    pub damping: f32,
    /// Normalized progress `1 - σ/σ_max` that must be exceeded before resonance injection.
    pub resonance_start: f32,
    /// Peak resonance strength; the per-step factor is `resonance_scale * progress`.
    ///
    /// `0.0` turns injection into a no-op.
    pub resonance_scale: f32,
    /// Noise levels at or below this are treated as terminal (no division, no corrector).
    pub probe_eps: f32,
    /// Lower clamp on `‖d_curr‖²` in the projection.
    pub norm_floor: f32,
    /// Suppress per-step progress events. Never changes the result.
    pub quiet: bool,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            resonance_start: 0.2,
            resonance_scale: 0.05,
            probe_eps: 1e-4,
            norm_floor: 1e-6,
            quiet: false,
        }
    }
}

impl RrfConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.damping.is_finite() || !(0.0..=1.0).contains(&self.damping) {
            return Err(Error::Domain("damping must be in [0, 1]"));
        }
        if !self.resonance_start.is_finite() || self.resonance_start < 0.0 {
            return Err(Error::Domain("resonance_start must be finite and nonnegative"));
        }
        if !self.resonance_scale.is_finite() || self.resonance_scale < 0.0 {
            return Err(Error::Domain("resonance_scale must be finite and nonnegative"));
        }
        if !self.probe_eps.is_finite() || self.probe_eps <= 0.0 {
            return Err(Error::Domain("probe_eps must be positive and finite"));
        }
        if !self.norm_floor.is_finite() || self.norm_floor <= 0.0 {
            return Err(Error::Domain("norm_floor must be positive and finite"));
        }
        Ok(())
    }
}
