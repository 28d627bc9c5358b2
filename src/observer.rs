//! Per-step observation records.
//!
//! The sampler emits exactly one [`StepRecord`] per completed step, in step order, after that
//! step's state update (including any resonance injection) is final.

use ndarray::ArrayD;

/// Snapshot emitted after step `i`.
///
/// The record is owned by the observer once emitted.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// State after the step.
    pub x: ArrayD<f32>,
    /// Step index, `0 <= i < T`.
    pub i: usize,
    /// Pre-step noise level `sigmas[i]`.
    pub sigma: f32,
    /// Alias of `sigma`, kept for callers that read the "hat" level.
    pub sigma_hat: f32,
    /// Predictor probe's clean-signal estimate at `(x_i, sigma)`.
    pub denoised: ArrayD<f32>,
}

/// Receives step records.
pub trait StepObserver {
    fn on_step(&mut self, record: StepRecord);
}

impl<F> StepObserver for F
where
    F: FnMut(StepRecord),
{
    fn on_step(&mut self, record: StepRecord) {
        self(record)
    }
}

/// Keeps every record, in emission order.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryRecorder {
    pub records: Vec<StepRecord>,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Noise levels seen, one per step.
    pub fn sigmas(&self) -> Vec<f32> {
        self.records.iter().map(|r| r.sigma).collect()
    }

    /// States after each step (the trajectory without the initial point).
    pub fn states(&self) -> impl Iterator<Item = &ArrayD<f32>> {
        self.records.iter().map(|r| &r.x)
    }
}

impl StepObserver for TrajectoryRecorder {
    fn on_step(&mut self, record: StepRecord) {
        self.records.push(record);
    }
}
