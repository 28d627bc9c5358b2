//! Curvature correction with tangential damping.
//!
//! Given a predictor derivative \(d_t\) and a corrector derivative \(d_{t+1}\) (evaluated at the
//! Euler-predicted point), we split the corrector per sample:
//! \[
//! d_{t+1} = \underbrace{\frac{\langle d_{t+1}, d_t\rangle}{\max(\|d_t\|^2, \epsilon)} d_t}_{\parallel}
//!         + d_{t+1}^{\perp},
//! \]
//! scale \(d_{t+1}^{\perp}\) by \(k\), and average with \(d_t\).
//!
//! All reductions run over every non-batch axis, so the rank of the latent does not matter.

use ndarray::{Array1, ArrayD, ArrayViewD, Zip};

/// Per-sample inner product over all non-batch axes.
///
/// Accumulates in `f64`.
pub fn batch_dot(a: &ArrayViewD<'_, f32>, b: &ArrayViewD<'_, f32>) -> Array1<f32> {
    debug_assert_eq!(a.shape(), b.shape());
    a.outer_iter()
        .zip(b.outer_iter())
        .map(|(sa, sb)| {
            Zip::from(&sa)
                .and(&sb)
                .fold(0.0f64, |acc, &x, &y| acc + (x as f64) * (y as f64)) as f32
        })
        .collect()
}

/// Per-sample squared L2 norm, clamped below by `floor`.
pub fn batch_norm_sq(a: &ArrayViewD<'_, f32>, floor: f32) -> Array1<f32> {
    batch_dot(a, a).mapv(|v| v.max(floor))
}

/// Multiply each sample of `a` by its own scalar.
pub fn scale_per_sample(a: &ArrayViewD<'_, f32>, scale: &Array1<f32>) -> ArrayD<f32> {
    debug_assert_eq!(a.shape()[0], scale.len());
    let mut out = a.to_owned();
    for (mut sample, &k) in out.outer_iter_mut().zip(scale.iter()) {
        sample.mapv_inplace(|v| v * k);
    }
    out
}

/// `d_next` split relative to `d_curr`.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Per-sample projection coefficient `⟨d_next, d_curr⟩ / max(‖d_curr‖², floor)`.
    pub proj: Array1<f32>,
    pub parallel: ArrayD<f32>,
    pub orthogonal: ArrayD<f32>,
}

/// Decompose `d_next` into components parallel and orthogonal to `d_curr`.
///
/// If `d_curr` is (near) zero the clamp keeps `proj` finite and the parallel part vanishes, so
/// `orthogonal == d_next`.
pub fn decompose(
    d_curr: &ArrayViewD<'_, f32>,
    d_next: &ArrayViewD<'_, f32>,
    norm_floor: f32,
) -> Decomposition {
    let dot = batch_dot(d_curr, d_next);
    let norm_sq = batch_norm_sq(d_curr, norm_floor);
    let proj = &dot / &norm_sq;

    let parallel = scale_per_sample(d_curr, &proj);
    let orthogonal = d_next - &parallel;

    Decomposition {
        proj,
        parallel,
        orthogonal,
    }
}

/// Corrected derivative: `(d_curr + d_par + k * d_orth) / 2`.
pub fn damped_average(
    d_curr: &ArrayViewD<'_, f32>,
    d_next: &ArrayViewD<'_, f32>,
    damping: f32,
    norm_floor: f32,
) -> ArrayD<f32> {
    let Decomposition {
        parallel,
        orthogonal,
        ..
    } = decompose(d_curr, d_next, norm_floor);

    let mut corrected = parallel;
    corrected.scaled_add(damping, &orthogonal);

    let mut d_prime = d_curr + &corrected;
    d_prime.mapv_inplace(|v| v * 0.5);
    d_prime
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use proptest::prelude::*;

    fn norm(a: &ArrayViewD<'_, f32>) -> f32 {
        a.iter().map(|&v| v * v).sum::<f32>().sqrt()
    }

    #[test]
    fn reductions_are_per_sample_for_any_rank() {
        // batch of 2, each sample 2x2x2
        let a = ArrayD::from_shape_vec(
            IxDyn(&[2, 2, 2, 2]),
            (0..16).map(|v| v as f32).collect(),
        )
        .unwrap();
        let dot = batch_dot(&a.view(), &a.view());
        let expected0: f32 = (0..8).map(|v| (v * v) as f32).sum();
        let expected1: f32 = (8..16).map(|v| (v * v) as f32).sum();
        assert_eq!(dot.to_vec(), vec![expected0, expected1]);
    }

    #[test]
    fn zero_predictor_keeps_projection_finite() {
        let d_curr = ArrayD::<f32>::zeros(IxDyn(&[2, 3, 3]));
        let d_next = ArrayD::from_elem(IxDyn(&[2, 3, 3]), 1.5f32);
        let dec = decompose(&d_curr.view(), &d_next.view(), 1e-6);
        assert!(dec.proj.iter().all(|p| p.is_finite()));
        assert!(dec.parallel.iter().all(|&v| v == 0.0));
        assert_eq!(dec.orthogonal, d_next);
    }

    #[test]
    fn aligned_derivatives_are_untouched_by_damping() {
        let d_curr = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![1.0, -2.0, 0.5, 3.0]).unwrap();
        let d_next = d_curr.mapv(|v| 2.0 * v);
        let d_prime = damped_average(&d_curr.view(), &d_next.view(), 0.85, 1e-6);
        for (p, c) in d_prime.iter().zip(d_curr.iter()) {
            assert!((p - 1.5 * c).abs() < 1e-5, "p={p} c={c}");
        }
    }

    #[test]
    fn unit_damping_is_plain_heun_average() {
        let d_curr = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 0.0, 0.3, -0.7]).unwrap();
        let d_next = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![0.0, 1.0, 2.0, 0.1]).unwrap();
        let d_prime = damped_average(&d_curr.view(), &d_next.view(), 1.0, 1e-6);
        for ((p, c), n) in d_prime.iter().zip(d_curr.iter()).zip(d_next.iter()) {
            assert!((p - 0.5 * (c + n)).abs() < 1e-6);
        }
    }

    #[test]
    fn orthogonal_corrector_is_scaled_by_damping() {
        let d_curr = ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![1.0, 0.0]).unwrap();
        let d_next = ArrayD::from_shape_vec(IxDyn(&[1, 2]), vec![0.0, 1.0]).unwrap();
        let d_prime = damped_average(&d_curr.view(), &d_next.view(), 0.85, 1e-6);
        assert!((d_prime[[0, 0]] - 0.5).abs() < 1e-6);
        assert!((d_prime[[0, 1]] - 0.425).abs() < 1e-6);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_damping_never_amplifies_orthogonal_part(
            a in prop::collection::vec(-5.0f32..5.0f32, 12),
            b in prop::collection::vec(-5.0f32..5.0f32, 12),
            k in 0.0f32..=1.0f32,
        ) {
            let d_curr = ArrayD::from_shape_vec(IxDyn(&[3, 2, 2]), a).unwrap();
            let d_next = ArrayD::from_shape_vec(IxDyn(&[3, 2, 2]), b).unwrap();
            let dec = decompose(&d_curr.view(), &d_next.view(), 1e-6);

            for (orth, par) in dec.orthogonal.outer_iter().zip(dec.parallel.outer_iter()) {
                let damped = orth.mapv(|v| k * v);
                prop_assert!(norm(&damped.view()) <= norm(&orth) + 1e-6);
                prop_assert!(par.iter().all(|v| v.is_finite()));
            }
            // parallel + orthogonal reconstructs the corrector
            let recon = &dec.parallel + &dec.orthogonal;
            for (r, n) in recon.iter().zip(d_next.iter()) {
                prop_assert!((r - n).abs() <= 1e-4 * (1.0 + n.abs()));
            }
        }

        #[test]
        fn prop_orthogonal_part_is_orthogonal(
            a in prop::collection::vec(0.5f32..5.0f32, 8),
            b in prop::collection::vec(-5.0f32..5.0f32, 8),
        ) {
            let d_curr = ArrayD::from_shape_vec(IxDyn(&[2, 4]), a).unwrap();
            let d_next = ArrayD::from_shape_vec(IxDyn(&[2, 4]), b).unwrap();
            let dec = decompose(&d_curr.view(), &d_next.view(), 1e-6);
            let dot = batch_dot(&dec.orthogonal.view(), &d_curr.view());
            for r in dot.iter() {
                prop_assert!(r.abs() <= 1e-2, "residual dot {r}");
            }
        }
    }
}
