use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{ArrayD, ArrayView1, ArrayViewD};

use rrflow::latent::gaussian_latent;
use rrflow::{sample_rrf, Result, RrfConfig};

fn shrink(x: &ArrayViewD<'_, f32>, sigma: &ArrayView1<'_, f32>, _extra: &()) -> Result<ArrayD<f32>> {
    let mut out = x.to_owned();
    for (mut sample, &s) in out.outer_iter_mut().zip(sigma.iter()) {
        sample.mapv_inplace(|v| v / (1.0 + s * s));
    }
    Ok(out)
}

fn schedule(steps: usize) -> Vec<f32> {
    (0..=steps)
        .map(|k| 1.0 - k as f32 / steps as f32)
        .collect()
}

fn bench_sampler(c: &mut Criterion) {
    let mut group = c.benchmark_group("rrf_sample");
    group.sample_size(20);

    let cfg = RrfConfig {
        quiet: true,
        ..RrfConfig::default()
    };

    for &(side, steps) in &[(16usize, 10usize), (32, 10), (32, 30), (64, 10)] {
        let x = gaussian_latent(&[2, 4, side, side], 1.0, 123).unwrap();
        let sigmas = schedule(steps);

        group.bench_with_input(
            BenchmarkId::new("full_pass", format!("s{side}_t{steps}")),
            &(side, steps),
            |b, _| {
                b.iter(|| {
                    let mut model = shrink;
                    sample_rrf(&mut model, black_box(x.clone()), &sigmas, &(), &cfg).unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sampler);
criterion_main!(benches);
