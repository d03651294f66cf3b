use criterion::{criterion_group, criterion_main, Criterion};
use nki_rs_kernels::{direct_conv2d_maxpool, fused_conv2d_maxpool};
use rand::Rng;
use std::hint::black_box;

fn random_vec(len: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen::<f32>() - 0.5).collect()
}

fn allclose(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(&x, &y)| (x - y).abs() <= 1e-3 * (1.0 + x.abs().max(y.abs())))
}

fn benchmark_fused_conv(c: &mut Criterion) {
    let mut group = c.benchmark_group("fused_conv2d_maxpool");
    group.sample_size(10);

    let (in_channels, out_channels, filter) = (128, 128, 3);
    let sizes = [8, 14, 26];

    for &size in &sizes {
        let input_shape = [1, in_channels, size, size];
        let weight_shape = [out_channels, in_channels, filter, filter];
        let x = random_vec(in_channels * size * size);
        let w = random_vec(out_channels * in_channels * filter * filter);
        let bias = random_vec(out_channels);

        // Verify once against the direct reference before timing.
        let fused = fused_conv2d_maxpool(&x, &w, &bias, &input_shape, &weight_shape, 2).unwrap();
        let direct = direct_conv2d_maxpool(&x, &w, &bias, &input_shape, &weight_shape, 2).unwrap();
        assert!(allclose(&fused, &direct));

        for pool_size in [1usize, 2] {
            group.bench_function(format!("{}x{}_pool{}", size, size, pool_size), |b| {
                b.iter(|| {
                    fused_conv2d_maxpool(
                        black_box(&x),
                        black_box(&w),
                        black_box(&bias),
                        black_box(&input_shape),
                        black_box(&weight_shape),
                        black_box(pool_size),
                    )
                    .unwrap()
                })
            });
        }
    }
    group.finish();
}

criterion_group!(benches, benchmark_fused_conv);
criterion_main!(benches);
