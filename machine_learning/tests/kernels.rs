use machine_learning::arch::{Backend, Buffer, Kernel, activations::ActFn};
use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng, rngs::StdRng};

const TRIALS: usize = 50;

fn random(rng: &mut StdRng, rows: usize, cols: usize) -> Array2<f32> {
    // Scaled up from the initialization range to exercise larger accumulations.
    let mut buf = Buffer::random(rows, cols, rng).unwrap();
    buf.scale_in_place(10.);
    buf.into_inner()
}

fn assert_close(reference: ArrayView2<f32>, optimized: ArrayView2<f32>) {
    assert_eq!(reference.dim(), optimized.dim());
    for (&r, &o) in reference.iter().zip(optimized.iter()) {
        assert!(
            (r - o).abs() <= 1e-4 * (1. + r.abs()),
            "reference {r} vs optimized {o}"
        );
    }
}

#[test]
fn backends_agree_on_every_product() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..TRIALS {
        let m = rng.random_range(1..40);
        let k = rng.random_range(1..40);
        let n = rng.random_range(1..40);

        let a = random(&mut rng, m, k);
        let b = random(&mut rng, k, n);
        let at = a.t().to_owned();
        let bt = b.t().to_owned();

        let mut r = Array2::zeros((m, n));
        let mut o = Array2::zeros((m, n));

        Backend::Reference.matmul(a.view(), b.view(), r.view_mut()).unwrap();
        Backend::Optimized.matmul(a.view(), b.view(), o.view_mut()).unwrap();
        assert_close(r.view(), o.view());

        Backend::Reference
            .matmul_transpose_left(at.view(), b.view(), r.view_mut())
            .unwrap();
        Backend::Optimized
            .matmul_transpose_left(at.view(), b.view(), o.view_mut())
            .unwrap();
        assert_close(r.view(), o.view());

        Backend::Reference
            .matmul_transpose_right(a.view(), bt.view(), r.view_mut())
            .unwrap();
        Backend::Optimized
            .matmul_transpose_right(a.view(), bt.view(), o.view_mut())
            .unwrap();
        assert_close(r.view(), o.view());

        // at: [k, m] as a batch of k samples, b: [k, n]
        let mut r = random(&mut rng, m, n);
        let mut o = r.clone();
        Backend::Reference
            .outer_product_accumulate(at.view(), b.view(), r.view_mut())
            .unwrap();
        Backend::Optimized
            .outer_product_accumulate(at.view(), b.view(), o.view_mut())
            .unwrap();
        assert_close(r.view(), o.view());

        let x = random(&mut rng, m, k);
        let mut r = a.clone();
        let mut o = a.clone();
        Backend::Reference.axpy(-0.5, x.view(), r.view_mut()).unwrap();
        Backend::Optimized.axpy(-0.5, x.view(), o.view_mut()).unwrap();
        assert_close(r.view(), o.view());

        let rn = Backend::Reference.frobenius_norm(a.view());
        let on = Backend::Optimized.frobenius_norm(a.view());
        assert!((rn - on).abs() <= 1e-4 * (1. + rn));
    }
}

#[test]
fn softmax_rows_are_distributions() {
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..TRIALS {
        let batch = rng.random_range(1..16);
        let width = rng.random_range(1..12);
        let scale: f32 = rng.random_range(1. ..500.);

        let z = random(&mut rng, batch, width) * scale;
        let mut a = Array2::zeros(z.dim());
        ActFn::softmax().apply(z.view(), a.view_mut()).unwrap();

        assert!(a.iter().all(|&x| (1e-7..=1. - 1e-7).contains(&x)));
        for row in a.rows() {
            assert!((row.sum() - 1.).abs() < 1e-5, "row sums to {}", row.sum());
        }
    }
}
