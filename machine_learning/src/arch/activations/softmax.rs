use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Zip};

use crate::{MlErr, Result, arch::buffer::check_same_shape};

/// Lower clamp of every softmax output, keeps `ln` away from zero downstream.
pub const SOFTMAX_MIN: f32 = 1e-7;
/// Upper clamp of every softmax output.
pub const SOFTMAX_MAX: f32 = 1. - 1e-7;

/// Per-sample normalized exponential.
///
/// Unlike the other activations its derivative is not elementwise: every sample `s` has its
/// own Jacobian `diag(s) - s sᵗ`. There is deliberately no elementwise `df`, use
/// [`Softmax::jacobian_vector_product`] to move an upstream gradient through it.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Softmax;

impl Softmax {
    pub fn new() -> Self {
        Self
    }

    /// Applies the softmax to every row of `z` independently, writing into `a`.
    pub fn apply(&self, z: ArrayView2<f32>, mut a: ArrayViewMut2<f32>) -> Result<()> {
        check_same_shape("softmax output", z.dim(), a.dim())?;

        Zip::from(z.rows())
            .and(a.rows_mut())
            .for_each(|z, a| Self::apply_row(z, a));

        Ok(())
    }

    fn apply_row(z: ArrayView1<f32>, mut a: ArrayViewMut1<f32>) {
        let max = z.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
        Zip::from(a.view_mut()).and(z).for_each(|a, &z| *a = (z - max).exp());

        let sum = a.sum();
        a.mapv_inplace(|x| (x / sum).clamp(SOFTMAX_MIN, SOFTMAX_MAX));
    }

    /// The Jacobian of the softmax at the sample output `s`, `diag(s) - s sᵗ`.
    pub fn jacobian(&self, s: ArrayView1<f32>) -> Array2<f32> {
        let n = s.len();
        Array2::from_shape_fn((n, n), |(i, j)| {
            let diag = if i == j { s[i] } else { 0. };
            diag - s[i] * s[j]
        })
    }

    /// Moves the upstream gradient `u` of every sample through that sample's Jacobian.
    ///
    /// The Jacobian is symmetric, so `out_i = s_i u_i - s_i (s · u)` for every row, without
    /// building the `n x n` matrix.
    ///
    /// # Arguments
    /// * `s` - The softmax outputs, one sample per row.
    /// * `u` - The upstream gradients, same shape as `s`.
    /// * `out` - Where the per-sample products are written.
    pub fn jacobian_vector_product(
        &self,
        s: ArrayView2<f32>,
        u: ArrayView2<f32>,
        mut out: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_same_shape("softmax upstream gradient", s.dim(), u.dim())?;
        check_same_shape("softmax jacobian product", s.dim(), out.dim())?;

        Zip::from(s.rows())
            .and(u.rows())
            .and(out.rows_mut())
            .for_each(|s, u, mut out| {
                let dot = s.dot(&u);
                Zip::from(out.view_mut())
                    .and(s)
                    .and(u)
                    .for_each(|o, &s, &u| *o = s * u - s * dot);
            });

        Ok(())
    }

    /// The elementwise derivative does not exist for the softmax.
    pub fn gradient(&self) -> Result<()> {
        Err(MlErr::NotImplemented(
            "elementwise softmax gradient, use the per-sample jacobian",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_are_normalized_and_clamped() {
        let z = array![[1000., 0., -1000.], [1., 2., 3.], [0., 0., 0.]];
        let mut a = Array2::zeros(z.dim());
        Softmax.apply(z.view(), a.view_mut()).unwrap();

        assert!(a.iter().all(|&x| (SOFTMAX_MIN..=SOFTMAX_MAX).contains(&x)));
        for row in a.rows() {
            assert!((row.sum() - 1.).abs() < 1e-5);
        }
        assert!((a[(2, 0)] - 1. / 3.).abs() < 1e-6);
    }

    #[test]
    fn jacobian_product_matches_the_explicit_jacobian() {
        let z = array![[0.5, -1., 2.], [0., 0.1, 0.2]];
        let u = array![[1., 2., 3.], [-1., 0., 1.]];
        let mut s = Array2::zeros(z.dim());
        Softmax.apply(z.view(), s.view_mut()).unwrap();

        let mut out = Array2::zeros(z.dim());
        Softmax
            .jacobian_vector_product(s.view(), u.view(), out.view_mut())
            .unwrap();

        for i in 0..2 {
            let expected = Softmax.jacobian(s.row(i)).dot(&u.row(i));
            for j in 0..3 {
                assert!((out[(i, j)] - expected[j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn elementwise_gradient_is_not_implemented() {
        assert!(matches!(Softmax.gradient(), Err(MlErr::NotImplemented(_))));
    }
}
