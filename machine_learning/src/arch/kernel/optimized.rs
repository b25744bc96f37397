use ndarray::{ArrayView2, ArrayViewMut2, Zip, linalg::general_mat_mul};

use super::{
    Kernel, check_axpy, check_matmul, check_matmul_transpose_left, check_matmul_transpose_right,
};
use crate::Result;

/// Kernel backed by `ndarray`'s blocked matrix multiplication, elementwise work is spread
/// over the rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimized;

impl Kernel for Optimized {
    fn matmul(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        mut c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul(&a, &b, c.dim())?;
        general_mat_mul(1.0, &a, &b, 0.0, &mut c);
        Ok(())
    }

    fn matmul_transpose_left(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        mut c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul_transpose_left(&a, &b, c.dim())?;
        general_mat_mul(1.0, &a.t(), &b, 0.0, &mut c);
        Ok(())
    }

    fn matmul_transpose_right(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        mut c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul_transpose_right(&a, &b, c.dim())?;
        general_mat_mul(1.0, &a, &b.t(), 0.0, &mut c);
        Ok(())
    }

    fn outer_product_accumulate(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        mut m: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul_transpose_left(&x, &y, m.dim())?;
        general_mat_mul(1.0, &x.t(), &y, 1.0, &mut m);
        Ok(())
    }

    fn axpy(&self, alpha: f32, x: ArrayView2<f32>, y: ArrayViewMut2<f32>) -> Result<()> {
        check_axpy(&x, y.dim())?;
        Zip::from(y)
            .and(x)
            .par_for_each(|y, &x| *y += alpha * x);

        Ok(())
    }

    fn frobenius_norm(&self, x: ArrayView2<f32>) -> f32 {
        // Sequential fold, a parallel reduction would make the norm order dependent.
        x.fold(0.0f32, |acc, v| acc + v * v).sqrt()
    }
}
