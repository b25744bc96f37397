use ndarray::{ArrayView2, ArrayViewMut2};

use super::{
    Kernel, check_axpy, check_matmul, check_matmul_transpose_left, check_matmul_transpose_right,
};
use crate::Result;

/// Naive triple loop kernel, the ground truth the optimized backend is checked against.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reference;

impl Kernel for Reference {
    fn matmul(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        mut c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul(&a, &b, c.dim())?;

        let (m, k) = a.dim();
        let n = b.ncols();
        for i in 0..m {
            for j in 0..n {
                let mut acc = 0.0;
                for p in 0..k {
                    acc += a[(i, p)] * b[(p, j)];
                }
                c[(i, j)] = acc;
            }
        }

        Ok(())
    }

    fn matmul_transpose_left(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        mut c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul_transpose_left(&a, &b, c.dim())?;

        let (k, m) = a.dim();
        let n = b.ncols();
        for i in 0..m {
            for j in 0..n {
                let mut acc = 0.0;
                for p in 0..k {
                    acc += a[(p, i)] * b[(p, j)];
                }
                c[(i, j)] = acc;
            }
        }

        Ok(())
    }

    fn matmul_transpose_right(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        mut c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul_transpose_right(&a, &b, c.dim())?;

        let (m, k) = a.dim();
        let n = b.nrows();
        for i in 0..m {
            for j in 0..n {
                let mut acc = 0.0;
                for p in 0..k {
                    acc += a[(i, p)] * b[(j, p)];
                }
                c[(i, j)] = acc;
            }
        }

        Ok(())
    }

    fn outer_product_accumulate(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        mut m: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_matmul_transpose_left(&x, &y, m.dim())?;

        let (batch, rows) = x.dim();
        let cols = y.ncols();
        for s in 0..batch {
            for i in 0..rows {
                let xi = x[(s, i)];
                for j in 0..cols {
                    m[(i, j)] += xi * y[(s, j)];
                }
            }
        }

        Ok(())
    }

    fn axpy(&self, alpha: f32, x: ArrayView2<f32>, mut y: ArrayViewMut2<f32>) -> Result<()> {
        check_axpy(&x, y.dim())?;

        let (rows, cols) = x.dim();
        for i in 0..rows {
            for j in 0..cols {
                y[(i, j)] += alpha * x[(i, j)];
            }
        }

        Ok(())
    }

    fn frobenius_norm(&self, x: ArrayView2<f32>) -> f32 {
        let mut acc = 0.0f32;
        for v in x.iter() {
            acc += v * v;
        }

        acc.sqrt()
    }
}
