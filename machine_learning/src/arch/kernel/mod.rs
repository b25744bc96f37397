mod optimized;
mod reference;

pub use optimized::Optimized;
pub use reference::Reference;

use ndarray::{ArrayView2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, arch::buffer::check_same_shape};

/// The primitive dense operations every backend provides.
///
/// Every operation validates the shapes of its operands before touching them and returns
/// `ShapeMismatch` when they are not dimensionally compatible. The transposed variants
/// read their operand transposed in place, no transposed copy is materialized.
pub trait Kernel {
    /// `c = a · b`, with `a: [m, k]`, `b: [k, n]` and `c: [m, n]`.
    fn matmul(&self, a: ArrayView2<f32>, b: ArrayView2<f32>, c: ArrayViewMut2<f32>)
    -> Result<()>;

    /// `c = aᵗ · b`, with `a: [k, m]`, `b: [k, n]` and `c: [m, n]`.
    fn matmul_transpose_left(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        c: ArrayViewMut2<f32>,
    ) -> Result<()>;

    /// `c = a · bᵗ`, with `a: [m, k]`, `b: [n, k]` and `c: [m, n]`.
    fn matmul_transpose_right(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        c: ArrayViewMut2<f32>,
    ) -> Result<()>;

    /// `m += Σ_s x_sᵗ y_s` over the samples `s` of two batches, with `x: [batch, rows]`,
    /// `y: [batch, cols]` and `m: [rows, cols]`.
    fn outer_product_accumulate(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        m: ArrayViewMut2<f32>,
    ) -> Result<()>;

    /// `y += alpha * x`, shapes must match exactly.
    fn axpy(&self, alpha: f32, x: ArrayView2<f32>, y: ArrayViewMut2<f32>) -> Result<()>;

    /// `sqrt(Σ x_ij²)`.
    fn frobenius_norm(&self, x: ArrayView2<f32>) -> f32;
}

/// The kernel implementation a network computes with, selected once at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Explicit triple loops.
    Reference,
    /// Delegates to `ndarray`'s optimized matrix multiplication routines.
    #[default]
    Optimized,
}

impl Kernel for Backend {
    fn matmul(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        match self {
            Backend::Reference => Reference.matmul(a, b, c),
            Backend::Optimized => Optimized.matmul(a, b, c),
        }
    }

    fn matmul_transpose_left(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        match self {
            Backend::Reference => Reference.matmul_transpose_left(a, b, c),
            Backend::Optimized => Optimized.matmul_transpose_left(a, b, c),
        }
    }

    fn matmul_transpose_right(
        &self,
        a: ArrayView2<f32>,
        b: ArrayView2<f32>,
        c: ArrayViewMut2<f32>,
    ) -> Result<()> {
        match self {
            Backend::Reference => Reference.matmul_transpose_right(a, b, c),
            Backend::Optimized => Optimized.matmul_transpose_right(a, b, c),
        }
    }

    fn outer_product_accumulate(
        &self,
        x: ArrayView2<f32>,
        y: ArrayView2<f32>,
        m: ArrayViewMut2<f32>,
    ) -> Result<()> {
        match self {
            Backend::Reference => Reference.outer_product_accumulate(x, y, m),
            Backend::Optimized => Optimized.outer_product_accumulate(x, y, m),
        }
    }

    fn axpy(&self, alpha: f32, x: ArrayView2<f32>, y: ArrayViewMut2<f32>) -> Result<()> {
        match self {
            Backend::Reference => Reference.axpy(alpha, x, y),
            Backend::Optimized => Optimized.axpy(alpha, x, y),
        }
    }

    fn frobenius_norm(&self, x: ArrayView2<f32>) -> f32 {
        match self {
            Backend::Reference => Reference.frobenius_norm(x),
            Backend::Optimized => Optimized.frobenius_norm(x),
        }
    }
}

/// Checks `[m, k] · [k, n] -> [m, n]` given the already transposed operand shapes.
fn check_product(
    (m, k): (usize, usize),
    (k2, n): (usize, usize),
    out: (usize, usize),
) -> Result<()> {
    if k != k2 {
        return Err(MlErr::ShapeMismatch {
            what: "inner product dimension",
            got: k2,
            expected: k,
        });
    }

    check_same_shape("product output", (m, n), out)
}

fn transposed((rows, cols): (usize, usize)) -> (usize, usize) {
    (cols, rows)
}

fn check_matmul(a: &ArrayView2<f32>, b: &ArrayView2<f32>, c: (usize, usize)) -> Result<()> {
    check_product(a.dim(), b.dim(), c)
}

fn check_matmul_transpose_left(
    a: &ArrayView2<f32>,
    b: &ArrayView2<f32>,
    c: (usize, usize),
) -> Result<()> {
    check_product(transposed(a.dim()), b.dim(), c)
}

fn check_matmul_transpose_right(
    a: &ArrayView2<f32>,
    b: &ArrayView2<f32>,
    c: (usize, usize),
) -> Result<()> {
    check_product(a.dim(), transposed(b.dim()), c)
}

fn check_axpy(x: &ArrayView2<f32>, y: (usize, usize)) -> Result<()> {
    check_same_shape("axpy operands", y, x.dim())
}
