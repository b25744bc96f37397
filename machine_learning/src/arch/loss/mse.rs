use ndarray::{Array2, ArrayView2};

use super::{LossFn, check_batch};
use crate::Result;

/// Mean squared error loss function, summed over the item and averaged over the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Mse;

impl Mse {
    /// Returns a new `Mse`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let batch_size = check_batch(&y_pred, &y)?;
        let sum: f32 = (&y - &y_pred).mapv(|x| x.powi(2)).sum();

        Ok(sum / batch_size as f32)
    }

    /// Per-sample gradient `2 (y_pred - y)`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_batch(&y_pred, &y)?;
        Ok((&y_pred - &y) * 2.)
    }
}
