use ndarray::{Array2, ArrayView2, Zip};

use super::{LossFn, check_batch};
use crate::{MlErr, Result};

/// Categorical cross entropy, `-Σ y ln(y_pred)` averaged over the batch.
///
/// Predictions must be strictly positive, the softmax clamp guarantees it for its outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

fn check_positive(y_pred: &ArrayView2<f32>) -> Result<()> {
    if y_pred.iter().any(|&p| p <= 0. || p.is_nan()) {
        return Err(MlErr::DomainError("cross entropy of a non positive prediction"));
    }

    Ok(())
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let batch_size = check_batch(&y_pred, &y)?;
        check_positive(&y_pred)?;

        let sum = Zip::from(y_pred)
            .and(y)
            .fold(0.0f32, |acc, &p, &y| acc + y * p.ln());

        Ok(-sum / batch_size as f32)
    }

    /// Per-sample gradient `-y / y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_batch(&y_pred, &y)?;
        check_positive(&y_pred)?;

        Ok(Zip::from(y_pred).and(y).map_collect(|&p, &y| -y / p))
    }
}
