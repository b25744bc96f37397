use ndarray::{Array2, ArrayView2, ArrayViewMut2, Zip};

use super::{CrossEntropy, Mse};
use crate::{
    MlErr, Result,
    arch::{activations::ActFn, buffer::check_same_shape},
};

pub trait LossFn {
    /// The batch loss, the per-sample loss averaged over the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32>;

    /// The derivative of every sample's loss with respect to its prediction.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>>;
}

/// Checks that both batches agree and are not empty, returning the batch size.
pub(super) fn check_batch(y_pred: &ArrayView2<f32>, y: &ArrayView2<f32>) -> Result<usize> {
    check_same_shape("loss operands", y.dim(), y_pred.dim())?;
    if y_pred.nrows() == 0 {
        return Err(MlErr::DomainError("loss over an empty batch"));
    }

    Ok(y_pred.nrows())
}

/// The loss function a network trains against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Loss {
    CrossEntropy(CrossEntropy),
    Mse(Mse),
}

impl Loss {
    pub fn cross_entropy() -> Self {
        Self::CrossEntropy(CrossEntropy::new())
    }

    pub fn mse() -> Self {
        Self::Mse(Mse::new())
    }

    /// Seeds the output layer's delta, the derivative of the loss with respect to its
    /// pre-activation, for the output activation `act_fn`.
    ///
    /// Cross entropy after a softmax collapses to `a - y`. Any other activation after a
    /// softmax goes through the per-sample jacobian, elementwise activations use the
    /// chain rule directly.
    ///
    /// # Errors
    /// `NotImplemented` for cross entropy after anything but a softmax.
    pub fn output_delta(
        &self,
        act_fn: &ActFn,
        a: ArrayView2<f32>,
        y: ArrayView2<f32>,
        mut delta: ArrayViewMut2<f32>,
    ) -> Result<()> {
        check_same_shape("output delta", a.dim(), delta.dim())?;

        match (self, act_fn) {
            (Self::CrossEntropy(_), ActFn::Softmax(_)) => {
                check_batch(&a, &y)?;
                Zip::from(delta)
                    .and(a)
                    .and(y)
                    .for_each(|d, &a, &y| *d = a - y);
            }
            (Self::CrossEntropy(_), _) => {
                return Err(MlErr::NotImplemented(
                    "cross entropy only pairs with a softmax output",
                ));
            }
            (Self::Mse(f), ActFn::Softmax(s)) => {
                let upstream = f.loss_prime(a, y)?;
                s.jacobian_vector_product(a, upstream.view(), delta)?;
            }
            (Self::Mse(f), act_fn) => {
                let upstream = f.loss_prime(a, y)?;
                act_fn.gradient(a, delta.view_mut())?;
                Zip::from(delta)
                    .and(upstream.view())
                    .for_each(|d, &u| *d *= u);
            }
        }

        Ok(())
    }
}

impl LossFn for Loss {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        match self {
            Self::CrossEntropy(f) => f.loss(y_pred, y),
            Self::Mse(f) => f.loss(y_pred, y),
        }
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Self::CrossEntropy(f) => f.loss_prime(y_pred, y),
            Self::Mse(f) => f.loss_prime(y_pred, y),
        }
    }
}
