use ndarray::Zip;

use crate::{MlErr, Result, arch::LayerParams};

/// Gradient descent with optional momentum on the weights.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradientDescent;

impl GradientDescent {
    /// Returns a new `GradientDescent`.
    pub fn new() -> Self {
        Self
    }

    /// Makes a step in the opposite direction of the batch averaged gradient.
    ///
    /// With `momentum > 0` the weights move along `velocity = momentum * velocity - lr * dW / B`
    /// instead. The biases always take the plain step, momentum is never applied to them.
    ///
    /// # Arguments
    /// * `params` - The layer's parameters, gradients and optimizer state.
    /// * `learning_rate` - The *length* of the step.
    /// * `momentum` - How much of the previous velocity survives, `0` disables it.
    /// * `batch_size` - The amount of samples the gradients were accumulated over.
    pub fn update_params(
        &self,
        params: LayerParams<'_>,
        learning_rate: f32,
        momentum: f32,
        batch_size: usize,
    ) -> Result<()> {
        if batch_size == 0 {
            return Err(MlErr::DomainError("optimizer step over an empty batch"));
        }

        let LayerParams {
            weights,
            biases,
            dw,
            db,
            dw_velocity,
            ..
        } = params;
        let step = learning_rate / batch_size as f32;

        if momentum > 0. {
            Zip::from(weights)
                .and(dw_velocity)
                .and(dw)
                .for_each(|w, v, &g| {
                    *v = momentum * *v - step * g;
                    *w += *v;
                });
        } else {
            Zip::from(weights).and(dw).for_each(|w, &g| *w -= step * g);
        }

        Zip::from(biases).and(db).for_each(|b, &g| *b -= step * g);

        Ok(())
    }
}
