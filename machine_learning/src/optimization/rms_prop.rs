use ndarray::{ArrayView2, ArrayViewMut2, Zip};

use crate::{MlErr, Result, arch::LayerParams};

/// Stands in for `sqrt(velocity)` while the velocity is still zero.
const ZERO_VELOCITY_ROOT: f32 = 1. - 1e-7;

/// Scales every step by a running average of the squared gradient.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RmsProp;

impl RmsProp {
    /// Returns a new `RmsProp`.
    pub fn new() -> Self {
        Self
    }

    /// `velocity = momentum * velocity + (1 - momentum) * g²` and then
    /// `param -= lr * g / sqrt(velocity)`, for both weights and biases.
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
            db_velocity,
        } = params;

        update(weights, dw, dw_velocity, learning_rate, momentum);
        update(biases, db, db_velocity, learning_rate, momentum);

        Ok(())
    }
}

fn update(
    params: ArrayViewMut2<f32>,
    grad: ArrayView2<f32>,
    velocity: ArrayViewMut2<f32>,
    learning_rate: f32,
    momentum: f32,
) {
    Zip::from(params)
        .and(velocity)
        .and(grad)
        .for_each(|p, v, &g| {
            *v = momentum * *v + (1. - momentum) * g * g;
            let root = if *v == 0. { ZERO_VELOCITY_ROOT } else { v.sqrt() };
            *p -= learning_rate * g / root;
        });
}
