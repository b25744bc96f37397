use serde::{Deserialize, Serialize};

use super::{GradientDescent, RmsProp};
use crate::{MlErr, Result, arch::LayerParams};

/// The update rule applied to every layer after a batch.
///
/// The numeric codes follow the command line convention, `0` gradient descent and `1`
/// RMSprop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    #[default]
    GradientDescent,
    RmsProp,
}

impl Optimizer {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::GradientDescent),
            1 => Ok(Self::RmsProp),
            _ => Err(MlErr::InvalidOptimizerCode(code)),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::GradientDescent => 0,
            Self::RmsProp => 1,
        }
    }

    /// Updates one layer's parameters from its accumulated gradients.
    ///
    /// # Arguments
    /// * `params` - The layer's parameters, gradients and optimizer state.
    /// * `learning_rate` - The current learning rate.
    /// * `momentum` - The momentum, or the squared gradient decay for RMSprop.
    /// * `batch_size` - The size of the batch the gradients were accumulated over.
    pub fn update_params(
        &self,
        params: LayerParams<'_>,
        learning_rate: f32,
        momentum: f32,
        batch_size: usize,
    ) -> Result<()> {
        match self {
            Self::GradientDescent => {
                GradientDescent.update_params(params, learning_rate, momentum, batch_size)
            }
            Self::RmsProp => RmsProp.update_params(params, learning_rate, momentum, batch_size),
        }
    }
}
