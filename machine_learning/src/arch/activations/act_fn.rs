use ndarray::{ArrayView2, ArrayViewMut2, Zip};

use super::{Relu, Sigmoid, Softmax};
use crate::{MlErr, Result, arch::buffer::check_same_shape};

/// A layer's activation function.
///
/// The numeric codes are the ones stored in checkpoints: `0` relu, `1` sigmoid, `2` softmax
/// and `3` identity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ActFn {
    Relu(Relu),
    Sigmoid(Sigmoid),
    Softmax(Softmax),
    #[default]
    Identity,
}

impl ActFn {
    pub fn relu(alpha: f32) -> Self {
        Self::Relu(Relu::new(alpha))
    }

    pub fn sigmoid() -> Self {
        Self::Sigmoid(Sigmoid::new())
    }

    pub fn softmax() -> Self {
        Self::Softmax(Softmax::new())
    }

    /// Applies the activation to the pre-activation batch `z`, writing into `a`.
    pub fn apply(&self, z: ArrayView2<f32>, mut a: ArrayViewMut2<f32>) -> Result<()> {
        check_same_shape("activation output", z.dim(), a.dim())?;

        match self {
            Self::Relu(f) => Zip::from(a).and(z).for_each(|a, &z| *a = f.f(z)),
            Self::Sigmoid(f) => Zip::from(a).and(z).for_each(|a, &z| *a = f.f(z)),
            Self::Softmax(f) => f.apply(z, a)?,
            Self::Identity => a.assign(&z),
        }

        Ok(())
    }

    /// Writes the elementwise derivative evaluated at the activated batch `a` into `g`.
    ///
    /// # Errors
    /// `NotImplemented` for the softmax, whose derivative is a per-sample jacobian.
    pub fn gradient(&self, a: ArrayView2<f32>, mut g: ArrayViewMut2<f32>) -> Result<()> {
        check_same_shape("activation gradient", a.dim(), g.dim())?;

        match self {
            Self::Relu(f) => Zip::from(g).and(a).for_each(|g, &a| *g = f.df(a)),
            Self::Sigmoid(f) => Zip::from(g).and(a).for_each(|g, &a| *g = f.df(a)),
            Self::Softmax(f) => f.gradient()?,
            Self::Identity => g.fill(1.),
        }

        Ok(())
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Relu(_) => 0,
            Self::Sigmoid(_) => 1,
            Self::Softmax(_) => 2,
            Self::Identity => 3,
        }
    }

    /// Decodes a checkpoint activation code, the relu takes its default slope.
    pub fn from_code(code: i32) -> Result<Self> {
        let act_fn = match code {
            0 => Self::Relu(Relu::default()),
            1 => Self::sigmoid(),
            2 => Self::softmax(),
            3 => Self::Identity,
            _ => return Err(MlErr::InvalidActivationCode(code)),
        };

        Ok(act_fn)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu(_) => "relu",
            Self::Sigmoid(_) => "sigmoid",
            Self::Softmax(_) => "softmax",
            Self::Identity => "identity",
        }
    }
}
