/// Leaky rectified linear unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Relu {
    alpha: f32,
}

impl Default for Relu {
    fn default() -> Self {
        Self { alpha: 0.01 }
    }
}

impl Relu {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn f(&self, z: f32) -> f32 {
        if z >= 0. { z } else { self.alpha * z }
    }

    /// The derivative, evaluated at the activated value `a` instead of the pre-activation.
    pub fn df(&self, a: f32) -> f32 {
        if a <= 0. { self.alpha } else { 1. }
    }
}
