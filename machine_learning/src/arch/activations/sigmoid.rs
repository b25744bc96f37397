#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sigmoid;

impl Sigmoid {
    pub fn new() -> Self {
        Self
    }

    pub fn f(&self, z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    /// The derivative expressed through the activated value, `a * (1 - a)`.
    pub fn df(&self, a: f32) -> f32 {
        a * (1. - a)
    }
}
