mod gradient_descent;
mod optimizer;
mod rms_prop;

pub use gradient_descent::GradientDescent;
pub use optimizer::Optimizer;
pub use rms_prop::RmsProp;
