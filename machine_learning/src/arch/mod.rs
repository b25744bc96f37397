pub mod activations;
pub mod buffer;
pub mod kernel;
mod layer;
pub mod loss;
mod network;

pub use buffer::Buffer;
pub use kernel::{Backend, Kernel};
pub use layer::{Layer, LayerParams, LayerState};
pub use network::{EpochStats, Network};
