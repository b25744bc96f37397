//! Dense feed-forward networks trained with mini-batch backpropagation.
//!
//! The [`arch`] module holds the compute core: numeric buffers, the kernel backends,
//! activation and loss functions, layers and the network orchestrating them.

pub mod arch;
mod checkpoint;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod optimization;
pub mod specs;
pub mod training;

pub use error::{MlErr, Result};
