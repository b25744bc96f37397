mod builder;
mod runner;

pub use crate::arch::EpochStats;
pub use builder::NetworkBuilder;
pub use runner::{RunReport, run};
