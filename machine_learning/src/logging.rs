use serde::{Deserialize, Serialize};

/// How much of the training a network reports through the `log` facade.
///
/// Every level includes the ones below it. The level only gates what is emitted, the
/// installed logger still filters by its own `log::Level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceLevel {
    #[default]
    Off,
    /// Per-epoch loss and accuracy, at `info`.
    Progress,
    /// Gradient norms, at `debug`.
    Scalars,
    /// Kernel operand shapes, at `trace`.
    Arrays,
}

impl TraceLevel {
    pub fn progress(self) -> bool {
        self >= Self::Progress
    }

    pub fn scalars(self) -> bool {
        self >= Self::Scalars
    }

    pub fn arrays(self) -> bool {
        self >= Self::Arrays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_cumulative() {
        assert!(!TraceLevel::Off.progress());
        assert!(TraceLevel::Scalars.progress() && TraceLevel::Scalars.scalars());
        assert!(!TraceLevel::Scalars.arrays());
        assert!(TraceLevel::Arrays.progress());
    }
}
