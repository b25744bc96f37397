use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
///
/// Every variant is fatal for the current training run, they are propagated up to the run
/// driver instead of being recovered from.
#[derive(Debug)]
pub enum MlErr {
    /// Dimension-incompatible operands, always a caller bug.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// An allocation was requested with exactly one zero dimension.
    InvalidDimension { rows: usize, cols: usize },
    /// A numerical-stability failure upstream, e.g. a non-positive logarithm argument.
    DomainError(&'static str),
    /// An unsupported loss/activation pairing.
    NotImplemented(&'static str),
    /// A layer operation was called out of order.
    PrecedenceViolation {
        layer: usize,
        state: &'static str,
    },
    /// The network topology was modified after training started.
    InvalidTopology(&'static str),
    /// A layer's activation cache holds a NaN or an infinity.
    NonFinite { layer: usize },
    /// The loss was evaluated before a loss function was set.
    MissingLossFn,
    InvalidActivationCode(i32),
    InvalidOptimizerCode(i32),
    Io(io::Error),
    /// A run specification that could not be parsed.
    InvalidSpec(serde_json::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got}, expected {expected}"
            ),
            MlErr::InvalidDimension { rows, cols } => {
                write!(f, "invalid dimension {rows}x{cols}, only 0x0 may be empty")
            }
            MlErr::DomainError(msg) => write!(f, "domain error: {msg}"),
            MlErr::NotImplemented(msg) => write!(f, "not implemented: {msg}"),
            MlErr::PrecedenceViolation { layer, state } => write!(
                f,
                "layer {layer} was asked to go backward while in the {state} state"
            ),
            MlErr::InvalidTopology(msg) => write!(f, "invalid topology: {msg}"),
            MlErr::NonFinite { layer } => {
                write!(f, "layer {layer} produced a NaN or infinite activation")
            }
            MlErr::MissingLossFn => write!(f, "no loss function defined"),
            MlErr::InvalidActivationCode(code) => write!(f, "unknown activation code {code}"),
            MlErr::InvalidOptimizerCode(code) => write!(f, "unknown optimizer code {code}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
            MlErr::InvalidSpec(e) => write!(f, "invalid spec: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            MlErr::InvalidSpec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidSpec(value)
    }
}
