use std::{num::NonZeroUsize, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, arch::Backend, logging::TraceLevel};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu {
        #[serde(default = "default_relu_alpha")]
        alpha: f32,
    },
    Sigmoid,
    Softmax,
    Identity,
}

/// The specification for a dense `Layer`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: NonZeroUsize,
    pub act_fn: ActFnSpec,
}

/// The specification for the `Network`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub input_size: NonZeroUsize,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub trace: TraceLevel,
    pub seed: Option<u64>,
}

/// The specification for the `Loss` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    CrossEntropy,
    Mse,
}

/// The specification for the `Dataset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSpec {
    /// `y = 2x + 1` over five points.
    Linear,
    /// Sign classification over `len` points.
    PosNeg { len: usize },
    /// Interleaved rows of `x_size` features and `y_size` label values.
    Inline {
        data: Vec<f32>,
        x_size: usize,
        y_size: usize,
    },
}

/// The specification for a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub network: NetworkSpec,
    pub dataset: DatasetSpec,
    pub loss: LossFnSpec,
    /// `0` gradient descent, `1` RMSprop.
    #[serde(default)]
    pub optimizer: i32,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default)]
    pub momentum: f32,
    #[serde(default = "default_decay")]
    pub decay: f32,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: NonZeroUsize,
    #[serde(default = "default_train_fraction")]
    pub train_fraction: f32,
    #[serde(default)]
    pub shuffle: bool,
    pub save_path: Option<PathBuf>,
    pub load_path: Option<PathBuf>,
}

impl TrainerSpec {
    /// Parses a `TrainerSpec` from its json representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn default_relu_alpha() -> f32 {
    0.01
}

fn default_learning_rate() -> f32 {
    0.001
}

fn default_decay() -> f32 {
    0.05
}

fn default_epochs() -> usize {
    1
}

fn default_batch_size() -> NonZeroUsize {
    NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN)
}

fn default_train_fraction() -> f32 {
    0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MlErr;

    #[test]
    fn minimal_spec_takes_the_defaults() {
        let spec = TrainerSpec::from_json(
            r#"{
                "network": {
                    "input_size": 1,
                    "layers": [{ "size": 1, "act_fn": "identity" }]
                },
                "dataset": "linear",
                "loss": "mse"
            }"#,
        )
        .unwrap();

        assert_eq!(spec.optimizer, 0);
        assert_eq!(spec.learning_rate, 0.001);
        assert_eq!(spec.decay, 0.05);
        assert_eq!(spec.momentum, 0.);
        assert_eq!(spec.epochs, 1);
        assert_eq!(spec.batch_size.get(), 5);
        assert_eq!(spec.network.backend, Backend::Optimized);
        assert_eq!(spec.network.trace, TraceLevel::Off);
        assert!(spec.save_path.is_none() && spec.network.seed.is_none());
    }

    #[test]
    fn full_spec() {
        let spec = TrainerSpec::from_json(
            r#"{
                "network": {
                    "input_size": 1,
                    "layers": [
                        { "size": 16, "act_fn": { "relu": {} } },
                        { "size": 2, "act_fn": "softmax" }
                    ],
                    "backend": "reference",
                    "trace": "scalars",
                    "seed": 3
                },
                "dataset": { "pos_neg": { "len": 200 } },
                "loss": "cross_entropy",
                "optimizer": 1,
                "momentum": 0.9,
                "batch_size": 20,
                "shuffle": true,
                "save_path": "model.bin"
            }"#,
        )
        .unwrap();

        assert_eq!(
            spec.network.layers[0].act_fn,
            ActFnSpec::Relu { alpha: 0.01 }
        );
        assert_eq!(spec.network.backend, Backend::Reference);
        assert_eq!(spec.network.trace, TraceLevel::Scalars);
        assert_eq!(spec.dataset, DatasetSpec::PosNeg { len: 200 });
        assert_eq!(spec.loss, LossFnSpec::CrossEntropy);
        assert_eq!(spec.save_path, Some(PathBuf::from("model.bin")));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let result = TrainerSpec::from_json(
            r#"{
                "network": { "input_size": 1, "layers": [] },
                "dataset": "linear",
                "loss": "mse",
                "batch_size": 0
            }"#,
        );

        assert!(matches!(result, Err(MlErr::InvalidSpec(_))));
    }

    #[test]
    fn demo_specs_parse() {
        let pos_neg = TrainerSpec::from_json(include_str!("../../demos/pos_neg.json")).unwrap();
        assert_eq!(pos_neg.network.layers.len(), 2);
        assert_eq!(pos_neg.train_fraction, 0.9);

        let linear = TrainerSpec::from_json(include_str!("../../demos/linear.json")).unwrap();
        assert_eq!(linear.dataset, DatasetSpec::Linear);
        assert_eq!(linear.train_fraction, 0.8);
    }
}
