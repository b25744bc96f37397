use rand::{SeedableRng, rngs::StdRng};

use crate::{
    MlErr, Result,
    arch::{Network, activations::ActFn, loss::Loss},
    dataset::Dataset,
    optimization::Optimizer,
    specs::{ActFnSpec, DatasetSpec, LayerSpec, LossFnSpec, NetworkSpec, TrainerSpec},
};

/// Builds `Network`s and their training collaborators given a specification.
#[derive(Default)]
pub struct NetworkBuilder;

impl NetworkBuilder {
    /// Creates a new `NetworkBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Network` following a spec, with its training settings applied.
    ///
    /// When the spec names a checkpoint to load, the layers come from it instead of from
    /// the network spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the training run.
    pub fn build(&self, spec: &TrainerSpec) -> Result<Network> {
        let mut network = match &spec.load_path {
            Some(path) => {
                let net_spec = &spec.network;
                let rng = self.generate_rng(net_spec.seed);
                Network::load_from_path(path, net_spec.backend, net_spec.trace, rng)?
            }
            None => self.resolve_network(&spec.network)?,
        };

        network.set_optimizer(self.resolve_optimizer(spec.optimizer)?);
        network.set_loss(self.resolve_loss(spec.loss));
        network.set_learning_rate(spec.learning_rate);
        network.set_decay(spec.decay);
        network.set_momentum(spec.momentum);

        Ok(network)
    }

    fn resolve_network(&self, spec: &NetworkSpec) -> Result<Network> {
        if spec.layers.is_empty() {
            return Err(MlErr::InvalidTopology("network spec without layers"));
        }

        let rng = self.generate_rng(spec.seed);
        let mut network = Network::new(spec.input_size.get(), spec.backend, spec.trace, rng);

        for &LayerSpec { size, act_fn } in &spec.layers {
            network.add_layer(size.get(), self.resolve_act_fn(act_fn))?;
        }

        Ok(network)
    }

    fn resolve_act_fn(&self, spec: ActFnSpec) -> ActFn {
        match spec {
            ActFnSpec::Relu { alpha } => ActFn::relu(alpha),
            ActFnSpec::Sigmoid => ActFn::sigmoid(),
            ActFnSpec::Softmax => ActFn::softmax(),
            ActFnSpec::Identity => ActFn::Identity,
        }
    }

    fn resolve_optimizer(&self, code: i32) -> Result<Optimizer> {
        Optimizer::from_code(code)
    }

    /// Resolves the loss function of a spec.
    pub fn resolve_loss(&self, spec: LossFnSpec) -> Loss {
        match spec {
            LossFnSpec::CrossEntropy => Loss::cross_entropy(),
            LossFnSpec::Mse => Loss::mse(),
        }
    }

    /// Materializes the dataset of a spec.
    pub fn resolve_dataset(&self, spec: &DatasetSpec) -> Result<Dataset> {
        match spec {
            DatasetSpec::Linear => Ok(Dataset::linear()),
            DatasetSpec::PosNeg { len } => Dataset::pos_neg(*len),
            DatasetSpec::Inline {
                data,
                x_size,
                y_size,
            } => Dataset::new(data.clone(), *x_size, *y_size),
        }
    }

    /// A seeded generator when `seed` is given, one seeded from the OS otherwise.
    pub fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;
    use crate::{arch::Backend, logging::TraceLevel};

    fn spec() -> TrainerSpec {
        let layer = |size, act_fn| LayerSpec {
            size: NonZeroUsize::new(size).unwrap(),
            act_fn,
        };

        TrainerSpec {
            network: NetworkSpec {
                input_size: NonZeroUsize::new(1).unwrap(),
                layers: vec![
                    layer(4, ActFnSpec::Relu { alpha: 0.02 }),
                    layer(2, ActFnSpec::Softmax),
                ],
                backend: Backend::Reference,
                trace: TraceLevel::Off,
                seed: Some(5),
            },
            dataset: DatasetSpec::PosNeg { len: 10 },
            loss: LossFnSpec::CrossEntropy,
            optimizer: 1,
            learning_rate: 0.01,
            momentum: 0.5,
            decay: 0.,
            epochs: 1,
            batch_size: NonZeroUsize::new(2).unwrap(),
            train_fraction: 0.8,
            shuffle: false,
            save_path: None,
            load_path: None,
        }
    }

    #[test]
    fn builds_the_described_network() {
        let network = NetworkBuilder::new().build(&spec()).unwrap();

        assert_eq!(network.layers().len(), 2);
        assert_eq!(network.layer(0).unwrap().act_fn(), &ActFn::relu(0.02));
        assert_eq!(network.output_size(), 2);
        assert_eq!(network.optimizer(), Optimizer::RmsProp);
        assert_eq!(network.loss(), Some(Loss::cross_entropy()));
        assert_eq!(network.learning_rate(), 0.01);
        assert_eq!(network.momentum(), 0.5);
        assert_eq!(network.decay(), 0.);
    }

    #[test]
    fn same_seed_same_weights() {
        let a = NetworkBuilder::new().build(&spec()).unwrap();
        let b = NetworkBuilder::new().build(&spec()).unwrap();

        assert_eq!(a.layer(0).unwrap().weights(), b.layer(0).unwrap().weights());
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let mut bad_optimizer = spec();
        bad_optimizer.optimizer = 4;
        assert!(matches!(
            NetworkBuilder::new().build(&bad_optimizer),
            Err(MlErr::InvalidOptimizerCode(4))
        ));

        let mut no_layers = spec();
        no_layers.network.layers.clear();
        assert!(NetworkBuilder::new().build(&no_layers).is_err());
    }
}
