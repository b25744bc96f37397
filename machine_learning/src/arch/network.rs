use std::num::NonZeroUsize;

use log::info;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;

use super::{
    activations::ActFn,
    kernel::Backend,
    layer::Layer,
    loss::{Loss, LossFn},
};
use crate::{
    MlErr, Result, arch::buffer::check_same_shape, dataset::Dataset, logging::TraceLevel,
    optimization::Optimizer,
};

/// Tolerance of the accuracy criterion for single valued labels.
const CLOSE_ENOUGH: f32 = 0.1;

/// What a network reports after every training epoch, measured over the test set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    /// The learning rate after the decay of the epoch's last batch.
    pub learning_rate: f32,
    pub loss: f32,
    pub accuracy: f32,
}

/// A linear stack of dense layers trained with mini-batch backpropagation.
#[derive(Debug, Clone)]
pub struct Network {
    input_size: usize,
    layers: Vec<Layer>,
    backend: Backend,
    trace: TraceLevel,
    rng: StdRng,

    loss: Option<Loss>,
    optimizer: Optimizer,
    learning_rate: f32,
    decay: f32,
    momentum: f32,

    // Set once training starts, the topology can't change afterwards.
    frozen: bool,
}

impl Network {
    /// Creates a new `Network` without layers.
    ///
    /// # Arguments
    /// * `input_size` - The width of every sample fed to the first layer.
    /// * `backend` - The kernel every layer computes with.
    /// * `trace` - How much the network and its layers log.
    /// * `rng` - Where the initial parameters of every added layer are sampled from.
    pub fn new(input_size: usize, backend: Backend, trace: TraceLevel, rng: StdRng) -> Self {
        Self {
            input_size,
            layers: Vec::new(),
            backend,
            trace,
            rng,
            loss: None,
            optimizer: Optimizer::default(),
            learning_rate: 0.05,
            decay: 0.05,
            momentum: 0.,
            frozen: false,
        }
    }

    /// Appends a dense layer of `output_size` units fed by the current last layer.
    ///
    /// # Errors
    /// `InvalidTopology` once training started, `InvalidDimension` for empty layers.
    pub fn add_layer(&mut self, output_size: usize, act_fn: ActFn) -> Result<()> {
        self.check_not_frozen()?;

        let input_size = self.output_size();
        if input_size == 0 || output_size == 0 {
            return Err(MlErr::InvalidDimension {
                rows: output_size,
                cols: input_size,
            });
        }

        let index = self.layers.len();
        let layer = Layer::new(
            index,
            input_size,
            output_size,
            act_fn,
            self.trace,
            &mut self.rng,
        )?;

        self.layers.push(layer);
        Ok(())
    }

    /// Appends an already built layer, its input must match the current output size.
    pub(crate) fn push_layer(&mut self, layer: Layer) -> Result<()> {
        self.check_not_frozen()?;

        if layer.input_size() != self.output_size() {
            return Err(MlErr::ShapeMismatch {
                what: "layer input",
                got: layer.input_size(),
                expected: self.output_size(),
            });
        }

        self.layers.push(layer);
        Ok(())
    }

    fn check_not_frozen(&self) -> Result<()> {
        if self.frozen {
            return Err(MlErr::InvalidTopology(
                "layers can't be added once training started",
            ));
        }

        Ok(())
    }

    /// Feeds the batch `x` through every layer.
    ///
    /// # Returns
    /// A view of the output layer's activations.
    pub fn feed_forward(&mut self, x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        if self.layers.is_empty() {
            return Err(MlErr::InvalidTopology("network without layers"));
        }

        let backend = self.backend;
        for layer in self.layers.iter_mut() {
            layer.allocate_batch(x.nrows())?;
        }

        self.layers[0].forward(&backend, x)?;
        for i in 1..self.layers.len() {
            let (prev, rest) = self.layers.split_at_mut(i);
            rest[0].forward(&backend, prev[i - 1].activations())?;
        }

        let last = self.layers.len() - 1;
        Ok(self.layers[last].activations())
    }

    /// Feeds `x` forward for evaluation only, the layers refuse to back-propagate it.
    fn evaluate(&mut self, x: ArrayView2<f32>) -> Result<ArrayView2<'_, f32>> {
        self.feed_forward(x)?;
        for layer in self.layers.iter_mut() {
            layer.finish_evaluation();
        }

        self.outputs()
            .ok_or(MlErr::InvalidTopology("network without layers"))
    }

    /// Accumulates every layer's gradients for the batch last fed forward.
    ///
    /// # Arguments
    /// * `x` - The batch `feed_forward` was called with.
    /// * `y` - The ground truth for that batch.
    pub fn back_propagate(&mut self, x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<()> {
        let loss = self.loss.ok_or(MlErr::MissingLossFn)?;
        let backend = self.backend;
        let last = self
            .layers
            .len()
            .checked_sub(1)
            .ok_or(MlErr::InvalidTopology("network without layers"))?;

        let (hidden, output) = self.layers.split_at_mut(last);
        let prev = match hidden.last() {
            Some(layer) => layer.activations(),
            None => x,
        };
        output[0].backward_output(&backend, &loss, y, prev)?;

        for i in (0..last).rev() {
            let (head, tail) = self.layers.split_at_mut(i + 1);
            let (before, current) = head.split_at_mut(i);
            let next = &tail[0];
            let prev = match before.last() {
                Some(layer) => layer.activations(),
                None => x,
            };

            current[0].backward(&backend, next.delta(), next.weights().view(), prev)?;
        }

        Ok(())
    }

    /// Applies `optimizer` to every layer and clears their gradient accumulators.
    pub fn optimizer_step(
        &mut self,
        optimizer: Optimizer,
        learning_rate: f32,
        momentum: f32,
    ) -> Result<()> {
        for layer in self.layers.iter_mut() {
            let batch_size = layer.batch_size();
            optimizer.update_params(layer.params(), learning_rate, momentum, batch_size)?;
            layer.finish_update();
        }

        Ok(())
    }

    /// Trains the network for `epochs` passes over `train`.
    ///
    /// The learning rate restarts from the configured one every epoch and decays before every
    /// batch `j` as `lr = lr / (1 + decay * j)`.
    ///
    /// # Arguments
    /// * `train` - The samples the network learns from.
    /// * `test` - The held-out samples the loss and accuracy are reported on.
    /// * `epochs` - The amount of passes over `train`.
    /// * `loss` - The loss function to minimize.
    /// * `batch_size` - The amount of samples per batch, the last one may be smaller.
    ///
    /// # Returns
    /// The statistics of every epoch.
    pub fn train(
        &mut self,
        train: &Dataset,
        test: &Dataset,
        epochs: usize,
        loss: Loss,
        batch_size: NonZeroUsize,
    ) -> Result<Vec<EpochStats>> {
        if train.is_empty() || test.is_empty() {
            return Err(MlErr::DomainError("training with an empty dataset"));
        }

        self.loss = Some(loss);
        self.frozen = true;

        if self.trace.progress() {
            info!(
                optimizer = self.optimizer.code(),
                epochs = epochs,
                batch_size = batch_size.get(),
                samples = train.len();
                "training started"
            );
        }

        let mut stats = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            let mut learning_rate = self.learning_rate;

            for (j, (x, y)) in train.batches(batch_size).enumerate() {
                self.feed_forward(x)?;
                self.back_propagate(x, y)?;

                learning_rate /= 1. + self.decay * j as f32;
                self.optimizer_step(self.optimizer, learning_rate, self.momentum)?;
            }

            let epoch_stats = EpochStats {
                epoch: epoch + 1,
                learning_rate,
                loss: self.calculate_loss(test)?,
                accuracy: self.accuracy(test)?,
            };

            if self.trace.progress() {
                info!(
                    epoch = epoch_stats.epoch,
                    loss = epoch_stats.loss,
                    accuracy = epoch_stats.accuracy,
                    learning_rate = epoch_stats.learning_rate;
                    "epoch finished"
                );
            }

            stats.push(epoch_stats);
        }

        Ok(stats)
    }

    /// The loss over every sample of `dataset`, averaged over its size.
    ///
    /// # Errors
    /// `DomainError` on an empty dataset, `MissingLossFn` if no loss function was set.
    pub fn calculate_loss(&mut self, dataset: &Dataset) -> Result<f32> {
        if dataset.is_empty() {
            return Err(MlErr::DomainError("loss over an empty dataset"));
        }

        let loss = self.loss.ok_or(MlErr::MissingLossFn)?;
        let y_pred = self.evaluate(dataset.x())?;
        loss.loss(y_pred, dataset.y())
    }

    /// The fraction of samples of `dataset` the network predicts right.
    ///
    /// Single valued labels are right when the prediction is within `0.1` of them, wider
    /// labels when the largest prediction is at the label's largest value.
    ///
    /// # Errors
    /// `DomainError` on an empty dataset, `ShapeMismatch` if the labels are not as wide as
    /// the network's output.
    pub fn accuracy(&mut self, dataset: &Dataset) -> Result<f32> {
        if dataset.is_empty() {
            return Err(MlErr::DomainError("accuracy over an empty dataset"));
        }

        let y_pred = self.evaluate(dataset.x())?;
        check_same_shape("accuracy labels", y_pred.dim(), dataset.y().dim())?;

        let correct = y_pred
            .rows()
            .into_iter()
            .zip(dataset.y().rows())
            .filter(|(pred, label)| is_correct(*pred, *label))
            .count();

        Ok(correct as f32 / dataset.len() as f32)
    }

    /// Overwrites every weight of every layer with `value`.
    pub fn set_uniform_weights(&mut self, value: f32) {
        for layer in self.layers.iter_mut() {
            layer.set_uniform_weights(value);
        }
    }

    /// Overwrites every bias of every layer with `value`.
    pub fn set_uniform_biases(&mut self, value: f32) {
        for layer in self.layers.iter_mut() {
            layer.set_uniform_biases(value);
        }
    }

    /// Describes the topology, one line per layer.
    pub fn info(&self) -> String {
        let mut lines = vec![format!(
            "network: {} inputs, {} layers, {:?} backend",
            self.input_size,
            self.layers.len(),
            self.backend
        )];

        lines.extend(self.layers.iter().map(|layer| {
            format!(
                "  layer {}: {} -> {} ({})",
                layer.index(),
                layer.input_size(),
                layer.output_size(),
                layer.act_fn().name()
            )
        }));

        let info = lines.join("\n");
        if self.trace.progress() {
            info!("{info}");
        }

        info
    }

    /// The activations of the output layer for the last batch fed forward.
    pub fn outputs(&self) -> Option<ArrayView2<'_, f32>> {
        self.layers.last().map(|layer| layer.activations())
    }

    pub fn set_loss(&mut self, loss: Loss) {
        self.loss = Some(loss);
    }

    pub fn set_optimizer(&mut self, optimizer: Optimizer) {
        self.optimizer = optimizer;
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    pub fn set_decay(&mut self, decay: f32) {
        self.decay = decay;
    }

    pub fn set_momentum(&mut self, momentum: f32) {
        self.momentum = momentum;
    }

    pub fn loss(&self) -> Option<Loss> {
        self.loss
    }

    pub fn optimizer(&self) -> Optimizer {
        self.optimizer
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn trace(&self) -> TraceLevel {
        self.trace
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// The width of the network's output, the input size while there are no layers.
    pub fn output_size(&self) -> usize {
        self.layers
            .last()
            .map_or(self.input_size, |layer| layer.output_size())
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, i: usize) -> Option<&Layer> {
        self.layers.get(i)
    }

    pub fn layer_mut(&mut self, i: usize) -> Option<&mut Layer> {
        self.layers.get_mut(i)
    }
}

fn is_correct(pred: ArrayView1<f32>, label: ArrayView1<f32>) -> bool {
    if label.len() == 1 {
        return (pred[0] - label[0]).abs() < CLOSE_ENOUGH;
    }

    argmax(pred) == argmax(label)
}

fn argmax(v: ArrayView1<f32>) -> Option<usize> {
    v.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &x)| match best {
            Some((_, max)) if max >= x => best,
            _ => Some((i, x)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn network(backend: Backend) -> Network {
        let rng = StdRng::seed_from_u64(7);
        let mut network = Network::new(2, backend, TraceLevel::Off, rng);
        network.add_layer(3, ActFn::sigmoid()).unwrap();
        network.add_layer(2, ActFn::softmax()).unwrap();
        network
    }

    #[test]
    fn layers_chain_their_sizes() {
        let network = network(Backend::Reference);

        assert_eq!(network.layers().len(), 2);
        assert_eq!(network.layer(0).unwrap().input_size(), 2);
        assert_eq!(network.layer(1).unwrap().input_size(), 3);
        assert_eq!(network.output_size(), 2);
        assert!(network.info().contains("layer 1: 3 -> 2 (softmax)"));
    }

    #[test]
    fn empty_layer_is_rejected() {
        let mut network = network(Backend::Reference);
        assert!(matches!(
            network.add_layer(0, ActFn::Identity),
            Err(MlErr::InvalidDimension { .. })
        ));
    }

    #[test]
    fn feed_forward_follows_the_batch_size() {
        let mut network = network(Backend::Optimized);

        let out = network
            .feed_forward(array![[1., 2.], [3., 4.], [5., 6.]].view())
            .unwrap();
        assert_eq!(out.dim(), (3, 2));

        let out = network.feed_forward(array![[1., 2.]].view()).unwrap();
        assert_eq!(out.dim(), (1, 2));
        assert!(network.layers().iter().all(|layer| layer.batch_size() == 1));
    }

    #[test]
    fn back_propagate_needs_a_loss() {
        let mut network = network(Backend::Reference);
        let x = array![[1., 2.]];
        let y = array![[0., 1.]];

        network.feed_forward(x.view()).unwrap();
        assert!(matches!(
            network.back_propagate(x.view(), y.view()),
            Err(MlErr::MissingLossFn)
        ));
    }

    #[test]
    fn step_clears_the_gradients() {
        let mut network = network(Backend::Reference);
        network.set_loss(Loss::cross_entropy());
        let x = array![[1., 2.], [-1., 0.5]];
        let y = array![[0., 1.], [1., 0.]];
        let before = network.layer(0).unwrap().weights().clone();

        network.feed_forward(x.view()).unwrap();
        network.back_propagate(x.view(), y.view()).unwrap();
        assert!(network.layer(0).unwrap().weight_grad().iter().any(|&g| g != 0.));

        network
            .optimizer_step(Optimizer::GradientDescent, 0.5, 0.)
            .unwrap();
        let layer = network.layer(0).unwrap();
        assert!(layer.weight_grad().iter().all(|&g| g == 0.));
        assert_ne!(layer.weights(), &before);
    }

    #[test]
    fn topology_is_frozen_by_training() {
        let mut network = network(Backend::Reference);
        let dataset = Dataset::pos_neg(4).unwrap();
        let mut one_hot = Network::new(
            1,
            Backend::Reference,
            TraceLevel::Off,
            StdRng::seed_from_u64(1),
        );
        one_hot.add_layer(2, ActFn::softmax()).unwrap();

        one_hot
            .train(&dataset, &dataset, 1, Loss::cross_entropy(), NonZeroUsize::MIN)
            .unwrap();
        assert!(matches!(
            one_hot.add_layer(2, ActFn::Identity),
            Err(MlErr::InvalidTopology(_))
        ));
        assert!(network.add_layer(2, ActFn::Identity).is_ok());
    }

    #[test]
    fn evaluation_cannot_be_back_propagated() {
        let mut network = network(Backend::Reference);
        network.set_loss(Loss::cross_entropy());
        let x = array![[1., 2.], [-1., 0.5]];
        let y = array![[0., 1.], [1., 0.]];
        let test = Dataset::from_parts(array![[0.5, 0.5], [2., -1.]], y.clone()).unwrap();

        network.feed_forward(x.view()).unwrap();
        network.calculate_loss(&test).unwrap();
        assert!(matches!(
            network.back_propagate(x.view(), y.view()),
            Err(MlErr::PrecedenceViolation {
                state: "evaluated",
                ..
            })
        ));

        network.feed_forward(x.view()).unwrap();
        network.accuracy(&test).unwrap();
        assert!(network.back_propagate(x.view(), y.view()).is_err());

        network.feed_forward(x.view()).unwrap();
        assert!(network.back_propagate(x.view(), y.view()).is_ok());
    }

    #[test]
    fn accuracy_needs_labels_as_wide_as_the_output() {
        let mut network = network(Backend::Optimized);
        let dataset = Dataset::from_parts(
            array![[1., 2.], [3., 4.]],
            array![[0., 1., 0.], [1., 0., 0.]],
        )
        .unwrap();

        assert!(matches!(
            network.accuracy(&dataset),
            Err(MlErr::ShapeMismatch {
                what: "accuracy labels",
                got: 3,
                expected: 2,
            })
        ));
    }

    #[test]
    fn accuracy_criteria() {
        assert!(is_correct(array![0.95].view(), array![1.].view()));
        assert!(!is_correct(array![0.8].view(), array![1.].view()));
        assert!(is_correct(array![0.2, 0.7, 0.1].view(), array![0., 1., 0.].view()));
        assert!(!is_correct(array![0.6, 0.4].view(), array![0., 1.].view()));
    }
}
