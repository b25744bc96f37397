use log::{debug, trace};
use ndarray::{ArrayView2, ArrayViewMut2};
use rand::Rng;

use super::{activations::ActFn, buffer::Buffer, kernel::Kernel, loss::Loss};
use crate::{MlErr, Result, arch::buffer::check_same_shape, logging::TraceLevel};

/// Where a layer stands in the lifecycle of a training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Weights and biases exist, no batch temporaries yet.
    Shaped,
    /// Temporaries are sized for the current batch.
    BatchReady,
    ForwardComputed,
    /// The activations come from an evaluation pass and can't be back-propagated.
    Evaluated,
    BackwardComputed,
    /// The optimizer consumed the gradients and the accumulators were cleared.
    Updated,
}

impl LayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerState::Shaped => "shaped",
            LayerState::BatchReady => "batch-ready",
            LayerState::ForwardComputed => "forward-computed",
            LayerState::Evaluated => "evaluated",
            LayerState::BackwardComputed => "backward-computed",
            LayerState::Updated => "updated",
        }
    }
}

/// Mutable access to a layer's parameters and optimizer state next to its gradients.
pub struct LayerParams<'a> {
    pub weights: ArrayViewMut2<'a, f32>,
    pub biases: ArrayViewMut2<'a, f32>,
    pub dw: ArrayView2<'a, f32>,
    pub db: ArrayView2<'a, f32>,
    pub dw_velocity: ArrayViewMut2<'a, f32>,
    pub db_velocity: ArrayViewMut2<'a, f32>,
}

/// A dense layer, `a = act_fn(x · Wᵗ + b)` for every sample `x` of the batch.
#[derive(Debug, Clone)]
pub struct Layer {
    index: usize,
    act_fn: ActFn,
    trace: TraceLevel,
    state: LayerState,

    // [output_size, input_size] and [1, output_size]
    weights: Buffer,
    biases: Buffer,

    // Forward metadata
    z: Buffer,
    a: Buffer,

    // Backward metadata
    d_act: Buffer,
    dl: Buffer,
    delta: Buffer,

    // Accumulated over the batch, cleared after every update
    dw: Buffer,
    db: Buffer,

    // Optimizer state, persists across updates
    dw_velocity: Buffer,
    db_velocity: Buffer,
}

impl Layer {
    /// Creates a new `Layer` with weights and biases drawn uniformly from
    /// `[-INIT_RANGE, INIT_RANGE]`.
    ///
    /// # Arguments
    /// * `index` - The depth of the layer in its network, used in errors and logs.
    /// * `input_size` - The size of every incoming sample.
    /// * `output_size` - The amount of units of the layer.
    /// * `act_fn` - The activation function.
    /// * `trace` - How much this layer logs.
    /// * `rng` - Where the initial parameters are sampled from.
    pub fn new<R: Rng + ?Sized>(
        index: usize,
        input_size: usize,
        output_size: usize,
        act_fn: ActFn,
        trace: TraceLevel,
        rng: &mut R,
    ) -> Result<Self> {
        let weights = Buffer::random(output_size, input_size, rng)?;
        let biases = Buffer::random(1, output_size, rng)?;
        Self::from_parts(index, weights, biases, act_fn, trace)
    }

    /// Creates a new `Layer` from already existing parameters.
    ///
    /// # Errors
    /// `ShapeMismatch` if `biases` is not a single row of `weights.rows()` elements.
    pub fn from_parts(
        index: usize,
        weights: Buffer,
        biases: Buffer,
        act_fn: ActFn,
        trace: TraceLevel,
    ) -> Result<Self> {
        check_same_shape("layer biases", (1, weights.rows()), biases.shape())?;

        let (rows, cols) = weights.shape();
        Ok(Self {
            index,
            act_fn,
            trace,
            state: LayerState::Shaped,
            dw: Buffer::zeros(rows, cols)?,
            db: Buffer::zeros(1, rows)?,
            dw_velocity: Buffer::zeros(rows, cols)?,
            db_velocity: Buffer::zeros(1, rows)?,
            weights,
            biases,
            z: Buffer::default(),
            a: Buffer::default(),
            d_act: Buffer::default(),
            dl: Buffer::default(),
            delta: Buffer::default(),
        })
    }

    /// Resizes every per-batch temporary for batches of `batch_size` samples.
    pub fn allocate_batch(&mut self, batch_size: usize) -> Result<()> {
        let out = self.output_size();
        self.z.allocate(batch_size, out)?;
        self.a.allocate(batch_size, out)?;
        self.d_act.allocate(batch_size, out)?;
        self.dl.allocate(batch_size, out)?;
        self.delta.allocate(batch_size, out)?;

        self.state = LayerState::BatchReady;
        Ok(())
    }

    /// Computes the activations of the batch `x` into the activation cache.
    ///
    /// # Errors
    /// `ShapeMismatch` if `x` does not match the layer's input size or the allocated batch
    /// size, `NonFinite` in debug builds if the activations blew up.
    pub fn forward<K: Kernel>(&mut self, kernel: &K, x: ArrayView2<f32>) -> Result<()> {
        check_same_shape("layer input", (self.batch_size(), self.input_size()), x.dim())?;

        if self.trace.arrays() {
            trace!(
                layer = self.index,
                batch = x.nrows(),
                input = self.input_size(),
                output = self.output_size();
                "forward"
            );
        }

        kernel.matmul_transpose_right(x, self.weights.view(), self.z.view_mut())?;
        self.z.add_row_to_each_row(&self.biases)?;
        self.act_fn.apply(self.z.view(), self.a.view_mut())?;

        if cfg!(debug_assertions) && !self.a.all_finite() {
            return Err(MlErr::NonFinite { layer: self.index });
        }

        self.state = LayerState::ForwardComputed;
        Ok(())
    }

    /// Back-propagates the error of the layer downstream and accumulates this layer's
    /// gradients.
    ///
    /// # Arguments
    /// * `kernel` - The kernel computing the products.
    /// * `next_delta` - The delta of the next layer, `[batch, next_output_size]`.
    /// * `next_weights` - The weights of the next layer, `[next_output_size, output_size]`.
    /// * `prev` - The input this layer was fed forward with.
    pub fn backward<K: Kernel>(
        &mut self,
        kernel: &K,
        next_delta: ArrayView2<f32>,
        next_weights: ArrayView2<f32>,
        prev: ArrayView2<f32>,
    ) -> Result<()> {
        self.check_forward_computed()?;

        kernel.matmul(next_delta, next_weights, self.dl.view_mut())?;

        match &self.act_fn {
            ActFn::Softmax(softmax) => {
                softmax.jacobian_vector_product(
                    self.a.view(),
                    self.dl.view(),
                    self.delta.view_mut(),
                )?;
            }
            act_fn => {
                act_fn.gradient(self.a.view(), self.d_act.view_mut())?;
                self.delta.assign_hadamard(self.d_act.view(), self.dl.view())?;
            }
        }

        self.accumulate(kernel, prev)
    }

    /// Seeds the delta of the output layer from the ground truth `y` and accumulates its
    /// gradients against `prev`.
    pub fn backward_output<K: Kernel>(
        &mut self,
        kernel: &K,
        loss: &Loss,
        y: ArrayView2<f32>,
        prev: ArrayView2<f32>,
    ) -> Result<()> {
        self.check_forward_computed()?;

        loss.output_delta(&self.act_fn, self.a.view(), y, self.delta.view_mut())?;
        self.accumulate(kernel, prev)
    }

    fn check_forward_computed(&self) -> Result<()> {
        if self.state != LayerState::ForwardComputed {
            return Err(MlErr::PrecedenceViolation {
                layer: self.index,
                state: self.state.as_str(),
            });
        }

        Ok(())
    }

    fn accumulate<K: Kernel>(&mut self, kernel: &K, prev: ArrayView2<f32>) -> Result<()> {
        kernel.outer_product_accumulate(self.delta.view(), prev, self.dw.view_mut())?;

        let mean = self.delta.mean_over_batch()?;
        kernel.axpy(1.0, mean.view(), self.db.view_mut())?;

        if self.trace.scalars() {
            debug!(
                layer = self.index,
                delta_norm = kernel.frobenius_norm(self.delta.view()),
                dw_norm = kernel.frobenius_norm(self.dw.view()),
                db_norm = kernel.frobenius_norm(self.db.view());
                "accumulated gradients"
            );
        }

        self.state = LayerState::BackwardComputed;
        Ok(())
    }

    /// Borrows the parameters, the accumulated gradients and the optimizer state at once.
    pub fn params(&mut self) -> LayerParams<'_> {
        LayerParams {
            weights: self.weights.view_mut(),
            biases: self.biases.view_mut(),
            dw: self.dw.view(),
            db: self.db.view(),
            dw_velocity: self.dw_velocity.view_mut(),
            db_velocity: self.db_velocity.view_mut(),
        }
    }

    /// Marks the cached activations as the result of an evaluation pass, a later backward
    /// pass fails until the layer is fed forward again.
    pub fn finish_evaluation(&mut self) {
        if self.state == LayerState::ForwardComputed {
            self.state = LayerState::Evaluated;
        }
    }

    /// Clears the gradient accumulators once the optimizer consumed them.
    pub fn finish_update(&mut self) {
        self.dw.zero_fill();
        self.db.zero_fill();
        self.state = LayerState::Updated;
    }

    pub fn set_uniform_weights(&mut self, value: f32) {
        self.weights.fill(value);
    }

    pub fn set_uniform_biases(&mut self, value: f32) {
        self.biases.fill(value);
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn act_fn(&self) -> &ActFn {
        &self.act_fn
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.rows()
    }

    /// The batch size the temporaries are currently sized for.
    pub fn batch_size(&self) -> usize {
        self.a.rows()
    }

    pub fn activations(&self) -> ArrayView2<'_, f32> {
        self.a.view()
    }

    pub fn pre_activations(&self) -> ArrayView2<'_, f32> {
        self.z.view()
    }

    pub fn delta(&self) -> ArrayView2<'_, f32> {
        self.delta.view()
    }

    pub fn weights(&self) -> &Buffer {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Buffer {
        &mut self.weights
    }

    pub fn biases(&self) -> &Buffer {
        &self.biases
    }

    pub fn biases_mut(&mut self) -> &mut Buffer {
        &mut self.biases
    }

    pub fn weight_grad(&self) -> &Buffer {
        &self.dw
    }

    pub fn bias_grad(&self) -> &Buffer {
        &self.db
    }
}
