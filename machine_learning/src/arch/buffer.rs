use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2, Axis, Zip, s};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::Rng;

use crate::{MlErr, Result};

/// Half width of the uniform range used for random fills.
pub const INIT_RANGE: f32 = 0.1;

/// A two dimensional numeric container.
///
/// The same storage is read either as a `rows x cols` matrix or as a batch of `batch_size`
/// vectors of `item_size` elements each. Storage is always row-major and a batch keeps one
/// contiguous row per sample, so `index = row * cols + col` in both readings.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    data: Array2<f32>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            data: Array2::zeros((0, 0)),
        }
    }
}

impl From<Array2<f32>> for Buffer {
    fn from(data: Array2<f32>) -> Self {
        Self {
            data: data.as_standard_layout().into_owned(),
        }
    }
}

/// Validates a requested allocation, `0x0` is the only valid empty shape.
fn check_dims(rows: usize, cols: usize) -> Result<()> {
    if (rows == 0) != (cols == 0) {
        return Err(MlErr::InvalidDimension { rows, cols });
    }

    Ok(())
}

impl Buffer {
    /// Creates a zero filled `Buffer`.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows (the batch size when read as a batch).
    /// * `cols` - The amount of columns (the item size when read as a batch).
    ///
    /// # Returns
    /// A new `Buffer` or `InvalidDimension` if exactly one of the dimensions is zero.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self {
            data: Array2::zeros((rows, cols)),
        })
    }

    /// Creates a `Buffer` with every element set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f32) -> Result<Self> {
        check_dims(rows, cols)?;
        Ok(Self {
            data: Array2::from_elem((rows, cols), value),
        })
    }

    /// Creates a `Buffer` filled uniformly in `[-INIT_RANGE, INIT_RANGE]`.
    ///
    /// # Arguments
    /// * `rows` - The amount of rows.
    /// * `cols` - The amount of columns.
    /// * `rng` - The random number generator to sample from.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Result<Self> {
        check_dims(rows, cols)?;
        let dist = Uniform::new_inclusive(-INIT_RANGE, INIT_RANGE)
            .map_err(|_| MlErr::DomainError("invalid uniform initialization range"))?;

        Ok(Self {
            data: Array2::random_using((rows, cols), dist, rng),
        })
    }

    /// Creates a `Buffer` from row-major raw values.
    pub fn from_shape_vec(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self> {
        check_dims(rows, cols)?;
        let got = values.len();
        let data = Array2::from_shape_vec((rows, cols), values).map_err(|_| {
            MlErr::ShapeMismatch {
                what: "buffer values",
                got,
                expected: rows * cols,
            }
        })?;

        Ok(Self { data })
    }

    /// Resizes the storage to `batch_size x item_size` and zero fills it.
    ///
    /// The storage is always reallocated, nothing of the previous content survives.
    pub fn allocate(&mut self, batch_size: usize, item_size: usize) -> Result<()> {
        *self = Self::zeros(batch_size, item_size)?;
        Ok(())
    }

    /// Resizes the storage keeping the overlapping top-left region of the previous content,
    /// the rest is zero filled.
    pub fn allocate_preserving(&mut self, batch_size: usize, item_size: usize) -> Result<()> {
        let mut next = Self::zeros(batch_size, item_size)?;
        let rows = batch_size.min(self.rows());
        let cols = item_size.min(self.cols());
        next.data
            .slice_mut(s![..rows, ..cols])
            .assign(&self.data.slice(s![..rows, ..cols]));

        *self = next;
        Ok(())
    }

    /// Resizes the storage and fills it uniformly in `[-INIT_RANGE, INIT_RANGE]`.
    pub fn allocate_random<R: Rng + ?Sized>(
        &mut self,
        batch_size: usize,
        item_size: usize,
        rng: &mut R,
    ) -> Result<()> {
        *self = Self::random(batch_size, item_size, rng)?;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// The amount of vectors when read as a batch.
    pub fn batch_size(&self) -> usize {
        self.rows()
    }

    /// The length of every vector when read as a batch.
    pub fn item_size(&self) -> usize {
        self.cols()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f32> {
        self.data.view_mut()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// Returns the `i`-th row, that is the `i`-th vector of the batch.
    pub fn row(&self, i: usize) -> Option<ArrayView1<'_, f32>> {
        (i < self.rows()).then(|| self.data.row(i))
    }

    pub fn column(&self, j: usize) -> Option<ArrayView1<'_, f32>> {
        (j < self.cols()).then(|| self.data.column(j))
    }

    /// Overwrites the `i`-th row with `values`.
    pub fn set_row(&mut self, i: usize, values: &[f32]) -> Result<()> {
        if i >= self.rows() {
            return Err(MlErr::ShapeMismatch {
                what: "row index",
                got: i,
                expected: self.rows(),
            });
        }

        if values.len() != self.cols() {
            return Err(MlErr::ShapeMismatch {
                what: "row length",
                got: values.len(),
                expected: self.cols(),
            });
        }

        self.data
            .row_mut(i)
            .iter_mut()
            .zip(values)
            .for_each(|(dst, &src)| *dst = src);

        Ok(())
    }

    /// Iterates over the elements in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.data.iter()
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn zero_fill(&mut self) {
        self.fill(0.);
    }

    pub fn scale_in_place(&mut self, alpha: f32) {
        self.data.mapv_inplace(|x| alpha * x);
    }

    pub fn square_in_place(&mut self) {
        self.data.mapv_inplace(|x| x * x);
    }

    /// Elementwise `self = a ⊙ b`.
    pub fn assign_hadamard(&mut self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<()> {
        check_same_shape("hadamard lhs", self.shape(), a.dim())?;
        check_same_shape("hadamard rhs", self.shape(), b.dim())?;

        Zip::from(self.data.view_mut())
            .and(a)
            .and(b)
            .for_each(|out, &a, &b| *out = a * b);

        Ok(())
    }

    /// Elementwise `self - other` into a new `Buffer`.
    pub fn sub(&self, other: ArrayView2<f32>) -> Result<Buffer> {
        check_same_shape("subtraction", self.shape(), other.dim())?;
        Ok(Buffer::from(&self.data - &other))
    }

    /// Adds `bias`, a single row, to every row of the batch.
    pub fn add_row_to_each_row(&mut self, bias: &Buffer) -> Result<()> {
        check_same_shape("bias", (1, self.cols()), bias.shape())?;
        self.data += &bias.data;
        Ok(())
    }

    /// Averages the batch over its samples into a single row.
    pub fn mean_over_batch(&self) -> Result<Buffer> {
        let mean = self
            .data
            .mean_axis(Axis(0))
            .ok_or(MlErr::DomainError("mean over an empty batch"))?;

        Ok(Buffer::from(mean.insert_axis(Axis(0))))
    }

    /// Whether every element is neither NaN nor infinite.
    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

pub(crate) fn check_same_shape(
    what: &'static str,
    expected: (usize, usize),
    got: (usize, usize),
) -> Result<()> {
    if expected.0 != got.0 {
        return Err(MlErr::ShapeMismatch {
            what,
            got: got.0,
            expected: expected.0,
        });
    }

    if expected.1 != got.1 {
        return Err(MlErr::ShapeMismatch {
            what,
            got: got.1,
            expected: expected.1,
        });
    }

    Ok(())
}
