mod synthetic;

use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// A labeled collection of samples, one sample per row of `x` and its label in the same row
/// of `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset` from interleaved rows, every row holds the `x_size` features
    /// of a sample followed by its `y_size` label values.
    ///
    /// # Errors
    /// `ShapeMismatch` if `data` is not a whole amount of rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let row = x_size + y_size;
        if row == 0 || data.len() % row != 0 {
            return Err(MlErr::ShapeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: row,
            });
        }

        let len = data.len() / row;
        let got = data.len();
        let rows = Array2::from_shape_vec((len, row), data).map_err(|_| MlErr::ShapeMismatch {
            what: "dataset rows",
            got,
            expected: len * row,
        })?;

        Ok(Self {
            x: rows.slice(s![.., ..x_size]).to_owned(),
            y: rows.slice(s![.., x_size..]).to_owned(),
        })
    }

    /// Creates a new `Dataset` from already separated features and labels.
    pub fn from_parts(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::ShapeMismatch {
                what: "dataset labels",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    /// The amount of samples.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The width of every sample's features.
    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    /// The width of every sample's label.
    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// The features and the label of the `i`-th sample.
    pub fn item(&self, i: usize) -> Option<(ArrayView1<'_, f32>, ArrayView1<'_, f32>)> {
        (i < self.len()).then(|| (self.x.row(i), self.y.row(i)))
    }

    /// Iterates over consecutive batches of `batch_size` samples, the last one holds the
    /// remainder and may be smaller.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let size = batch_size.get();
        self.x
            .axis_chunks_iter(Axis(0), size)
            .zip(self.y.axis_chunks_iter(Axis(0), size))
    }

    /// Splits the samples in order into a training and a testing set, the training set
    /// takes `ceil(len * train_fraction)` of them.
    ///
    /// # Errors
    /// `DomainError` if `train_fraction` is not within `[0, 1]`.
    pub fn split(&self, train_fraction: f32) -> Result<(Dataset, Dataset)> {
        if !(0. ..=1.).contains(&train_fraction) {
            return Err(MlErr::DomainError("train fraction outside of [0, 1]"));
        }

        let len = self.len();
        let train_len = ((len as f32 * train_fraction).ceil() as usize).min(len);

        let train = Self {
            x: self.x.slice(s![..train_len, ..]).to_owned(),
            y: self.y.slice(s![..train_len, ..]).to_owned(),
        };
        let test = Self {
            x: self.x.slice(s![train_len.., ..]).to_owned(),
            y: self.y.slice(s![train_len.., ..]).to_owned(),
        };

        Ok((train, test))
    }

    /// Shuffles the samples, keeping every label with its features.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    fn dataset() -> Dataset {
        Dataset::new(
            vec![1., 10., 2., 20., 3., 30., 4., 40., 5., 50.],
            1,
            1,
        )
        .unwrap()
    }

    fn batch(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn interleaved_rows_are_separated() {
        let dataset = Dataset::new(vec![1., 2., 3., 4., 5., 6.], 2, 1).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!((dataset.x_size(), dataset.y_size()), (2, 1));
        assert_eq!(dataset.x(), array![[1., 2.], [4., 5.]]);
        assert_eq!(dataset.y(), array![[3.], [6.]]);
        assert!(Dataset::new(vec![1., 2.], 2, 1).is_err());
    }

    #[test]
    fn last_batch_holds_the_remainder() {
        let dataset = dataset();
        let sizes: Vec<_> = dataset.batches(batch(2)).map(|(x, _)| x.nrows()).collect();

        assert_eq!(sizes, vec![2, 2, 1]);

        let (x, y) = dataset.batches(batch(2)).last().unwrap();
        assert_eq!(x, array![[5.]]);
        assert_eq!(y, array![[50.]]);
    }

    #[test]
    fn split_rounds_the_training_set_up() {
        let (train, test) = dataset().split(0.5).unwrap();
        assert_eq!((train.len(), test.len()), (3, 2));
        assert_eq!(test.item(0).unwrap().1[0], 40.);

        let (train, test) = dataset().split(1.).unwrap();
        assert_eq!((train.len(), test.len()), (5, 0));
        assert!(test.is_empty());
        assert_eq!(test.x_size(), 1);

        assert!(dataset().split(1.5).is_err());
    }

    #[test]
    fn shuffle_keeps_samples_paired() {
        let mut dataset = dataset();
        let mut rng = StdRng::seed_from_u64(42);
        dataset.shuffle(&mut rng);

        assert_eq!(dataset.len(), 5);
        for i in 0..dataset.len() {
            let (x, y) = dataset.item(i).unwrap();
            assert_eq!(y[0], x[0] * 10.);
        }

        let mut other = self::dataset();
        other.shuffle(&mut StdRng::seed_from_u64(42));
        assert_eq!(dataset, other);
    }
}
