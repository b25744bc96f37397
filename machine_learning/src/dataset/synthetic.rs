use ndarray::Array2;

use super::Dataset;
use crate::{MlErr, Result};

impl Dataset {
    /// Five samples of the line `y = 2x + 1` at `x ∈ {0, 1, 2, 3, 4}`.
    pub fn linear() -> Self {
        let x = Array2::from_shape_fn((5, 1), |(i, _)| i as f32);
        let y = x.mapv(|x| 2. * x + 1.);
        Self { x, y }
    }

    /// Sign classification over `len` evenly spaced points in `(-1, 1)`.
    ///
    /// Negative points are labeled `[1, 0]` and non negative ones `[0, 1]`.
    pub fn pos_neg(len: usize) -> Result<Self> {
        if len == 0 {
            return Err(MlErr::DomainError("empty synthetic dataset"));
        }

        let center = (len - 1) as f32 / 2.;
        let half = len as f32 / 2.;
        let x = Array2::from_shape_fn((len, 1), |(i, _)| (i as f32 - center) / half);
        let y = Array2::from_shape_fn((len, 2), |(i, j)| {
            let class = usize::from(x[(i, 0)] >= 0.);
            if class == j { 1. } else { 0. }
        });

        Ok(Self { x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_targets() {
        let dataset = Dataset::linear();

        assert_eq!(dataset.len(), 5);
        for i in 0..5 {
            let (x, y) = dataset.item(i).unwrap();
            assert_eq!(y[0], 2. * x[0] + 1.);
        }
    }

    #[test]
    fn pos_neg_labels_follow_the_sign() {
        let dataset = Dataset::pos_neg(10).unwrap();

        assert_eq!((dataset.x_size(), dataset.y_size()), (1, 2));
        for i in 0..dataset.len() {
            let (x, y) = dataset.item(i).unwrap();
            let expected = if x[0] < 0. { [1., 0.] } else { [0., 1.] };
            assert_eq!(y.to_vec(), expected.to_vec());
        }

        let negatives = dataset.y().column(0).sum();
        assert_eq!(negatives, 5.);
        assert!(Dataset::pos_neg(0).is_err());
    }
}
