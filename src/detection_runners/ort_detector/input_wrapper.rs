use anyhow::Result;
use ndarray::{Array, ArrayView2, Axis, Ix2, IxDyn};

/// Model tensor, wrapper over [`Array<f32, IxDyn>`]
#[derive(Debug, Clone, Default)]
pub struct X(pub Array<f32, IxDyn>);

impl From<Array<f32, IxDyn>> for X {
    fn from(x: Array<f32, IxDyn>) -> Self {
        Self(x)
    }
}

impl std::ops::Deref for X {
    type Target = Array<f32, IxDyn>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl X {
    pub fn from_shape_vec(shape: &[usize], xs: Vec<f32>) -> Result<Self> {
        Ok(Self::from(Array::from_shape_vec(shape, xs)?))
    }

    /// The `[rows, cols]` block for batch item `i` of a `[N, rows, cols]` tensor.
    pub fn batch_item(&self, i: usize) -> Result<ArrayView2<'_, f32>> {
        if self.0.ndim() != 3 {
            anyhow::bail!("Expected a [N, rows, cols] output, got shape {:?}", self.0.shape());
        }
        if i >= self.0.len_of(Axis(0)) {
            anyhow::bail!("Batch index {} out of range for shape {:?}", i, self.0.shape());
        }
        Ok(self.0.index_axis(Axis(0), i).into_dimensionality::<Ix2>()?)
    }

    pub fn batch_size(&self) -> usize {
        if self.0.ndim() == 0 {
            return 0;
        }
        self.0.len_of(Axis(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_item_is_a_2d_view() {
        let x = X::from_shape_vec(&[2, 3, 4], (0..24).map(|v| v as f32).collect()).unwrap();
        assert_eq!(x.batch_size(), 2);
        let second = x.batch_item(1).unwrap();
        assert_eq!(second.dim(), (3, 4));
        assert_eq!(second[[0, 0]], 12.);
        assert!(x.batch_item(2).is_err());
    }

    #[test]
    fn rank_other_than_three_is_rejected() {
        let x = X::from_shape_vec(&[6], vec![0.; 6]).unwrap();
        assert!(x.batch_item(0).is_err());
    }
}
