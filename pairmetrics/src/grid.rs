//! Grid buffers the measure engines operate on.
//!
//! Grids are flat C-order buffers with an explicit shape, extracted once
//! from the input tensors and never mutated afterwards. All derived
//! artifacts (borders, labelings, distance fields) reuse the same layout.

use burn::tensor::{backend::Backend, Tensor};

use crate::error::{MeasureError, MeasureResult};

/// A hard (binary) mask over a 2-D or 3-D grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    shape: Vec<usize>,
    data: Vec<bool>,
}

impl Mask {
    /// Creates a mask from a shape and a C-order buffer.
    pub fn new(shape: Vec<usize>, data: Vec<bool>) -> MeasureResult<Self> {
        check_len(&shape, data.len())?;
        Ok(Self { shape, data })
    }

    /// Internal constructor for derived masks that reuse a validated shape.
    pub(crate) fn from_parts(shape: Vec<usize>, data: Vec<bool>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self { shape, data }
    }

    /// Extracts a mask from a float tensor, treating values above 0.5 as
    /// foreground.
    pub fn from_tensor<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> MeasureResult<Self> {
        let (shape, values) = tensor_values(tensor)?;
        let data = values.iter().map(|&v| v > 0.5).collect();
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[bool] {
        &self.data
    }

    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        self.data[idx]
    }

    /// Number of foreground voxels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }
}

/// A probability map over a 2-D or 3-D grid, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbMap {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl ProbMap {
    /// Creates a probability map from a shape and a C-order buffer.
    /// Values must be finite and lie in `[0, 1]`.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> MeasureResult<Self> {
        check_len(&shape, data.len())?;
        if data.iter().any(|&v| !(v.is_finite() && (0.0..=1.0).contains(&v))) {
            return Err(MeasureError::InvalidGrid {
                reason: "probability values must be finite and lie in [0, 1]".to_string(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Extracts a probability map from a float tensor.
    pub fn from_tensor<B: Backend, const D: usize>(tensor: &Tensor<B, D>) -> MeasureResult<Self> {
        let (shape, data) = tensor_values(tensor)?;
        Self::new(shape, data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn get(&self, idx: usize) -> f64 {
        self.data[idx]
    }
}

/// C-order strides for a shape.
pub(crate) fn c_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Decomposes a flat C-order index into per-axis coordinates.
pub(crate) fn unravel(mut idx: usize, shape: &[usize]) -> Vec<usize> {
    let mut coords = vec![0; shape.len()];
    for axis in (0..shape.len()).rev() {
        coords[axis] = idx % shape[axis];
        idx /= shape[axis];
    }
    coords
}

fn check_len(shape: &[usize], len: usize) -> MeasureResult<()> {
    let expected: usize = shape.iter().product();
    if expected != len {
        return Err(MeasureError::InvalidGrid {
            reason: format!("shape {shape:?} implies {expected} voxels, buffer holds {len}"),
        });
    }
    Ok(())
}

fn tensor_values<B: Backend, const D: usize>(
    tensor: &Tensor<B, D>,
) -> MeasureResult<(Vec<usize>, Vec<f64>)> {
    let shape = tensor.dims().to_vec();
    let data = tensor.to_data().convert::<f64>();
    let values = data
        .to_vec::<f64>()
        .map_err(|err| MeasureError::TensorData { reason: format!("{err:?}") })?;
    Ok((shape, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_rejects_inconsistent_buffer() {
        let result = Mask::new(vec![2, 3], vec![true; 5]);
        assert!(matches!(result, Err(MeasureError::InvalidGrid { .. })));
    }

    #[test]
    fn prob_map_rejects_out_of_range_values() {
        let result = ProbMap::new(vec![1, 2], vec![0.5, 1.5]);
        assert!(matches!(result, Err(MeasureError::InvalidGrid { .. })));
    }

    #[test]
    fn strides_and_unravel_agree() {
        let shape = [2, 3, 4];
        let strides = c_strides(&shape);
        assert_eq!(strides, vec![12, 4, 1]);

        let coords = unravel(17, &shape);
        assert_eq!(coords, vec![1, 1, 1]);
        let flat: usize = coords.iter().zip(&strides).map(|(c, s)| c * s).sum();
        assert_eq!(flat, 17);
    }

    #[test]
    fn mask_counts_foreground() {
        let mask = Mask::new(vec![2, 2], vec![true, false, true, false]).unwrap();
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.rank(), 2);
    }
}
