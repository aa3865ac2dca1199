//! Owned f32 tensor used while merging and reshaping.

use crate::error::{ConsolidateError, Result};

/// Row-major f32 tensor with its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTensor {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl WeightTensor {
    /// Create a tensor, checking that `data` fills `shape`.
    pub fn new(name: &str, data: Vec<f32>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ConsolidateError::ShapeMismatch {
                name: name.to_string(),
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { data, shape })
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// `(rows, cols)` of a matrix; errors for any other rank.
    pub fn dims2(&self, name: &str) -> Result<(usize, usize)> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            _ => Err(ConsolidateError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![0, 0],
                actual: self.shape.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_element_count() {
        assert!(WeightTensor::new("w", vec![0.0; 6], vec![2, 3]).is_ok());
        let err = WeightTensor::new("w", vec![0.0; 5], vec![2, 3]).unwrap_err();
        assert!(matches!(err, ConsolidateError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_dims2() {
        let t = WeightTensor::new("w", vec![0.0; 6], vec![2, 3]).unwrap();
        assert_eq!(t.dims2("w").unwrap(), (2, 3));
        assert_eq!(t.numel(), 6);

        let v = WeightTensor::new("norm", vec![0.0; 4], vec![4]).unwrap();
        assert!(v.dims2("norm").is_err());
    }
}
