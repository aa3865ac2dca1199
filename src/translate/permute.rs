//! Rotary head permutation between HF and consolidated layouts
//!
//! Both runtimes split each attention head's rows into rotary pairs. The
//! consolidated runtime interleaves the pair halves `(x0, y0, x1, y1, ...)`
//! while HF stores them as two contiguous halves `(x0, x1, ..., y0, y1, ...)`.
//! Per head this is a reshape to `[2, half]` vs `[half, 2]` and a transpose.

use crate::checkpoint::WeightTensor;
use crate::error::{ConsolidateError, Result};
use ndarray::ArrayView4;

fn head_split(name: &str, w: &WeightTensor, n_heads: usize) -> Result<(usize, usize, usize)> {
    let (rows, cols) = w.dims2(name)?;
    if n_heads == 0 || rows % (n_heads * 2) != 0 {
        return Err(ConsolidateError::ShapeMismatch {
            name: format!("{name} (rows must split into {n_heads} heads of rotary pairs)"),
            expected: vec![n_heads * 2, cols],
            actual: vec![rows, cols],
        });
    }
    Ok((rows, cols, rows / n_heads / 2))
}

fn swap_middle_axes(name: &str, w: &WeightTensor, shape: (usize, usize, usize, usize)) -> Result<WeightTensor> {
    let view = ArrayView4::from_shape(shape, &w.data).map_err(|e| ConsolidateError::ShapeMismatch {
        name: format!("{name}: {e}"),
        expected: vec![shape.0, shape.1, shape.2, shape.3],
        actual: w.shape.clone(),
    })?;
    let data: Vec<f32> = view.permuted_axes([0, 2, 1, 3]).iter().copied().collect();
    WeightTensor::new(name, data, w.shape.clone())
}

/// Consolidated → HF: view `[n_heads, half, 2, cols]`, swap axes 1 and 2.
pub fn permute(name: &str, w: &WeightTensor, n_heads: usize) -> Result<WeightTensor> {
    let (_, cols, half) = head_split(name, w, n_heads)?;
    swap_middle_axes(name, w, (n_heads, half, 2, cols))
}

/// HF → consolidated: view `[n_heads, 2, half, cols]`, swap axes 1 and 2.
pub fn unpermute(name: &str, w: &WeightTensor, n_heads: usize) -> Result<WeightTensor> {
    let (_, cols, half) = head_split(name, w, n_heads)?;
    swap_middle_axes(name, w, (n_heads, 2, half, cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn iota(rows: usize, cols: usize) -> WeightTensor {
        let data = (0..rows * cols).map(|i| i as f32).collect();
        WeightTensor::new("w", data, vec![rows, cols]).unwrap()
    }

    fn row_ids(w: &WeightTensor) -> Vec<usize> {
        let cols = w.shape[1];
        w.data.chunks(cols).map(|r| r[0] as usize / cols).collect()
    }

    #[test]
    fn test_unpermute_interleaves_halves() {
        // One head, head_dim 4: HF rows [x0, x1, y0, y1] → [x0, y0, x1, y1]
        let out = unpermute("w", &iota(4, 1), 1).unwrap();
        assert_eq!(row_ids(&out), vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_permute_splits_pairs() {
        // One head, head_dim 6: [x0, y0, x1, y1, x2, y2] → [x0, x1, x2, y0, y1, y2]
        let out = permute("w", &iota(6, 2), 1).unwrap();
        assert_eq!(row_ids(&out), vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_heads_are_permuted_independently() {
        let out = unpermute("w", &iota(8, 3), 2).unwrap();
        assert_eq!(row_ids(&out), vec![0, 2, 1, 3, 4, 6, 5, 7]);
        assert_eq!(out.shape, vec![8, 3]);
    }

    #[test]
    fn test_columns_move_with_rows() {
        let out = unpermute("w", &iota(4, 2), 1).unwrap();
        assert_eq!(out.data, vec![0.0, 1.0, 4.0, 5.0, 2.0, 3.0, 6.0, 7.0]);
    }

    #[test]
    fn test_head_dim_two_is_identity() {
        let w = iota(6, 4);
        assert_eq!(unpermute("w", &w, 3).unwrap(), w);
    }

    #[test]
    fn test_indivisible_rows_rejected() {
        let err = unpermute("wq", &iota(6, 2), 2).unwrap_err();
        assert!(matches!(err, ConsolidateError::ShapeMismatch { .. }));
        assert!(unpermute("wq", &iota(4, 2), 0).is_err());
    }

    #[test]
    fn test_non_matrix_rejected() {
        let v = WeightTensor::new("norm", vec![0.0; 8], vec![8]).unwrap();
        assert!(unpermute("norm", &v, 2).is_err());
    }

    proptest! {
        #[test]
        fn prop_permute_inverts_unpermute(n_heads in 1usize..5, half in 1usize..5, cols in 1usize..6) {
            let w = iota(n_heads * half * 2, cols);
            let there = unpermute("w", &w, n_heads).unwrap();
            let back = permute("w", &there, n_heads).unwrap();
            prop_assert_eq!(back, w);
        }

        #[test]
        fn prop_unpermute_is_a_row_permutation(n_heads in 1usize..5, half in 1usize..5) {
            let w = iota(n_heads * half * 2, 3);
            let mut rows = row_ids(&unpermute("w", &w, n_heads).unwrap());
            rows.sort_unstable();
            prop_assert_eq!(rows, (0..n_heads * half * 2).collect::<Vec<_>>());
        }
    }
}
