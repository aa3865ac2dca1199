//! Folding LoRA updates into base weights: W' = W + scale * (B @ A)

use super::loader::LoraPair;
use crate::checkpoint::WeightTensor;
use crate::error::{ConsolidateError, Result};
use ndarray::{Array2, ArrayView2};

fn as_matrix<'a>(name: &str, t: &'a WeightTensor) -> Result<ArrayView2<'a, f32>> {
    let (rows, cols) = t.dims2(name)?;
    ArrayView2::from_shape((rows, cols), &t.data).map_err(|e| ConsolidateError::ShapeMismatch {
        name: format!("{name}: {e}"),
        expected: vec![rows, cols],
        actual: vec![t.data.len()],
    })
}

impl LoraPair {
    /// Dense update `scale * B @ A`, shaped like the base weight.
    ///
    /// With `fan_in_fan_out` the base stores `(d_in, d_out)`, so the update is
    /// transposed to match.
    pub fn delta(&self, name: &str, scale: f32, fan_in_fan_out: bool) -> Result<Array2<f32>> {
        let a = as_matrix(name, &self.a)?;
        let b = as_matrix(name, &self.b)?;
        if b.ncols() != a.nrows() {
            return Err(ConsolidateError::ShapeMismatch {
                name: format!("{name} (lora_B @ lora_A)"),
                expected: vec![b.nrows(), a.nrows()],
                actual: vec![b.nrows(), b.ncols()],
            });
        }

        let delta = b.dot(&a) * scale;
        Ok(if fan_in_fan_out { delta.reversed_axes() } else { delta })
    }
}

/// Add a pair's update into `base` in place.
pub fn merge_into(
    name: &str,
    base: &mut WeightTensor,
    pair: &LoraPair,
    scale: f32,
    fan_in_fan_out: bool,
) -> Result<()> {
    let (rows, cols) = base.dims2(name)?;
    let delta = pair.delta(name, scale, fan_in_fan_out)?;
    if delta.dim() != (rows, cols) {
        return Err(ConsolidateError::ShapeMismatch {
            name: name.to_string(),
            expected: vec![rows, cols],
            actual: vec![delta.nrows(), delta.ncols()],
        });
    }

    // Logical iteration order is row-major regardless of delta's memory layout
    for (w, d) in base.data.iter_mut().zip(delta.iter()) {
        *w += d;
    }
    Ok(())
}
