use std::path::Path;

use qrun_quant::{ensure_file_exists, QrunError};
use tract_core::internal::*;

/// Parse a comma separated list of raw feature values.
pub fn parse_features(text: &str) -> TractResult<Vec<f32>> {
    text.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f32>().map_err(|e| {
                TractError::from(QrunError::ParseError(format!("feature value {token:?}: {e}")))
            })
        })
        .collect()
}

pub fn load_features(path: impl AsRef<Path>) -> TractResult<Vec<f32>> {
    let path = path.as_ref();
    ensure_file_exists(path)?;
    parse_features(&fs_err::read_to_string(path)?)
}

/// Lay raw features out in the model input shape.
pub fn features_to_tensor(features: &[f32], shape: &[usize]) -> TractResult<Tensor> {
    let expected = shape.iter().product::<usize>();
    if features.len() != expected {
        return Err(QrunError::ShapeMismatch {
            expected: shape.to_vec(),
            got: vec![features.len()],
        }
        .into());
    }
    Tensor::from_shape(shape, features)
}
