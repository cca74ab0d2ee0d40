use num_traits::AsPrimitive;
use tract_core::internal::*;

use crate::errors::QrunError;
use crate::params::{QuantDType, QuantParams};

#[inline]
fn affine(x: f32, params: QuantParams) -> f64 {
    (x as f64 / params.scale + params.zero_point as f64).round_ties_even()
}

pub fn quantize_f32_u8(x: f32, params: QuantParams) -> u8 {
    affine(x, params).clamp(u8::MIN as f64, u8::MAX as f64) as u8
}

pub fn quantize_f32_i8(x: f32, params: QuantParams) -> i8 {
    affine(x, params).clamp(i8::MIN as f64, i8::MAX as f64) as i8
}

pub fn dequantize_to_f32<T: AsPrimitive<i64>>(q: T, params: QuantParams) -> f32 {
    ((q.as_() - params.zero_point as i64) as f64 * params.scale) as f32
}

/// Maps a float tensor to the integer representation of a quantized slot.
///
/// Unquantized parameters (scale of zero) or an `F32` target leave the
/// tensor untouched. The result carries `params` in its datum type.
pub fn quantize(input: &Tensor, params: QuantParams, dt: QuantDType) -> TractResult<Tensor> {
    if input.datum_type() != f32::datum_type() {
        return Err(QrunError::UnsupportedDType(input.datum_type()).into());
    }
    if params.is_unquantized() {
        trace!("scale is zero, passing {:?} through", input.shape());
        return Ok(input.clone());
    }
    let xs = input.as_slice::<f32>()?;
    let mut output = match dt {
        QuantDType::F32 => return Ok(input.clone()),
        QuantDType::U8 => {
            let qs: Vec<u8> = xs.iter().map(|&x| quantize_f32_u8(x, params)).collect();
            Tensor::from_shape(input.shape(), &qs)?
        }
        QuantDType::I8 => {
            let qs: Vec<i8> = xs.iter().map(|&x| quantize_f32_i8(x, params)).collect();
            Tensor::from_shape(input.shape(), &qs)?
        }
    };
    unsafe { output.set_datum_type(params.quantized_datum_type(dt)) };
    Ok(output)
}

fn dequantize_t<T: Datum + AsPrimitive<i64>>(
    input: &Tensor,
    params: QuantParams,
) -> TractResult<Tensor> {
    let fs: Vec<f32> =
        input.as_slice::<T>()?.iter().map(|&q| dequantize_to_f32(q, params)).collect();
    Tensor::from_shape(input.shape(), &fs)
}

/// Maps the integer output of a quantized slot back to real values.
///
/// Float tensors pass through unchanged.
pub fn dequantize(input: &Tensor, params: QuantParams) -> TractResult<Tensor> {
    match input.datum_type().unquantized() {
        DatumType::F32 => Ok(input.clone()),
        DatumType::U8 => dequantize_t::<u8>(input, params),
        DatumType::I8 => dequantize_t::<i8>(input, params),
        DatumType::I32 => dequantize_t::<i32>(input, params),
        _ => Err(QrunError::UnsupportedDType(input.datum_type()).into()),
    }
}

/// Dequantizes with the parameters carried by the tensor's own datum type.
///
/// Plain integer tensors are converted as-is (scale one, zero point zero).
pub fn dequantize_with_own_params(input: &Tensor) -> TractResult<Tensor> {
    let params = match input.datum_type().qparams() {
        Some(_) => QuantParams::from_datum_type(input.datum_type()),
        None => QuantParams::new(1.0, 0),
    };
    dequantize(input, params)
}
