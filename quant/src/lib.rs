//! Affine quantization for 8-bit classifiers.
//!
//! Quantized models store a real value `x` as `q = round(x / scale + zero_point)`
//! in a `u8` or `i8` slot. This crate moves float tensors in and out of that
//! representation, using the parameters the model declares for the slot.
#[macro_use]
extern crate log;

pub mod errors;
pub mod params;
pub mod transform;

pub use self::errors::{ensure_file_exists, kind_of, QrunError};
pub use self::params::{QuantDType, QuantParams};
pub use self::transform::{
    dequantize, dequantize_to_f32, dequantize_with_own_params, quantize, quantize_f32_i8,
    quantize_f32_u8,
};
