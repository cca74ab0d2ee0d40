use std::fmt;

use serde::Serialize;
use tract_core::internal::*;

use crate::errors::QrunError;

/// Affine quantization parameters of a tensor slot.
///
/// A real value `x` is stored as `q = round(x / scale + zero_point)`. A
/// scale of zero marks a slot that is not quantized at all.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct QuantParams {
    pub scale: f64,
    pub zero_point: i32,
}

impl QuantParams {
    pub const UNQUANTIZED: QuantParams = QuantParams { scale: 0.0, zero_point: 0 };

    pub fn new(scale: f64, zero_point: i32) -> QuantParams {
        QuantParams { scale, zero_point }
    }

    pub fn is_unquantized(&self) -> bool {
        self.scale == 0.0
    }

    /// Parameters attached to a (possibly quantized) tract datum type.
    ///
    /// Plain types, float or integer, report `UNQUANTIZED`.
    pub fn from_datum_type(dt: DatumType) -> QuantParams {
        match dt.qparams() {
            Some(qp) => {
                let (zero_point, scale) = qp.zp_scale();
                QuantParams::new(scale as f64, zero_point)
            }
            None => QuantParams::UNQUANTIZED,
        }
    }

    /// Quantized tract datum type for storage type `dt`.
    pub fn quantized_datum_type(&self, dt: QuantDType) -> DatumType {
        match dt {
            QuantDType::F32 => f32::datum_type(),
            _ => dt.datum_type().with_zp_scale(self.zero_point, self.scale as f32),
        }
    }
}

impl fmt::Display for QuantParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unquantized() {
            write!(f, "unquantized")
        } else {
            write!(f, "scale: {} zero_point: {}", self.scale, self.zero_point)
        }
    }
}

/// Storage type of a model tensor slot, as far as quantization goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum QuantDType {
    F32,
    U8,
    I8,
}

impl QuantDType {
    pub fn from_datum_type(dt: DatumType) -> TractResult<QuantDType> {
        match dt.unquantized() {
            DatumType::F32 => Ok(QuantDType::F32),
            DatumType::U8 => Ok(QuantDType::U8),
            DatumType::I8 => Ok(QuantDType::I8),
            _ => Err(QrunError::UnsupportedDType(dt).into()),
        }
    }

    pub fn datum_type(&self) -> DatumType {
        match self {
            QuantDType::F32 => f32::datum_type(),
            QuantDType::U8 => u8::datum_type(),
            QuantDType::I8 => i8::datum_type(),
        }
    }

    /// Inclusive range of representable integer values.
    pub fn range(&self) -> Option<(i32, i32)> {
        match self {
            QuantDType::F32 => None,
            QuantDType::U8 => Some((u8::MIN as i32, u8::MAX as i32)),
            QuantDType::I8 => Some((i8::MIN as i32, i8::MAX as i32)),
        }
    }
}

impl fmt::Display for QuantDType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuantDType::F32 => "f32",
            QuantDType::U8 => "u8",
            QuantDType::I8 => "i8",
        };
        write!(f, "{name}")
    }
}
