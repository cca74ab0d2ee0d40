use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{ensure, Context};
use qrun_quant::{ensure_file_exists, QrunError, QuantDType, QuantParams};
use serde::Serialize;
use tract_core::internal::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ModelFormat {
    Tflite,
    Onnx,
}

impl ModelFormat {
    /// Guess the format from the file extension.
    pub fn from_path(path: &Path) -> TractResult<ModelFormat> {
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("tflite") | Some("lite") => Ok(ModelFormat::Tflite),
            Some("onnx") => Ok(ModelFormat::Onnx),
            _ => Err(QrunError::UnsupportedFormat(format!(
                "can not guess model format of {}, use --format",
                path.display()
            ))
            .into()),
        }
    }
}

impl FromStr for ModelFormat {
    type Err = TractError;
    fn from_str(s: &str) -> TractResult<ModelFormat> {
        match s {
            "tflite" => Ok(ModelFormat::Tflite),
            "onnx" => Ok(ModelFormat::Onnx),
            _ => Err(QrunError::UnsupportedFormat(format!("model format {s}")).into()),
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFormat::Tflite => write!(f, "tflite"),
            ModelFormat::Onnx => write!(f, "onnx"),
        }
    }
}

/// Memory layout of an image input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Layout {
    /// `[n, h, w, c]`, the TFLite convention.
    Nhwc,
    /// `[n, c, h, w]`, the usual ONNX convention.
    Nchw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageGeometry {
    pub layout: Layout,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageGeometry {
    /// Locate the channel axis of a rank 4 image input.
    ///
    /// The channel axis is the one holding 1 or 3 values, looked up at the
    /// end first.
    pub fn from_shape(shape: &[usize]) -> TractResult<ImageGeometry> {
        let is_channels = |c: usize| c == 1 || c == 3;
        match *shape {
            [1, h, w, c] if is_channels(c) => {
                Ok(ImageGeometry { layout: Layout::Nhwc, height: h, width: w, channels: c })
            }
            [1, c, h, w] if is_channels(c) => {
                Ok(ImageGeometry { layout: Layout::Nchw, height: h, width: w, channels: c })
            }
            _ => Err(QrunError::UnsupportedFormat(format!(
                "input shape {shape:?} is not a single image with 1 or 3 channels"
            ))
            .into()),
        }
    }
}

/// Shape and quantization of the model's first input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InputSpec {
    pub shape: Vec<usize>,
    pub dtype: QuantDType,
    pub params: QuantParams,
}

impl InputSpec {
    pub fn image_geometry(&self) -> TractResult<ImageGeometry> {
        ImageGeometry::from_shape(&self.shape)
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Quantization of the model's first output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutputSpec {
    pub dtype: QuantDType,
    pub params: QuantParams,
}

/// A typed model along with the specs of the slots qrun talks to.
///
/// Specs are read once here and reused for every inference.
#[derive(Debug)]
pub struct LoadedModel {
    pub format: ModelFormat,
    pub model: TypedModel,
    pub input: InputSpec,
    pub output: OutputSpec,
}

impl LoadedModel {
    pub fn from_typed(format: ModelFormat, model: TypedModel) -> TractResult<LoadedModel> {
        ensure!(!model.inputs.is_empty(), "Model has no input");
        ensure!(!model.outputs.is_empty(), "Model has no output");
        let input_fact = model.input_fact(0)?;
        let shape = input_fact.shape.as_concrete().map(|s| s.to_vec()).ok_or_else(|| {
            QrunError::MissingShape(format!(
                "input shape {:?} is not concrete, fix the batch dimension (onnx-fix) first",
                input_fact.shape
            ))
        })?;
        let input = InputSpec {
            shape,
            dtype: QuantDType::from_datum_type(input_fact.datum_type)?,
            params: QuantParams::from_datum_type(input_fact.datum_type),
        };
        if input.is_empty() {
            return Err(QrunError::MissingShape(format!(
                "input shape {:?} holds no value",
                input.shape
            ))
            .into());
        }
        let output_dt = model.output_fact(0)?.datum_type;
        let output = OutputSpec {
            dtype: QuantDType::from_datum_type(output_dt)?,
            params: QuantParams::from_datum_type(output_dt),
        };
        debug!(
            "input {:?} {} ({}), output {} ({})",
            input.shape, input.dtype, input.params, output.dtype, output.params
        );
        Ok(LoadedModel { format, model, input, output })
    }
}

fn load_tflite(path: &Path) -> TractResult<TypedModel> {
    tract_tflite::tflite().model_for_path(path)
}

fn load_onnx(path: &Path) -> TractResult<TypedModel> {
    use tract_onnx::prelude::InferenceModelExt;
    tract_onnx::onnx().model_for_path(path)?.into_typed()?.into_decluttered()
}

/// Load a model file, guessing its format unless `format` is given.
pub fn load_model(path: impl AsRef<Path>, format: Option<ModelFormat>) -> TractResult<LoadedModel> {
    let path = path.as_ref();
    ensure_file_exists(path)?;
    let format = match format {
        Some(f) => f,
        None => ModelFormat::from_path(path)?,
    };
    info!("Loading {} model from {}", format, path.display());
    let model = match format {
        ModelFormat::Tflite => load_tflite(path),
        ModelFormat::Onnx => load_onnx(path),
    }
    .with_context(|| QrunError::ParseError(format!("reading {format} model {}", path.display())))?;
    LoadedModel::from_typed(format, model)
}
