use std::fmt;
use std::time::{Duration, Instant};

use anyhow::ensure;
use qrun_quant::{dequantize, quantize, QrunError};
use serde::Serialize;
use tract_core::internal::*;
use tract_ndarray::ArrayViewD;

use crate::delegate::{Delegate, Runnable};
use crate::labels::{top_k, Prediction};
use crate::model::{InputSpec, LoadedModel, ModelFormat, OutputSpec};

/// A model made runnable by a delegate, ready for repeated inference.
pub struct Classifier {
    runnable: Box<dyn Runnable>,
    pub format: ModelFormat,
    pub delegate: String,
    pub input: InputSpec,
    pub output: OutputSpec,
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("format", &self.format)
            .field("delegate", &self.delegate)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

impl Classifier {
    pub fn new(loaded: LoadedModel, delegate: &dyn Delegate) -> TractResult<Classifier> {
        let LoadedModel { format, model, input, output } = loaded;
        info!("Preparing model with {} delegate", delegate.name());
        let runnable = delegate.prepare(model)?;
        Ok(Classifier { runnable, format, delegate: delegate.name().into_owned(), input, output })
    }

    /// Quantize a real valued input the way the model's input slot expects.
    pub fn quantize_input(&self, input: &Tensor) -> TractResult<Tensor> {
        if input.shape() != self.input.shape.as_slice() {
            return Err(QrunError::ShapeMismatch {
                expected: self.input.shape.clone(),
                got: input.shape().to_vec(),
            }
            .into());
        }
        quantize(input, self.input.params, self.input.dtype)
    }

    /// quantize, invoke, dequantize
    pub fn classify(&self, input: &Tensor) -> TractResult<Report> {
        let quantized = self.quantize_input(input)?;
        let start = Instant::now();
        let mut outputs = self.runnable.run(tvec!(quantized.into_tvalue()))?;
        let elapsed = start.elapsed();
        ensure!(!outputs.is_empty(), "Model produced no output");
        let raw = outputs.remove(0).into_tensor();
        debug!("raw output {raw:?}");
        let scores = dequantize(&raw, self.output.params)?;
        Report::new(&scores, elapsed)
    }
}

/// What one inference produced.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub shape: Vec<usize>,
    pub scores: Vec<f32>,
    pub elapsed_ms: f64,
    pub predictions: Vec<Prediction>,
}

impl Report {
    pub fn new(scores: &Tensor, elapsed: Duration) -> TractResult<Report> {
        Ok(Report {
            shape: scores.shape().to_vec(),
            scores: scores.as_slice::<f32>()?.to_vec(),
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            predictions: vec![],
        })
    }

    pub fn with_top_k(mut self, k: usize, labels: Option<&[String]>) -> Report {
        self.predictions = top_k(&self.scores, k, labels);
        self
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match ArrayViewD::from_shape(self.shape.as_slice(), self.scores.as_slice()) {
            Ok(view) => writeln!(f, "f_output {view}")?,
            Err(_) => writeln!(f, "f_output {:?}", self.scores)?,
        }
        for p in &self.predictions {
            match &p.label {
                Some(label) => writeln!(f, "{:>6} {:<24} {:.5}", p.index, label, p.score)?,
                None => writeln!(f, "{:>6} {:.5}", p.index, p.score)?,
            }
        }
        write!(f, "took {} ms.", self.elapsed_ms.round() as u64)
    }
}
