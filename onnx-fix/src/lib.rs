//! Pin the batch dimension of an ONNX model.
//!
//! Exporters often leave the first dimension of a graph's input and output
//! symbolic (`N`, `batch_size`) or set to the training batch size. Runtimes
//! that want concrete shapes choke on that, so this rewrites it to a literal
//! value. The edit happens on the encoded bytes: every other byte of the
//! model, including fields tract's ONNX schema does not know, is kept.
#[macro_use]
extern crate log;

use std::path::Path;

use anyhow::ensure;
use prost::encoding::{encode_key, encode_varint, WireType};
use prost::Message;
use qrun_quant::{ensure_file_exists, QrunError};
use tract_core::prelude::*;
use tract_onnx::pb::tensor_shape_proto::dimension;
use tract_onnx::pb::{type_proto, ModelProto, ValueInfoProto};

pub mod wire;

pub const DEFAULT_BATCH_SIZE: i64 = 1;

// ModelProto.graph, GraphProto.input (11) or output (12), ValueInfoProto.type,
// TypeProto.tensor_type, TypeProto.Tensor.shape, TensorShapeProto.dim
const FIRST_INPUT_DIM: [u32; 6] = [7, 11, 2, 1, 2, 1];
const FIRST_OUTPUT_DIM: [u32; 6] = [7, 12, 2, 1, 2, 1];

// Dimension.dim_value and Dimension.dim_param
const DIM_VALUE: u32 = 1;
const DIM_PARAM: u32 = 2;

fn set_first_dim(info: &mut ValueInfoProto, what: &str, batch: i64) -> TractResult<()> {
    let name = info.name.clone();
    let dim = info
        .r#type
        .as_mut()
        .and_then(|t| match t.value.as_mut() {
            Some(type_proto::Value::TensorType(tensor)) => tensor.shape.as_mut(),
            _ => None,
        })
        .and_then(|shape| shape.dim.first_mut())
        .ok_or_else(|| QrunError::MissingShape(format!("{what} {name:?} has no tensor shape")))?;
    debug!("{what} {name:?}: first dimension {:?} becomes {batch}", dim.value);
    dim.value = Some(dimension::Value::DimValue(batch));
    Ok(())
}

/// Set the first dimension of the graph's first input and first output.
pub fn fix_batch_dim(model: &mut ModelProto, batch: i64) -> TractResult<()> {
    let graph = model
        .graph
        .as_mut()
        .ok_or_else(|| QrunError::MissingShape("model has no graph".to_string()))?;
    let input = graph
        .input
        .first_mut()
        .ok_or_else(|| QrunError::MissingShape("graph has no input".to_string()))?;
    set_first_dim(input, "input", batch)?;
    let output = graph
        .output
        .first_mut()
        .ok_or_else(|| QrunError::MissingShape("graph has no output".to_string()))?;
    set_first_dim(output, "output", batch)?;
    Ok(())
}

fn decode_model(bytes: &[u8]) -> TractResult<ModelProto> {
    ModelProto::decode(bytes)
        .map_err(|e| QrunError::ParseError(format!("decoding ONNX protobuf: {e}")).into())
}

/// Encoded `Dimension` holding `batch`, keeping its denotation and any
/// unknown field.
fn pin_dimension(dim: &[u8], batch: i64) -> TractResult<Vec<u8>> {
    let mut out = vec![];
    encode_key(DIM_VALUE, WireType::Varint, &mut out);
    encode_varint(batch as u64, &mut out);
    for field in wire::fields(dim)? {
        if field.number != DIM_VALUE && field.number != DIM_PARAM {
            out.extend_from_slice(&dim[field.span]);
        }
    }
    Ok(out)
}

/// Pin the batch dimension of an encoded model.
///
/// The model is decoded once to check it and report missing shapes, then
/// only the two `Dimension` messages are rewritten in the original bytes.
pub fn fix_batch_dim_bytes(bytes: &[u8], batch: i64) -> TractResult<Vec<u8>> {
    let mut expected = decode_model(bytes)?;
    fix_batch_dim(&mut expected, batch)?;
    let mut patched = bytes.to_vec();
    for (what, path) in [("input", &FIRST_INPUT_DIM), ("output", &FIRST_OUTPUT_DIM)] {
        patched = wire::rewrite_nested(&patched, path, &|dim| pin_dimension(dim, batch))?
            .ok_or_else(|| QrunError::MissingShape(format!("first {what} has no dimension")))?;
    }
    ensure!(
        decode_model(&patched)? == expected,
        "Rewritten model does not decode to the expected model"
    );
    Ok(patched)
}

pub fn read_model(path: impl AsRef<Path>) -> TractResult<ModelProto> {
    let path = path.as_ref();
    ensure_file_exists(path)?;
    let bytes = fs_err::read(path)?;
    decode_model(&bytes)
}

pub fn write_model(model: &ModelProto, path: impl AsRef<Path>) -> TractResult<()> {
    fs_err::write(path.as_ref(), model.encode_to_vec())?;
    Ok(())
}

/// Read `in_file`, pin its batch dimension, write it to `out_file`.
///
/// Both paths may be the same file.
pub fn fix_file(
    in_file: impl AsRef<Path>,
    out_file: impl AsRef<Path>,
    batch: i64,
) -> TractResult<()> {
    let in_file = in_file.as_ref();
    ensure_file_exists(in_file)?;
    let bytes = fs_err::read(in_file)?;
    let fixed = fix_batch_dim_bytes(&bytes, batch)
        .map_err(|e| e.context(format!("fixing {}", in_file.display())))?;
    fs_err::write(out_file.as_ref(), fixed)?;
    info!("Wrote {} with batch dimension {batch}", out_file.as_ref().display());
    Ok(())
}
