//! Protobuf wire level editing.
//!
//! Decoding into generated types drops every field the schema does not know
//! about. Working on the encoded bytes lets a single nested field change
//! while all other bytes are copied through as they were.
use std::ops::Range;

use anyhow::{bail, ensure};
use prost::encoding::{decode_key, decode_varint, encode_key, encode_varint, WireType};
use tract_core::prelude::*;

/// One top level field of an encoded message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub number: u32,
    pub wire_type: WireType,
    /// Key, length prefix and payload.
    pub span: Range<usize>,
    pub payload: Range<usize>,
}

fn take(buf: &mut &[u8], total: usize, len: usize) -> TractResult<Range<usize>> {
    ensure!(buf.len() >= len, "Truncated field: {len} bytes expected, {} left", buf.len());
    let from = total - buf.len();
    *buf = &buf[len..];
    Ok(from..from + len)
}

/// Split an encoded message into its fields, in wire order.
pub fn fields(msg: &[u8]) -> TractResult<Vec<Field>> {
    let total = msg.len();
    let mut buf = msg;
    let mut fields = vec![];
    while !buf.is_empty() {
        let start = total - buf.len();
        let (number, wire_type) = decode_key(&mut buf)?;
        let payload = match wire_type {
            WireType::Varint => {
                let from = total - buf.len();
                decode_varint(&mut buf)?;
                from..total - buf.len()
            }
            WireType::SixtyFourBit => take(&mut buf, total, 8)?,
            WireType::ThirtyTwoBit => take(&mut buf, total, 4)?,
            WireType::LengthDelimited => {
                let len = decode_varint(&mut buf)? as usize;
                take(&mut buf, total, len)?
            }
            WireType::StartGroup | WireType::EndGroup => {
                bail!("Unsupported group encoding in field {number}")
            }
        };
        fields.push(Field { number, wire_type, span: start..payload.end, payload });
    }
    Ok(fields)
}

/// Rewrite the embedded message reached by `path`.
///
/// Each path element is a field number, the first length delimited
/// occurrence is followed at every level. `leaf` gets the payload of the
/// last one and returns its replacement. Enclosing length prefixes are
/// recomputed, everything else is copied. `None` if the path is absent.
pub fn rewrite_nested(
    msg: &[u8],
    path: &[u32],
    leaf: &dyn Fn(&[u8]) -> TractResult<Vec<u8>>,
) -> TractResult<Option<Vec<u8>>> {
    let Some((&number, rest)) = path.split_first() else {
        return leaf(msg).map(Some);
    };
    let Some(field) = fields(msg)?
        .into_iter()
        .find(|f| f.number == number && f.wire_type == WireType::LengthDelimited)
    else {
        return Ok(None);
    };
    let Some(inner) = rewrite_nested(&msg[field.payload.clone()], rest, leaf)? else {
        return Ok(None);
    };
    let mut out = Vec::with_capacity(msg.len() + inner.len());
    out.extend_from_slice(&msg[..field.span.start]);
    encode_key(number, WireType::LengthDelimited, &mut out);
    encode_varint(inner.len() as u64, &mut out);
    out.extend_from_slice(&inner);
    out.extend_from_slice(&msg[field.span.end..]);
    Ok(Some(out))
}
