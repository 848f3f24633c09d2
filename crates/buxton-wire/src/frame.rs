//! Frame codec — spec.md §4.1.
//!
//! `[magic:u16][op:u16][message-id:u32][payload-length:u32][param-count:u32][param*]`,
//! each param `[type:u32][length:u32][bytes]`. The fixed-size header (up to
//! and including `param-count`) is always [`HEADER_LEN`] bytes; `payload-length`
//! is the byte size of everything after the header, i.e. the serialized
//! params. This lines up directly with the two-phase session read in
//! spec.md §4.6: read `HEADER_LEN` bytes, decode `payload-length`, then read
//! exactly that many more bytes before dispatching.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Result, WireError};
use crate::op::OpCode;
use crate::value::{TypeTag, Value};

/// "BuxtOn ConSole" — arbitrary but fixed, rejects stray traffic per spec §4.1.
pub const MAGIC: u16 = 0xB0C5;

/// Bytes in `[magic][op][message-id][payload-length][param-count]`.
pub const HEADER_LEN: usize = 2 + 2 + 4 + 4 + 4;

/// Hard ceiling on a frame's declared payload size — spec §4.1: "a few megabytes".
pub const MAX_PAYLOAD_LEN: u32 = 4 * 1024 * 1024;

/// A single typed wire parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub tag: TypeTag,
    pub bytes: Vec<u8>,
}

impl Param {
    pub fn from_value(value: &Value) -> Self {
        Param {
            tag: value.type_tag(),
            bytes: value.encode_bytes(),
        }
    }

    pub fn into_value(&self) -> Result<Value> {
        Value::decode_bytes(self.tag, &self.bytes)
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.write_u32::<LittleEndian>(self.tag.to_wire()).expect("vec write");
        out.write_u32::<LittleEndian>(self.bytes.len() as u32).expect("vec write");
        out.extend_from_slice(&self.bytes);
    }

    /// Encode this single parameter's `[type][length][bytes]` triple in
    /// isolation. The persistent backend stores exactly these bytes
    /// (spec.md §4.2: "the same tagged encoding used on the wire for a
    /// single parameter, so values round-trip through the codec without
    /// transformation").
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.bytes.len());
        self.write_to(&mut out);
        out
    }

    /// Inverse of [`Param::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(WireError::Incomplete(8));
        }
        let mut cursor = Cursor::new(bytes);
        let tag = TypeTag::from_wire(cursor.read_u32::<LittleEndian>().expect("len checked"))?;
        let len = cursor.read_u32::<LittleEndian>().expect("len checked") as usize;
        let pos = cursor.position() as usize;
        if bytes.len() - pos != len {
            return Err(WireError::Incomplete(8 + len));
        }
        let payload = bytes[pos..].to_vec();
        if tag == TypeTag::String {
            crate::frame::validate_string_param(&payload)?;
        }
        Ok(Param { tag, bytes: payload })
    }
}

/// The decoded fixed-size header, enough to know how many more bytes a
/// session needs to accumulate before the frame can be fully decoded.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub op: OpCode,
    pub message_id: u32,
    pub payload_len: u32,
    pub param_count: u32,
}

impl FrameHeader {
    /// Total bytes the frame occupies on the wire, header included.
    pub fn total_len(&self) -> usize {
        HEADER_LEN + self.payload_len as usize
    }
}

/// A fully decoded request/response/push frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub op: OpCode,
    pub message_id: u32,
    pub params: Vec<Param>,
}

impl Frame {
    pub fn new(op: OpCode, message_id: u32, params: Vec<Param>) -> Self {
        Frame { op, message_id, params }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut params_bytes = Vec::new();
        for param in &self.params {
            param.write_to(&mut params_bytes);
        }
        let mut out = Vec::with_capacity(HEADER_LEN + params_bytes.len());
        out.write_u16::<LittleEndian>(MAGIC).expect("vec write");
        out.write_u16::<LittleEndian>(self.op.to_wire()).expect("vec write");
        out.write_u32::<LittleEndian>(self.message_id).expect("vec write");
        out.write_u32::<LittleEndian>(params_bytes.len() as u32).expect("vec write");
        out.write_u32::<LittleEndian>(self.params.len() as u32).expect("vec write");
        out.extend_from_slice(&params_bytes);
        out
    }
}

/// Decode just the fixed header, validating magic, op, and the payload
/// ceiling. Does not touch the params — callers use [`FrameHeader::total_len`]
/// to know how many more bytes to accumulate.
pub fn decode_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::Incomplete(HEADER_LEN));
    }
    let mut cursor = Cursor::new(buf);
    let magic = cursor.read_u16::<LittleEndian>().expect("len checked");
    if magic != MAGIC {
        return Err(WireError::BadMagic { expected: MAGIC, got: magic });
    }
    let op = OpCode::from_wire(cursor.read_u16::<LittleEndian>().expect("len checked"))?;
    let message_id = cursor.read_u32::<LittleEndian>().expect("len checked");
    let payload_len = cursor.read_u32::<LittleEndian>().expect("len checked");
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(WireError::PayloadTooLarge(payload_len));
    }
    let param_count = cursor.read_u32::<LittleEndian>().expect("len checked");
    Ok(FrameHeader { op, message_id, payload_len, param_count })
}

/// Decode a complete frame from a buffer holding exactly
/// `header.total_len()` bytes (callers obtain `header` from [`decode_header`]
/// first). Never commits partial state: either a fully populated [`Frame`]
/// comes back, or an error and the buffer is left for the caller to discard.
pub fn decode_frame(buf: &[u8]) -> Result<Frame> {
    let header = decode_header(buf)?;
    if buf.len() < header.total_len() {
        return Err(WireError::Incomplete(header.total_len()));
    }
    let mut cursor = Cursor::new(&buf[HEADER_LEN..header.total_len()]);
    let mut params = Vec::with_capacity(header.param_count as usize);
    for _ in 0..header.param_count {
        let tag_raw = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| WireError::Incomplete(header.total_len()))?;
        let tag = TypeTag::from_wire(tag_raw)?;
        let len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| WireError::Incomplete(header.total_len()))? as usize;
        let pos = cursor.position() as usize;
        let remaining = cursor.get_ref().len().saturating_sub(pos);
        if len > remaining {
            return Err(WireError::Incomplete(header.total_len()));
        }
        let bytes = cursor.get_ref()[pos..pos + len].to_vec();
        cursor.set_position((pos + len) as u64);
        if tag == TypeTag::String {
            validate_string_param(&bytes)?;
        }
        params.push(Param { tag, bytes });
    }
    Ok(Frame { op: header.op, message_id: header.message_id, params })
}

fn validate_string_param(bytes: &[u8]) -> Result<()> {
    match bytes.iter().position(|b| *b == 0) {
        Some(idx) if idx == bytes.len() - 1 => Ok(()),
        _ => Err(WireError::UnterminatedString),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::new(
            OpCode::Set,
            7,
            vec![
                Param::from_value(&Value::Str("base".into())),
                Param::from_value(&Value::Str("demo.count".into())),
                Param::from_value(&Value::Int32(42)),
            ],
        )
    }

    #[test]
    fn roundtrips() {
        let frame = sample_frame();
        let encoded = frame.encode();
        let header = decode_header(&encoded).unwrap();
        assert_eq!(header.total_len(), encoded.len());
        let decoded = decode_frame(&encoded).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut encoded = sample_frame().encode();
        encoded[0] ^= 0xff;
        assert!(matches!(decode_header(&encoded), Err(WireError::BadMagic { .. })));
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut encoded = sample_frame().encode();
        encoded[4..8].copy_from_slice(&(MAX_PAYLOAD_LEN + 1).to_le_bytes());
        assert!(matches!(decode_header(&encoded), Err(WireError::PayloadTooLarge(_))));
    }

    #[test]
    fn rejects_truncated_header() {
        let encoded = sample_frame().encode();
        assert!(matches!(decode_header(&encoded[..8]), Err(WireError::Incomplete(_))));
    }

    #[test]
    fn rejects_unterminated_string() {
        let mut param = Param::from_value(&Value::Str("oops".into()));
        param.bytes.pop();
        let frame = Frame::new(OpCode::Get, 1, vec![param]);
        let encoded = frame.encode();
        assert!(matches!(decode_frame(&encoded), Err(WireError::UnterminatedString)));
    }

    #[test]
    fn header_total_len_drives_two_phase_read() {
        let encoded = sample_frame().encode();
        let header = decode_header(&encoded[..HEADER_LEN]).unwrap();
        assert_eq!(header.total_len(), encoded.len());
    }

    #[test]
    fn single_param_roundtrips_for_storage() {
        let param = Param::from_value(&Value::Float64(-0.0));
        let encoded = param.encode();
        let decoded = Param::decode(&encoded).unwrap();
        assert_eq!(decoded, param);
    }
}
