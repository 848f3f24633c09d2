//! The scalar value type and its on-wire / on-disk encoding.
//!
//! A [`Value`] is a tagged union over nine variants. The same encoding is
//! used both for a single wire parameter and for a persisted entry's value
//! (`buxton-backend` stores exactly the bytes this module produces), so the
//! two never drift apart.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Result, WireError};

/// Wire/storage type tag. `#[repr(u32)]` because it is read and written as
/// a raw four-byte little-endian field, never through `serde`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TypeTag {
    String = 0,
    Int32 = 1,
    Int64 = 2,
    Uint32 = 3,
    Uint64 = 4,
    Float32 = 5,
    Float64 = 6,
    Bool = 7,
    Unset = 8,
}

/// Legacy wire tag for the pre-explicit-width ABI's "LONG" type (Open
/// Question #1 in spec.md §9). Accepted on decode, never emitted.
const LEGACY_LONG: u32 = 0x8001;
/// Legacy wire tag for the pre-explicit-width ABI's "INT" type.
const LEGACY_INT: u32 = 0x8002;

impl TypeTag {
    /// Parse a wire type tag, mapping legacy tags to their host-width
    /// equivalents.
    pub fn from_wire(tag: u32) -> Result<Self> {
        Ok(match tag {
            0 => TypeTag::String,
            1 => TypeTag::Int32,
            2 => TypeTag::Int64,
            3 => TypeTag::Uint32,
            4 => TypeTag::Uint64,
            5 => TypeTag::Float32,
            6 => TypeTag::Float64,
            7 => TypeTag::Bool,
            8 => TypeTag::Unset,
            LEGACY_LONG => TypeTag::Int64,
            LEGACY_INT => TypeTag::Int32,
            other => return Err(WireError::UnknownType(other)),
        })
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// A typed scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    /// Sentinel used only during client-initiated type discovery; never
    /// persisted.
    Unset,
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Str(_) => TypeTag::String,
            Value::Int32(_) => TypeTag::Int32,
            Value::Int64(_) => TypeTag::Int64,
            Value::Uint32(_) => TypeTag::Uint32,
            Value::Uint64(_) => TypeTag::Uint64,
            Value::Float32(_) => TypeTag::Float32,
            Value::Float64(_) => TypeTag::Float64,
            Value::Bool(_) => TypeTag::Bool,
            Value::Unset => TypeTag::Unset,
        }
    }

    /// Encode this value's payload bytes (without the `[type][length]`
    /// parameter prefix — see [`crate::frame::Param`]).
    pub fn encode_bytes(&self) -> Vec<u8> {
        match self {
            Value::Str(s) => {
                let mut bytes = s.clone().into_bytes();
                bytes.push(0);
                bytes
            }
            Value::Int32(v) => {
                let mut buf = Vec::with_capacity(4);
                buf.write_i32::<LittleEndian>(*v).expect("vec write");
                buf
            }
            Value::Int64(v) => {
                let mut buf = Vec::with_capacity(8);
                buf.write_i64::<LittleEndian>(*v).expect("vec write");
                buf
            }
            Value::Uint32(v) => {
                let mut buf = Vec::with_capacity(4);
                buf.write_u32::<LittleEndian>(*v).expect("vec write");
                buf
            }
            Value::Uint64(v) => {
                let mut buf = Vec::with_capacity(8);
                buf.write_u64::<LittleEndian>(*v).expect("vec write");
                buf
            }
            Value::Float32(v) => {
                let mut buf = Vec::with_capacity(4);
                buf.write_f32::<LittleEndian>(*v).expect("vec write");
                buf
            }
            Value::Float64(v) => {
                let mut buf = Vec::with_capacity(8);
                buf.write_f64::<LittleEndian>(*v).expect("vec write");
                buf
            }
            Value::Bool(v) => vec![if *v { 1 } else { 0 }],
            Value::Unset => Vec::new(),
        }
    }

    /// Decode a value's payload bytes given its type tag.
    pub fn decode_bytes(tag: TypeTag, bytes: &[u8]) -> Result<Self> {
        Ok(match tag {
            TypeTag::String => {
                let nul = bytes
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or(WireError::UnterminatedString)?;
                if nul != bytes.len() - 1 {
                    // Extra bytes after the terminator are not expected on
                    // this wire; the declared length must match exactly.
                    return Err(WireError::UnterminatedString);
                }
                let s = std::str::from_utf8(&bytes[..nul])
                    .map_err(|_| WireError::UnterminatedString)?
                    .to_string();
                Value::Str(s)
            }
            TypeTag::Int32 => {
                expect_len(tag, bytes, 4)?;
                Value::Int32(Cursor::new(bytes).read_i32::<LittleEndian>().expect("len checked"))
            }
            TypeTag::Int64 => {
                expect_len(tag, bytes, 8)?;
                Value::Int64(Cursor::new(bytes).read_i64::<LittleEndian>().expect("len checked"))
            }
            TypeTag::Uint32 => {
                expect_len(tag, bytes, 4)?;
                Value::Uint32(Cursor::new(bytes).read_u32::<LittleEndian>().expect("len checked"))
            }
            TypeTag::Uint64 => {
                expect_len(tag, bytes, 8)?;
                Value::Uint64(Cursor::new(bytes).read_u64::<LittleEndian>().expect("len checked"))
            }
            TypeTag::Float32 => {
                expect_len(tag, bytes, 4)?;
                Value::Float32(Cursor::new(bytes).read_f32::<LittleEndian>().expect("len checked"))
            }
            TypeTag::Float64 => {
                expect_len(tag, bytes, 8)?;
                Value::Float64(Cursor::new(bytes).read_f64::<LittleEndian>().expect("len checked"))
            }
            TypeTag::Bool => {
                expect_len(tag, bytes, 1)?;
                Value::Bool(bytes[0] != 0)
            }
            TypeTag::Unset => Value::Unset,
        })
    }
}

fn expect_len(tag: TypeTag, bytes: &[u8], want: usize) -> Result<()> {
    if bytes.len() != want {
        return Err(WireError::BadParamLength(tag, want, bytes.len()));
    }
    Ok(())
}

/// Byte-exact comparison used by the notification registry's dedup logic
/// (spec.md §4.4/§4.5, Open Question #2): integers compare by their
/// two's-complement bit pattern (i.e. ordinary equality, since Rust integers
/// already are two's-complement), floats compare by raw bit pattern so that
/// `NaN != NaN` and `-0.0 != +0.0`.
pub fn values_equal_for_notification(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Int32(x), Value::Int32(y)) => x == y,
        (Value::Int64(x), Value::Int64(y)) => x == y,
        (Value::Uint32(x), Value::Uint32(y)) => x == y,
        (Value::Uint64(x), Value::Uint64(y)) => x == y,
        (Value::Float32(x), Value::Float32(y)) => x.to_bits() == y.to_bits(),
        (Value::Float64(x), Value::Float64(y)) => x.to_bits() == y.to_bits(),
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Unset, Value::Unset) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let tag = v.type_tag();
        let bytes = v.encode_bytes();
        let decoded = Value::decode_bytes(tag, &bytes).expect("decode");
        assert_eq!(decoded, v);
    }

    #[test]
    fn roundtrips_all_variants() {
        roundtrip(Value::Str("hello".to_string()));
        roundtrip(Value::Str(String::new()));
        roundtrip(Value::Int32(-7));
        roundtrip(Value::Int64(i64::MIN));
        roundtrip(Value::Uint32(u32::MAX));
        roundtrip(Value::Uint64(u64::MAX));
        roundtrip(Value::Float32(-0.0));
        roundtrip(Value::Float64(f64::NAN.copysign(1.0)));
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
    }

    #[test]
    fn legacy_tags_map_to_explicit_widths() {
        assert_eq!(TypeTag::from_wire(LEGACY_LONG).unwrap(), TypeTag::Int64);
        assert_eq!(TypeTag::from_wire(LEGACY_INT).unwrap(), TypeTag::Int32);
    }

    #[test]
    fn unterminated_string_rejected() {
        let bytes = b"no terminator".to_vec();
        assert!(Value::decode_bytes(TypeTag::String, &bytes).is_err());
    }

    #[test]
    fn float_dedup_distinguishes_signed_zero() {
        assert!(!values_equal_for_notification(
            &Value::Float64(0.0),
            &Value::Float64(-0.0)
        ));
        assert!(values_equal_for_notification(
            &Value::Float64(1.5),
            &Value::Float64(1.5)
        ));
    }

    #[test]
    fn float_dedup_nan_never_equal() {
        assert!(!values_equal_for_notification(
            &Value::Float64(f64::NAN),
            &Value::Float64(f64::NAN)
        ));
    }
}

