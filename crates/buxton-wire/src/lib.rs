//! # buxton-wire
//!
//! The framed request/response protocol shared by the daemon and every
//! client: the scalar [`value::Value`] type, key identity ([`key::Key`]),
//! operation/status codes ([`op`]), and the binary frame codec
//! ([`frame`]) that serializes them. Nothing in this crate touches a
//! socket — it is pure encode/decode, which is what makes it unit-testable
//! without a running daemon.

pub mod error;
pub mod frame;
pub mod key;
pub mod op;
pub mod value;

pub use error::{Result, WireError};
pub use frame::{decode_frame, decode_header, Frame, FrameHeader, Param, HEADER_LEN, MAGIC, MAX_PAYLOAD_LEN};
pub use key::Key;
pub use op::{OpCode, StatusCode};
pub use value::{values_equal_for_notification, TypeTag, Value};
