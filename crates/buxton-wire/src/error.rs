//! Error types shared by the codec.

/// Errors raised while decoding or encoding a frame or one of its parameters.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame's magic constant did not match [`crate::frame::MAGIC`].
    #[error("bad magic: expected {expected:#06x}, got {got:#06x}")]
    BadMagic { expected: u16, got: u16 },

    /// The op byte did not correspond to a known [`crate::op::OpCode`].
    #[error("unknown op code: {0:#06x}")]
    UnknownOp(u16),

    /// The declared payload length exceeds [`crate::frame::MAX_PAYLOAD_LEN`].
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(u32),

    /// Fewer bytes were available than the frame header requires.
    #[error("incomplete frame: need at least {0} bytes")]
    Incomplete(usize),

    /// A parameter's type tag did not correspond to a known [`crate::value::TypeTag`].
    #[error("unknown parameter type: {0:#010x}")]
    UnknownType(u32),

    /// A string parameter was not NUL-terminated within its declared length.
    #[error("string parameter not NUL-terminated")]
    UnterminatedString,

    /// A fixed-width parameter's declared length did not match its type's width.
    #[error("bad parameter length: type {0:?} expects {1} bytes, got {2}")]
    BadParamLength(crate::value::TypeTag, usize, usize),

    /// The group name was empty, or a key used in a context requiring a group
    /// name lacked one.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A required parameter was missing for the given op.
    #[error("missing parameter for op {0:?}")]
    MissingParameter(crate::op::OpCode),
}

pub type Result<T> = std::result::Result<T, WireError>;
