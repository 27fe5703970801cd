use thiserror::Error;

use crate::constant_pool::ConstantTag;

/// Broad category of a [`ClassFileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input ended before an expected field.
    Truncation,
    /// An unknown tag, frame type or element-value tag was found.
    MalformedTag,
    /// A length, offset or nesting depth is outside of its allowed range.
    Bounds,
    /// A constant pool index is absent, out of range or names the wrong kind of entry.
    Reference,
    /// A version-gated or name-based rule was violated.
    Semantic,
}

impl ErrorKind {
    /// Returns `false` for transport problems (the bytes ran out) and `true`
    /// for problems with the content itself.
    pub fn is_content(self) -> bool {
        self != ErrorKind::Truncation
    }
}

#[derive(Error, Debug)]
pub enum ClassFileError {
    #[error("Truncated input: {0}")]
    Truncated(#[from] std::io::Error),
    #[error("Invalid magic identifier: 0x{0:X}")]
    InvalidMagicIdentifier(u32),
    #[error("Invalid cp info tag: {0}")]
    InvalidCpInfoTag(u8),
    #[error("Invalid stack map frame type: {0}")]
    InvalidStackMapFrameType(u8),
    #[error("Invalid verification type info tag: {0}")]
    InvalidVerificationTypeTag(u8),
    #[error("Invalid element value tag: 0x{0:02X}")]
    InvalidElementValueTag(u8),
    #[error("Invalid type annotation target type: 0x{0:02X}")]
    InvalidTargetType(u8),
    #[error("Invalid modified UTF-8 in constant pool string")]
    InvalidModifiedUtf8,
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Invalid code length: {0}")]
    InvalidCodeLength(u32),
    #[error("Attribute {name} declares {declared} bytes but {actual} were decoded")]
    AttributeLengthMismatch {
        name: String,
        declared: u32,
        actual: u64,
    },
    #[error("Additional bytes found at the end of the stream: {0}")]
    TrailingData(usize),
    #[error("{context}: {offset} is outside of the code array (length {code_length})")]
    InvalidCodeOffset {
        context: &'static str,
        offset: u16,
        code_length: usize,
    },
    #[error("{context}: range starts at {start_pc} after its end {end_pc}")]
    InvalidCodeRange {
        context: &'static str,
        start_pc: u16,
        end_pc: u16,
    },
    #[error("Structure nested deeper than {0} levels")]
    NestingTooDeep(u16),

    #[error("{context}: constant pool index {index} is out of range")]
    InvalidConstantPoolIndex { context: &'static str, index: u16 },
    #[error("{context}: constant pool index {index} is the unusable half of a long or double")]
    UnusableConstantPoolEntry { context: &'static str, index: u16 },
    #[error("{context}: expected {expected} at index {index}, found {found}")]
    UnexpectedConstantPoolEntry {
        context: &'static str,
        index: u16,
        expected: String,
        found: ConstantTag,
    },

    #[error("Invalid method handle reference kind: {0}")]
    InvalidReferenceKind(u8),
    #[error("{0}")]
    Violation(String),
}

impl ClassFileError {
    pub fn kind(&self) -> ErrorKind {
        use ClassFileError::*;

        match self {
            Truncated(_) => ErrorKind::Truncation,
            InvalidMagicIdentifier(_)
            | InvalidCpInfoTag(_)
            | InvalidStackMapFrameType(_)
            | InvalidVerificationTypeTag(_)
            | InvalidElementValueTag(_)
            | InvalidTargetType(_)
            | InvalidModifiedUtf8
            | InvalidDescriptor(_) => ErrorKind::MalformedTag,
            InvalidCodeLength(_)
            | AttributeLengthMismatch { .. }
            | TrailingData(_)
            | InvalidCodeOffset { .. }
            | InvalidCodeRange { .. }
            | NestingTooDeep(_) => ErrorKind::Bounds,
            InvalidConstantPoolIndex { .. }
            | UnusableConstantPoolEntry { .. }
            | UnexpectedConstantPoolEntry { .. } => ErrorKind::Reference,
            InvalidReferenceKind(_) | Violation(_) => ErrorKind::Semantic,
        }
    }
}
