//! Error taxonomy for the codec, mirroring the C-compatible error codes the
//! original `netcode` library exposes at its FFI boundary so any future
//! binding layer can map one to the other without re-deriving the set.

use thiserror::Error;

/// Errors surfaced at the encoder/decoder API boundary.
///
/// Every variant leaves the codec usable: the offending packet or admission
/// is discarded, internal state is left unchanged.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Unknown packet type tag, or a packet routed to the wrong side
    /// (e.g. an ack fed to a decoder).
    #[error("packet type error")]
    PacketTypeError,

    /// Framing would read past the bytes supplied to `on_incoming_packet`.
    #[error("overflow reading packet: need {needed} bytes, have {available}")]
    Overflow { needed: usize, available: usize },

    /// An admitted symbol's length violates the configured field's alignment.
    #[error("invalid symbol length {len} for field width {field_width}")]
    InvalidLength { len: usize, field_width: u8 },

    /// Allocation failure. Rust's global allocator aborts rather than
    /// returning this in practice; kept for parity with the C error surface.
    #[error("no memory available")]
    NoMemory,

    /// A decoded wire field is self-inconsistent, e.g. a repair's claimed
    /// field-element width doesn't match this side's configured field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Catch-all for states this crate does not otherwise name.
    #[error("unknown error: {0}")]
    UnknownError(String),
}

/// C-compatible error code, `#[repr(u8)]` for FFI parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    NoError = 0,
    PacketTypeError = 1,
    OverflowError = 2,
    InvalidLength = 3,
    NoMemory = 4,
    InvalidArgument = 5,
    UnknownError = 6,
}

impl From<&CodecError> for ErrorCode {
    fn from(e: &CodecError) -> Self {
        match e {
            CodecError::PacketTypeError => ErrorCode::PacketTypeError,
            CodecError::Overflow { .. } => ErrorCode::OverflowError,
            CodecError::InvalidLength { .. } => ErrorCode::InvalidLength,
            CodecError::NoMemory => ErrorCode::NoMemory,
            CodecError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            CodecError::UnknownError(_) => ErrorCode::UnknownError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(
            ErrorCode::from(&CodecError::PacketTypeError),
            ErrorCode::PacketTypeError
        );
        assert_eq!(
            ErrorCode::from(&CodecError::Overflow {
                needed: 4,
                available: 1
            }),
            ErrorCode::OverflowError
        );
    }
}
