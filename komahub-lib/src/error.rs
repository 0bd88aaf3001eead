use std::array::TryFromSliceError;
use thiserror::Error;

/// The primary error type for the `komahub-lib` library.
#[derive(Error, Debug)]
pub enum KomaError {
    #[error("Unknown command code: {0:#04x}")]
    UnknownCommand(u8),

    #[error("Command code {0:#04x} is in the opcode table and cannot be unrecognized")]
    KnownCommand(u8),

    #[error("END at position {index} would cut the sequence short")]
    EmbeddedEnd { index: usize },

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("{count} unexpected non-padding byte(s) after command")]
    TrailingBytes { count: usize },

    #[error("Output name is {len} bytes, at most 16 fit")]
    NameTooLong { len: usize },

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl From<TryFromSliceError> for KomaError {
    fn from(_: TryFromSliceError) -> Self {
        KomaError::InvalidPacket("Failed to convert slice to array".to_string())
    }
}
