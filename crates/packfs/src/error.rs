//! Volume error types

use thiserror::Error;

/// Error type for volume operations
#[derive(Debug, Error)]
pub enum VolumeError {
    /// Record magic does not match the sentinel; the image is corrupt
    #[error("invalid record magic at offset {offset:#x}: expected 0x73665345, got {found:#010x}")]
    InvalidMagic {
        /// Offset of the record header within the volume
        offset: usize,
        /// Magic value that was read
        found: u32,
    },

    /// Record framing extends past the end of the volume
    #[error("truncated volume at offset {offset:#x}: need {needed} bytes, {available} available")]
    Truncated {
        /// Offset where the read was attempted
        offset: usize,
        /// Number of bytes the record requires
        needed: usize,
        /// Number of bytes left in the volume
        available: usize,
    },

    /// Name slot is wider than the configured maximum
    #[error("name slot at offset {offset:#x} is {len} bytes (maximum is {max})")]
    NameTooLong {
        /// Offset of the record header
        offset: usize,
        /// Declared slot width
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// Streaming payload is too short to carry its decoder parameter byte
    #[error("compressed record at offset {offset:#x} has no decoder parameters")]
    MissingCodecParameters {
        /// Offset of the record header
        offset: usize,
    },

    /// No record with the requested name before the terminal record
    #[error("file not found: {0}")]
    NotFound(String),

    /// Compression tag outside the known set
    #[error("unsupported compression tag: {0}")]
    UnsupportedCompression(u8),

    /// Decoder parameters outside the range the codec accepts
    #[error("invalid codec parameters: window {window_bits} bits, lookahead {lookahead_bits} bits")]
    InvalidCodecParameters {
        /// Window size exponent
        window_bits: u8,
        /// Lookahead size exponent
        lookahead_bits: u8,
    },

    /// Decoder state could not be allocated
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// Volume options rejected at construction
    #[error("invalid volume options: {0}")]
    InvalidOptions(String),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl VolumeError {
    /// Whether this error means the volume image itself is corrupt.
    ///
    /// Format errors are terminal: the scan is aborted and retrying the
    /// same lookup will fail the same way.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. }
                | Self::Truncated { .. }
                | Self::NameTooLong { .. }
                | Self::MissingCodecParameters { .. }
                | Self::BinRw(_)
        )
    }

    /// Whether this is the expected miss path of a lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::collections::TryReserveError> for VolumeError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::AllocationFailure(err.to_string())
    }
}

/// Result type for volume operations
pub type VolumeResult<T> = Result<T, VolumeError>;
