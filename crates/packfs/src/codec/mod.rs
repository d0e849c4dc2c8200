//! Streaming codec capability
//!
//! A streaming codec turns compressed input into output incrementally. The
//! caller pushes input with [`StreamCodec::sink`], pulls output with
//! [`StreamCodec::poll`] and signals the end of input with
//! [`StreamCodec::finish`]. The amount of output produced per input byte is
//! not known ahead of time, so a reader interleaves the three calls.
//!
//! Codecs are created per open file through a [`CodecFactory`]; the volume
//! uses [`HeatshrinkFactory`] unless told otherwise.

pub mod heatshrink;

pub use heatshrink::{HeatshrinkDecoder, HeatshrinkFactory};

use crate::error::{VolumeError, VolumeResult};

/// Outcome of feeding input to a codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// All offered input was accepted
    Ok,
    /// The input buffer filled up before all input was accepted
    Full,
}

/// Outcome of draining output from a codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No further output until more input is sunk
    Empty,
    /// The output buffer filled up and more output is ready
    More,
}

/// Outcome of signalling end of input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishStatus {
    /// Everything has been emitted
    Done,
    /// Output remains; keep polling
    More,
}

/// Incremental decoder state owned by one open file
pub trait StreamCodec: Send {
    /// Offer compressed input, returning how many bytes were accepted
    fn sink(&mut self, input: &[u8]) -> (usize, SinkStatus);

    /// Write as much output as fits into `output`
    fn poll(&mut self, output: &mut [u8]) -> (usize, PollStatus);

    /// Signal that no more input will be sunk
    fn finish(&mut self) -> FinishStatus;
}

/// Decoder tuning parameters carried in the first payload byte.
///
/// The high nibble is the window size exponent, the low nibble the
/// lookahead size exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecParams {
    /// Window size exponent
    pub window_bits: u8,
    /// Lookahead size exponent
    pub lookahead_bits: u8,
}

impl CodecParams {
    /// Build from explicit exponents
    pub fn new(window_bits: u8, lookahead_bits: u8) -> Self {
        Self {
            window_bits,
            lookahead_bits,
        }
    }

    /// Unpack the parameter byte
    pub fn from_byte(byte: u8) -> Self {
        Self {
            window_bits: (byte >> 4) & 0x0F,
            lookahead_bits: byte & 0x0F,
        }
    }

    /// Pack into the parameter byte
    pub fn to_byte(self) -> u8 {
        (self.window_bits << 4) | (self.lookahead_bits & 0x0F)
    }

    /// Check the exponents against what heatshrink accepts
    pub fn validate(self) -> VolumeResult<()> {
        let window_ok = (heatshrink::MIN_WINDOW_BITS..=heatshrink::MAX_WINDOW_BITS)
            .contains(&self.window_bits);
        let lookahead_ok = self.lookahead_bits >= heatshrink::MIN_LOOKAHEAD_BITS
            && self.lookahead_bits < self.window_bits;

        if window_ok && lookahead_ok {
            Ok(())
        } else {
            Err(VolumeError::InvalidCodecParameters {
                window_bits: self.window_bits,
                lookahead_bits: self.lookahead_bits,
            })
        }
    }
}

/// Creates decoder state for streaming records
pub trait CodecFactory: Send + Sync {
    /// Allocate a decoder for `params` with an input buffer of `input_buffer_size` bytes
    fn create(
        &self,
        params: CodecParams,
        input_buffer_size: usize,
    ) -> VolumeResult<Box<dyn StreamCodec>>;
}
