//! Volume reader configuration

use crate::error::{VolumeError, VolumeResult};

/// Default number of compressed bytes fed to a decoder per step
pub const DEFAULT_FEED_CHUNK_SIZE: usize = 16;

/// Default size of a streaming decoder's input buffer
pub const DEFAULT_DECODER_BUFFER_SIZE: usize = 16;

/// Default maximum width of a record's name slot
pub const DEFAULT_MAX_NAME_LEN: usize = 256;

/// Smallest decoder input buffer that can hold any complete heatshrink symbol
pub const MIN_DECODER_BUFFER_SIZE: usize = 4;

/// Tuning knobs for a [`Volume`](crate::Volume).
///
/// The defaults match the memory budget of small firmware targets and should
/// rarely need changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeOptions {
    /// Compressed bytes fed to the decoder per step of a read
    pub feed_chunk_size: usize,
    /// Input buffer size of each streaming decoder
    pub decoder_buffer_size: usize,
    /// Widest name slot accepted before the image is considered corrupt
    pub max_name_len: usize,
}

impl Default for VolumeOptions {
    fn default() -> Self {
        Self {
            feed_chunk_size: DEFAULT_FEED_CHUNK_SIZE,
            decoder_buffer_size: DEFAULT_DECODER_BUFFER_SIZE,
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl VolumeOptions {
    /// Set the per-step feed size
    #[must_use]
    pub fn with_feed_chunk_size(mut self, size: usize) -> Self {
        self.feed_chunk_size = size;
        self
    }

    /// Set the decoder input buffer size
    #[must_use]
    pub fn with_decoder_buffer_size(mut self, size: usize) -> Self {
        self.decoder_buffer_size = size;
        self
    }

    /// Set the maximum name slot width
    #[must_use]
    pub fn with_max_name_len(mut self, len: usize) -> Self {
        self.max_name_len = len;
        self
    }

    /// Validate the options
    pub fn validate(&self) -> VolumeResult<()> {
        if self.feed_chunk_size == 0 {
            return Err(VolumeError::InvalidOptions(
                "feed chunk size must be at least 1".to_string(),
            ));
        }

        if self.decoder_buffer_size < MIN_DECODER_BUFFER_SIZE {
            return Err(VolumeError::InvalidOptions(format!(
                "decoder buffer size {} is below the minimum of {MIN_DECODER_BUFFER_SIZE}",
                self.decoder_buffer_size
            )));
        }

        if self.max_name_len == 0 {
            return Err(VolumeError::InvalidOptions(
                "maximum name length must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
