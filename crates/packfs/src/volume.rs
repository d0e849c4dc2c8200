//! Volume and the record scanner
//!
//! Lookups walk the packed records from the start of the image. There is no
//! index: every `open` is a linear scan that stops at the first matching
//! name, at the terminal record, or at the first sign of corruption.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::aligned::VolumeSource;
use crate::codec::{CodecFactory, CodecParams, HeatshrinkFactory};
use crate::config::VolumeOptions;
use crate::decompress::{DecoderSlot, Decompressor, PayloadCursor};
use crate::error::{VolumeError, VolumeResult};
use crate::handle::FileHandle;
use crate::record::{CompressionKind, FileRecord, HEADER_SIZE, RecordHeader};

/// Path separator stripped from the front of requested names
pub const PATH_SEPARATOR: u8 = b'/';

/// Read-only packed volume
pub struct Volume<S> {
    source: S,
    options: VolumeOptions,
    codecs: Box<dyn CodecFactory>,
    live_decoders: AtomicUsize,
}

impl<S: std::fmt::Debug> std::fmt::Debug for Volume<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("source", &self.source)
            .field("options", &self.options)
            .field("live_decoders", &self.live_decoders)
            .finish_non_exhaustive()
    }
}

impl<S: VolumeSource> Volume<S> {
    /// Create a volume with default options and the heatshrink codec
    pub fn new(source: S) -> Self {
        Self {
            source,
            options: VolumeOptions::default(),
            codecs: Box::new(HeatshrinkFactory),
            live_decoders: AtomicUsize::new(0),
        }
    }

    /// Create a volume with custom options
    pub fn with_options(source: S, options: VolumeOptions) -> VolumeResult<Self> {
        Self::with_codec(source, options, HeatshrinkFactory)
    }

    /// Create a volume with custom options and a custom streaming codec
    pub fn with_codec<F: CodecFactory + 'static>(
        source: S,
        options: VolumeOptions,
        codecs: F,
    ) -> VolumeResult<Self> {
        options.validate()?;
        Ok(Self {
            source,
            options,
            codecs: Box::new(codecs),
            live_decoders: AtomicUsize::new(0),
        })
    }

    /// Backing store
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Options in effect
    pub fn options(&self) -> &VolumeOptions {
        &self.options
    }

    /// Number of decoder states currently owned by open handles
    pub fn live_decoders(&self) -> usize {
        self.live_decoders.load(Ordering::Relaxed)
    }

    /// Locate the record for `name`.
    ///
    /// Leading `/` characters are ignored. Names match by exact byte
    /// equality and the first matching record wins.
    pub fn find(&self, name: &str) -> VolumeResult<FileRecord> {
        let wanted = strip_separators(name.as_bytes());
        let mut offset = 0;

        loop {
            let header = RecordHeader::read_from(&self.source, offset)?;

            if !header.has_valid_magic() {
                warn!(
                    offset,
                    found = header.magic,
                    "record magic mismatch, volume image is corrupt"
                );
                return Err(VolumeError::InvalidMagic {
                    offset,
                    found: header.magic,
                });
            }

            if header.is_last() {
                debug!(offset, name, "reached end of volume");
                return Err(VolumeError::NotFound(name.to_string()));
            }

            let record = self.load_record(offset, header)?;
            debug!(
                offset,
                name = %record.name_lossy(),
                name_len = record.header.name_len,
                compressed_len = record.header.compressed_len,
                compression = record.header.compression,
                flags = record.header.flags,
                "found record"
            );

            if record.name == wanted {
                return Ok(record);
            }

            offset = record.next_offset().ok_or(VolumeError::Truncated {
                offset: record.offset,
                needed: HEADER_SIZE,
                available: 0,
            })?;
        }
    }

    /// Open `name` for sequential reading
    pub fn open(&self, name: &str) -> VolumeResult<FileHandle<'_, S>> {
        let record = self.find(name)?;

        let Some(kind) = record.header.compression_kind() else {
            warn!(
                name,
                compression = record.header.compression,
                "invalid compression tag"
            );
            return Err(VolumeError::UnsupportedCompression(
                record.header.compression,
            ));
        };

        let (cursor, decompressor) = match kind {
            CompressionKind::None => (
                PayloadCursor {
                    start: record.payload_offset(),
                    len: record.compressed_len(),
                    position: 0,
                },
                Decompressor::Identity,
            ),
            CompressionKind::Heatshrink => self.streaming_decoder(&record)?,
        };

        debug!(name, ?kind, "opened file");
        Ok(FileHandle::new(self, record, kind, cursor, decompressor))
    }

    fn streaming_decoder(
        &self,
        record: &FileRecord,
    ) -> VolumeResult<(PayloadCursor, Decompressor<'_>)> {
        if record.compressed_len() == 0 {
            return Err(VolumeError::MissingCodecParameters {
                offset: record.offset,
            });
        }

        let mut param = [0u8; 1];
        self.source.read_at(record.payload_offset(), &mut param);
        let params = CodecParams::from_byte(param[0]);
        debug!(
            window_bits = params.window_bits,
            lookahead_bits = params.lookahead_bits,
            "heatshrink compressed file"
        );

        let codec = self
            .codecs
            .create(params, self.options.decoder_buffer_size)?;

        let mut scratch = Vec::new();
        scratch.try_reserve_exact(self.options.feed_chunk_size)?;
        scratch.resize(self.options.feed_chunk_size, 0);

        let cursor = PayloadCursor {
            start: record.payload_offset() + 1,
            len: record.compressed_len() - 1,
            position: 0,
        };
        let slot = DecoderSlot::new(codec, &self.live_decoders, scratch);
        Ok((cursor, Decompressor::Streaming(slot)))
    }

    fn load_record(&self, offset: usize, header: RecordHeader) -> VolumeResult<FileRecord> {
        let name_len = usize::from(header.name_len);
        if name_len > self.options.max_name_len {
            return Err(VolumeError::NameTooLong {
                offset,
                len: name_len,
                max: self.options.max_name_len,
            });
        }

        // Saturating: corrupt lengths fail the bounds check instead of wrapping.
        let name_offset = offset.saturating_add(HEADER_SIZE);
        let needed = name_len.saturating_add(header.compressed_len as usize);
        let available = self.source.len().saturating_sub(name_offset);
        if needed > available {
            return Err(VolumeError::Truncated {
                offset: name_offset,
                needed,
                available,
            });
        }

        let mut slot = vec![0u8; name_len];
        self.source.read_at(name_offset, &mut slot);
        let end = slot.iter().position(|&b| b == 0).unwrap_or(name_len);
        slot.truncate(end);

        Ok(FileRecord {
            offset,
            header,
            name: slot,
        })
    }
}

fn strip_separators(name: &[u8]) -> &[u8] {
    let start = name
        .iter()
        .position(|&b| b != PATH_SEPARATOR)
        .unwrap_or(name.len());
    &name[start..]
}
