//! Per-file decompression engine
//!
//! Every open file carries a [`Decompressor`] chosen from its record's
//! compression tag. Both variants read forward only; the caller keeps the
//! compressed cursor and hands it in on every call.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::aligned::VolumeSource;
use crate::codec::StreamCodec;

/// Compressed input range of a record and the read position inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadCursor {
    /// Offset of the first byte that belongs to the stream
    pub start: usize,
    /// Number of stream bytes
    pub len: usize,
    /// Bytes of the stream already consumed
    pub position: usize,
}

impl PayloadCursor {
    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Whether all input has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.len
    }

    fn absolute(&self) -> usize {
        self.start + self.position
    }
}

/// Decoder state owned by exactly one open file.
///
/// Holds a slot in the volume's live-decoder count for as long as it exists;
/// dropping it gives the slot back, so every exit path releases it once.
pub struct DecoderSlot<'v> {
    codec: Box<dyn StreamCodec>,
    live: &'v AtomicUsize,
    scratch: Vec<u8>,
    finished: bool,
    drained: bool,
}

impl<'v> DecoderSlot<'v> {
    pub(crate) fn new(
        codec: Box<dyn StreamCodec>,
        live: &'v AtomicUsize,
        scratch: Vec<u8>,
    ) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            codec,
            live,
            scratch,
            finished: false,
            drained: false,
        }
    }
}

impl Drop for DecoderSlot<'_> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for DecoderSlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSlot")
            .field("feed_chunk", &self.scratch.len())
            .field("finished", &self.finished)
            .field("drained", &self.drained)
            .finish_non_exhaustive()
    }
}

/// Decompression strategy for one open file
#[derive(Debug)]
pub enum Decompressor<'v> {
    /// Payload is copied out unchanged
    Identity,
    /// Payload is run through a streaming codec
    Streaming(DecoderSlot<'v>),
}

impl Decompressor<'_> {
    /// Produce up to `buf.len()` bytes of file content.
    ///
    /// Returns the number of bytes written; zero means end of file.
    pub fn read<S: VolumeSource + ?Sized>(
        &mut self,
        source: &S,
        cursor: &mut PayloadCursor,
        buf: &mut [u8],
    ) -> usize {
        match self {
            Self::Identity => read_identity(source, cursor, buf),
            Self::Streaming(slot) => read_streaming(slot, source, cursor, buf),
        }
    }

    /// Whether no further bytes will be produced
    pub fn is_eof(&self, cursor: &PayloadCursor) -> bool {
        match self {
            Self::Identity => cursor.is_exhausted(),
            Self::Streaming(slot) => cursor.is_exhausted() && slot.drained,
        }
    }
}

fn read_identity<S: VolumeSource + ?Sized>(
    source: &S,
    cursor: &mut PayloadCursor,
    buf: &mut [u8],
) -> usize {
    let len = buf.len().min(cursor.remaining());
    source.read_at(cursor.absolute(), &mut buf[..len]);
    cursor.position += len;
    len
}

fn read_streaming<S: VolumeSource + ?Sized>(
    slot: &mut DecoderSlot<'_>,
    source: &S,
    cursor: &mut PayloadCursor,
    buf: &mut [u8],
) -> usize {
    if slot.drained {
        return 0;
    }

    let mut produced = 0;
    while produced < buf.len() {
        let mut accepted = 0;
        let remaining = cursor.remaining();

        if remaining > 0 {
            let step = remaining.min(slot.scratch.len());
            source.read_at(cursor.absolute(), &mut slot.scratch[..step]);
            (accepted, _) = slot.codec.sink(&slot.scratch[..step]);
            cursor.position += accepted;
            trace!(
                offered = step,
                accepted,
                left = cursor.remaining(),
                "fed decoder"
            );
        }

        if cursor.is_exhausted() && !slot.finished {
            slot.finished = true;
            let status = slot.codec.finish();
            trace!(?status, "compressed input exhausted");
        }

        let (emitted, _) = slot.codec.poll(&mut buf[produced..]);
        produced += emitted;

        if emitted == 0 {
            if cursor.is_exhausted() {
                slot.drained = true;
                break;
            }
            if accepted == 0 {
                // Decoder refused input and produced nothing; it cannot make progress.
                break;
            }
        }
    }

    produced
}
