//! Heatshrink (LZSS) streaming codec
//!
//! The bitstream is read most-significant bit first. Each symbol starts with
//! a tag bit:
//!
//! - `1`: literal, followed by 8 bits of data
//! - `0`: back-reference, followed by `window_bits` bits holding
//!   `offset - 1` and `lookahead_bits` bits holding `count - 1`
//!
//! The final byte is zero-padded, which is never enough to form a complete
//! symbol. The decoder's window starts zero-filled.

use std::collections::VecDeque;

use tracing::trace;

use super::{CodecFactory, CodecParams, FinishStatus, PollStatus, SinkStatus, StreamCodec};
use crate::error::VolumeResult;

/// Smallest accepted window exponent
pub const MIN_WINDOW_BITS: u8 = 4;

/// Largest accepted window exponent
pub const MAX_WINDOW_BITS: u8 = 15;

/// Smallest accepted lookahead exponent
pub const MIN_LOOKAHEAD_BITS: u8 = 3;

const LITERAL_BITS: usize = 9;

enum Symbol {
    Literal(u8),
    Backref { offset: usize, count: usize },
}

#[derive(Debug, Clone, Copy)]
struct PendingBackref {
    offset: usize,
    remaining: usize,
}

/// Incremental heatshrink decoder
pub struct HeatshrinkDecoder {
    params: CodecParams,
    input: VecDeque<u8>,
    input_capacity: usize,
    current: u8,
    bits_left: u8,
    window: Vec<u8>,
    head: usize,
    pending: Option<PendingBackref>,
}

impl std::fmt::Debug for HeatshrinkDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeatshrinkDecoder")
            .field("params", &self.params)
            .field("buffered", &self.input.len())
            .field("bits_left", &self.bits_left)
            .field("emitted", &self.head)
            .field("pending", &self.pending)
            .finish()
    }
}

impl HeatshrinkDecoder {
    /// Allocate a decoder.
    ///
    /// The window (`1 << window_bits` bytes) and input buffer are reserved
    /// fallibly so an exhausted heap surfaces as
    /// [`VolumeError::AllocationFailure`](crate::VolumeError::AllocationFailure).
    pub fn new(params: CodecParams, input_buffer_size: usize) -> VolumeResult<Self> {
        params.validate()?;

        let window_size = 1usize << params.window_bits;
        let mut window = Vec::new();
        window.try_reserve_exact(window_size)?;
        window.resize(window_size, 0);

        let mut input = VecDeque::new();
        input.try_reserve_exact(input_buffer_size)?;

        Ok(Self {
            params,
            input,
            input_capacity: input_buffer_size,
            current: 0,
            bits_left: 0,
            window,
            head: 0,
            pending: None,
        })
    }

    /// Parameters this decoder was created with
    pub fn params(&self) -> CodecParams {
        self.params
    }

    fn available_bits(&self) -> usize {
        usize::from(self.bits_left) + 8 * self.input.len()
    }

    fn peek_bit(&self) -> Option<bool> {
        if self.bits_left > 0 {
            Some((self.current >> (self.bits_left - 1)) & 1 == 1)
        } else {
            self.input.front().map(|byte| byte & 0x80 != 0)
        }
    }

    fn take_bits(&mut self, count: u8) -> Option<u16> {
        let mut acc = 0u16;
        for _ in 0..count {
            if self.bits_left == 0 {
                self.current = self.input.pop_front()?;
                self.bits_left = 8;
            }
            self.bits_left -= 1;
            acc = (acc << 1) | u16::from((self.current >> self.bits_left) & 1);
        }
        Some(acc)
    }

    fn symbol_bits(&self) -> Option<usize> {
        let literal = self.peek_bit()?;
        let needed = if literal {
            LITERAL_BITS
        } else {
            1 + usize::from(self.params.window_bits) + usize::from(self.params.lookahead_bits)
        };
        (self.available_bits() >= needed).then_some(needed)
    }

    fn next_symbol(&mut self) -> Option<Symbol> {
        self.symbol_bits()?;

        if self.take_bits(1)? == 1 {
            return Some(Symbol::Literal(self.take_bits(8)? as u8));
        }

        let index = self.take_bits(self.params.window_bits)?;
        let count = self.take_bits(self.params.lookahead_bits)?;
        Some(Symbol::Backref {
            offset: usize::from(index) + 1,
            count: usize::from(count) + 1,
        })
    }

    fn push(&mut self, byte: u8) {
        let mask = self.window.len() - 1;
        self.window[self.head & mask] = byte;
        self.head = self.head.wrapping_add(1);
    }

    fn has_output_ready(&self) -> bool {
        self.pending.is_some() || self.symbol_bits().is_some()
    }
}

impl StreamCodec for HeatshrinkDecoder {
    fn sink(&mut self, input: &[u8]) -> (usize, SinkStatus) {
        let room = self.input_capacity - self.input.len();
        let accepted = room.min(input.len());
        self.input.extend(&input[..accepted]);

        let status = if accepted < input.len() {
            SinkStatus::Full
        } else {
            SinkStatus::Ok
        };
        (accepted, status)
    }

    fn poll(&mut self, output: &mut [u8]) -> (usize, PollStatus) {
        let mask = self.window.len() - 1;
        let mut written = 0;

        while written < output.len() {
            if let Some(mut backref) = self.pending.take() {
                while backref.remaining > 0 && written < output.len() {
                    let byte = self.window[self.head.wrapping_sub(backref.offset) & mask];
                    self.push(byte);
                    output[written] = byte;
                    written += 1;
                    backref.remaining -= 1;
                }
                if backref.remaining > 0 {
                    self.pending = Some(backref);
                }
                continue;
            }

            match self.next_symbol() {
                Some(Symbol::Literal(byte)) => {
                    self.push(byte);
                    output[written] = byte;
                    written += 1;
                }
                Some(Symbol::Backref { offset, count }) => {
                    self.pending = Some(PendingBackref {
                        offset,
                        remaining: count,
                    });
                }
                None => return (written, PollStatus::Empty),
            }
        }

        let status = if self.has_output_ready() {
            PollStatus::More
        } else {
            PollStatus::Empty
        };
        (written, status)
    }

    fn finish(&mut self) -> FinishStatus {
        if self.has_output_ready() {
            FinishStatus::More
        } else {
            trace!(
                padding_bits = self.available_bits(),
                "heatshrink stream complete"
            );
            FinishStatus::Done
        }
    }
}

/// Factory producing [`HeatshrinkDecoder`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatshrinkFactory;

impl CodecFactory for HeatshrinkFactory {
    fn create(
        &self,
        params: CodecParams,
        input_buffer_size: usize,
    ) -> VolumeResult<Box<dyn StreamCodec>> {
        Ok(Box::new(HeatshrinkDecoder::new(params, input_buffer_size)?))
    }
}

struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    used: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            current: 0,
            used: 0,
        }
    }

    fn push(&mut self, value: u16, count: u8) {
        for shift in (0..count).rev() {
            self.current = (self.current << 1) | ((value >> shift) & 1) as u8;
            self.used += 1;
            if self.used == 8 {
                self.bytes.push(self.current);
                self.current = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.bytes.push(self.current << (8 - self.used));
        }
        self.bytes
    }
}

/// Compress `data` into a heatshrink bitstream.
///
/// Greedy longest-match LZSS; a back-reference is emitted only when it is
/// shorter than the literals it replaces. The returned stream does not
/// include the parameter byte.
pub fn compress(data: &[u8], params: CodecParams) -> VolumeResult<Vec<u8>> {
    params.validate()?;

    let window = 1usize << params.window_bits;
    let max_len = 1usize << params.lookahead_bits;
    let backref_bits = 1 + usize::from(params.window_bits) + usize::from(params.lookahead_bits);

    let mut writer = BitWriter::new();
    let mut pos = 0;

    while pos < data.len() {
        let mut best_len = 0;
        let mut best_offset = 0;

        for start in pos.saturating_sub(window)..pos {
            let limit = max_len.min(data.len() - pos);
            let len = (0..limit)
                .take_while(|&i| data[start + i] == data[pos + i])
                .count();
            if len > best_len {
                best_len = len;
                best_offset = pos - start;
                if len == limit {
                    break;
                }
            }
        }

        if best_len * LITERAL_BITS > backref_bits {
            writer.push(0, 1);
            writer.push((best_offset - 1) as u16, params.window_bits);
            writer.push((best_len - 1) as u16, params.lookahead_bits);
            pos += best_len;
        } else {
            writer.push(1, 1);
            writer.push(u16::from(data[pos]), 8);
            pos += 1;
        }
    }

    Ok(writer.finish())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::VolumeError;

    fn new_decoder(params: CodecParams) -> HeatshrinkDecoder {
        HeatshrinkDecoder::new(params, 16).expect("valid params")
    }

    fn decode_all(stream: &[u8], params: CodecParams, feed: usize, out_step: usize) -> Vec<u8> {
        let mut decoder = new_decoder(params);
        let mut output = Vec::new();
        let mut buf = vec![0u8; out_step];
        let mut pos = 0;

        loop {
            if pos < stream.len() {
                let end = (pos + feed).min(stream.len());
                let (accepted, _) = decoder.sink(&stream[pos..end]);
                pos += accepted;
                if pos == stream.len() {
                    decoder.finish();
                }
            }

            let (n, _) = decoder.poll(&mut buf);
            output.extend_from_slice(&buf[..n]);

            if pos == stream.len() && n == 0 {
                break;
            }
        }

        assert_eq!(decoder.finish(), FinishStatus::Done);
        output
    }

    #[test]
    fn test_literal_only_stream() {
        // tag 1 + 'A' (0x41) then tag 1 + 'B' (0x42), zero padded
        // 1 0100 0001 1 0100 0010 -> 1010 0000 | 1101 0000 | 1000 0000
        let stream = [0xA0, 0xD0, 0x80];
        let output = decode_all(&stream, CodecParams::new(8, 4), 16, 64);
        assert_eq!(output, b"AB");
    }

    #[test]
    fn test_backref_overlap() {
        let params = CodecParams::new(4, 3);
        let data = b"abababababababab";
        let stream = compress(data, params).expect("compress");

        assert!(stream.len() < data.len());
        assert_eq!(decode_all(&stream, params, 1, 1), data);
    }

    #[test]
    fn test_sink_respects_capacity() {
        let mut decoder = new_decoder(CodecParams::new(8, 4));
        assert_eq!(decoder.params(), CodecParams::new(8, 4));

        let (accepted, status) = decoder.sink(&[0u8; 40]);
        assert_eq!(accepted, 16);
        assert_eq!(status, SinkStatus::Full);

        let (accepted, status) = decoder.sink(&[0u8; 4]);
        assert_eq!(accepted, 0);
        assert_eq!(status, SinkStatus::Full);
    }

    #[test]
    fn test_partial_symbol_waits_for_input() {
        let params = CodecParams::new(8, 4);
        let mut decoder = new_decoder(params);
        let mut out = [0u8; 8];

        // First byte holds only the tag bit and 7 of the 8 literal bits.
        decoder.sink(&[0xA0]);
        assert_eq!(decoder.poll(&mut out), (0, PollStatus::Empty));

        decoder.sink(&[0xD0, 0x80]);
        let (n, _) = decoder.poll(&mut out);
        assert_eq!(&out[..n], b"AB");
    }

    #[test]
    fn test_poll_reports_more_when_output_full() {
        let params = CodecParams::new(8, 4);
        let data = vec![b'z'; 64];
        let stream = compress(&data, params).expect("compress");

        let mut decoder = new_decoder(params);
        let (accepted, _) = decoder.sink(&stream);
        assert_eq!(accepted, stream.len());
        assert_eq!(decoder.finish(), FinishStatus::More);

        let mut out = [0u8; 10];
        let (n, status) = decoder.poll(&mut out);
        assert_eq!(n, 10);
        assert_eq!(status, PollStatus::More);
    }

    #[test]
    fn test_round_trip_parameter_range() {
        let text: Vec<u8> = b"the quick brown fox jumps over the lazy dog; "
            .iter()
            .copied()
            .cycle()
            .take(700)
            .collect();

        for window_bits in MIN_WINDOW_BITS..=11 {
            for lookahead_bits in MIN_LOOKAHEAD_BITS..window_bits {
                let params = CodecParams::new(window_bits, lookahead_bits);
                let stream = compress(&text, params).expect("compress");
                let output = decode_all(&stream, params, 16, 33);
                assert_eq!(
                    output, text,
                    "window {window_bits} lookahead {lookahead_bits}"
                );
            }
        }
    }

    #[test]
    fn test_empty_input() {
        let params = CodecParams::new(8, 4);
        let stream = compress(&[], params).expect("compress");
        assert!(stream.is_empty());

        let mut decoder = new_decoder(params);
        assert_eq!(decoder.finish(), FinishStatus::Done);
    }

    #[test]
    fn test_rejects_invalid_params() {
        let result = HeatshrinkDecoder::new(CodecParams::new(8, 9), 16);
        assert!(matches!(
            result,
            Err(VolumeError::InvalidCodecParameters {
                window_bits: 8,
                lookahead_bits: 9
            })
        ));
        assert!(compress(b"x", CodecParams::new(16, 4)).is_err());
    }
}
