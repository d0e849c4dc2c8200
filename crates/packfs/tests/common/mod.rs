//! Shared helpers for building volume images in tests

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use binrw::BinWrite;
use binrw::io::Cursor;
use packfs::codec::heatshrink;
use packfs::record::{HEADER_SIZE, RECORD_ALIGN};
use packfs::{CodecParams, CompressionKind, RecordHeader};

/// Entry to be packed into a test image
pub struct Entry {
    name: Vec<u8>,
    kind: u8,
    payload: Vec<u8>,
    decompressed_len: u32,
}

/// Builds images in the on-disk record layout
#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<Entry>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an uncompressed file
    pub fn raw(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push(Entry {
            name: name.as_bytes().to_vec(),
            kind: CompressionKind::None.as_byte(),
            payload: content.to_vec(),
            decompressed_len: content.len() as u32,
        });
        self
    }

    /// Add a heatshrink-compressed file
    pub fn compressed(mut self, name: &str, content: &[u8], params: CodecParams) -> Self {
        let stream = heatshrink::compress(content, params).expect("compress");
        let mut payload = vec![params.to_byte()];
        payload.extend(stream);
        self.entries.push(Entry {
            name: name.as_bytes().to_vec(),
            kind: CompressionKind::Heatshrink.as_byte(),
            payload,
            decompressed_len: content.len() as u32,
        });
        self
    }

    /// Add a record with an arbitrary compression tag and payload
    pub fn tagged(mut self, name: &str, kind: u8, payload: &[u8]) -> Self {
        self.entries.push(Entry {
            name: name.as_bytes().to_vec(),
            kind,
            payload: payload.to_vec(),
            decompressed_len: payload.len() as u32,
        });
        self
    }

    /// Serialize the records followed by the terminal record
    pub fn build(&self) -> Vec<u8> {
        let mut image = Vec::new();
        for entry in &self.entries {
            let slot = name_slot(&entry.name);
            image.extend(encode_header(&RecordHeader {
                compression: entry.kind,
                ..RecordHeader::new(
                    CompressionKind::None,
                    slot.len() as u16,
                    entry.payload.len() as u32,
                    entry.decompressed_len,
                )
            }));
            image.extend(slot);
            image.extend(&entry.payload);
            pad(&mut image);
        }
        image.extend(encode_header(&RecordHeader::terminal()));
        image
    }

    /// Offset of the header of record `index` in the built image
    pub fn record_offset(&self, index: usize) -> usize {
        self.entries[..index]
            .iter()
            .map(|entry| {
                (HEADER_SIZE + name_slot(&entry.name).len() + entry.payload.len())
                    .next_multiple_of(RECORD_ALIGN)
            })
            .sum()
    }
}

/// NUL-terminated name padded to a whole number of words
pub fn name_slot(name: &[u8]) -> Vec<u8> {
    let mut slot = name.to_vec();
    slot.push(0);
    slot.resize(slot.len().next_multiple_of(RECORD_ALIGN), 0);
    slot
}

pub fn encode_header(header: &RecordHeader) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    header.write(&mut cursor).expect("header serialization");
    cursor.into_inner()
}

fn pad(image: &mut Vec<u8>) {
    image.resize(image.len().next_multiple_of(RECORD_ALIGN), 0);
}

/// Drain a handle using a fixed read size
pub fn read_all_with<S: packfs::VolumeSource>(
    handle: &mut packfs::FileHandle<'_, S>,
    read_size: usize,
) -> Vec<u8> {
    let mut content = Vec::new();
    let mut buf = vec![0u8; read_size];
    loop {
        let n = handle.read(&mut buf);
        if n == 0 {
            return content;
        }
        content.extend_from_slice(&buf[..n]);
    }
}

/// Text that compresses well but is not trivially repetitive
pub fn sample_text(len: usize) -> Vec<u8> {
    let words = ["volume ", "record ", "flash ", "header ", "stream ", "window "];
    let mut text = Vec::with_capacity(len);
    let mut i = 0usize;
    while text.len() < len {
        text.extend_from_slice(words[(i * 7 + i / 3) % words.len()].as_bytes());
        i += 1;
    }
    text.truncate(len);
    text
}
