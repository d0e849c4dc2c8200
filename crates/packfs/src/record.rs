//! On-disk file record header
//!
//! Records are packed back to back from the start of the volume:
//!
//! ```text
//! +--------+-------+-------+----------+----------------+------------------+
//! | magic  | flags | compr | name_len | compressed_len | decompressed_len |
//! |  u32   |  u8   |  u8   |   u16    |      u32       |       u32        |
//! +--------+-------+-------+----------+----------------+------------------+
//! | name slot (name_len bytes, NUL padded)                                 |
//! | payload (compressed_len bytes)                                         |
//! | padding to the next 4-byte boundary                                    |
//! +------------------------------------------------------------------------+
//! ```
//!
//! All fields are little-endian.

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

use crate::aligned::VolumeSource;
use crate::error::{VolumeError, VolumeResult};

/// Record magic, the bytes `"ESfs"` read as a little-endian u32
pub const RECORD_MAGIC: u32 = 0x7366_5345;

/// Size of the fixed record header in bytes
pub const HEADER_SIZE: usize = 16;

/// Alignment of every record start relative to the volume base
pub const RECORD_ALIGN: usize = 4;

/// Flag bit marking the terminal record of the volume
pub const FLAG_LAST_RECORD: u8 = 0x01;

/// Compression applied to a record's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionKind {
    /// Payload is stored as-is
    None = 0,
    /// Payload is a heatshrink stream preceded by one parameter byte
    Heatshrink = 1,
}

impl CompressionKind {
    /// Parse from the on-disk tag
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Heatshrink),
            _ => None,
        }
    }

    /// On-disk tag
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Fixed-size record header
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct RecordHeader {
    /// Sentinel, [`RECORD_MAGIC`] in every valid record
    pub magic: u32,
    /// Record flags
    pub flags: u8,
    /// Raw compression tag, see [`CompressionKind`]
    pub compression: u8,
    /// Width of the name slot following the header
    pub name_len: u16,
    /// Stored payload length
    pub compressed_len: u32,
    /// Content length after decoding
    pub decompressed_len: u32,
}

impl RecordHeader {
    /// Header for a regular file record
    pub fn new(
        kind: CompressionKind,
        name_len: u16,
        compressed_len: u32,
        decompressed_len: u32,
    ) -> Self {
        Self {
            magic: RECORD_MAGIC,
            flags: 0,
            compression: kind.as_byte(),
            name_len,
            compressed_len,
            decompressed_len,
        }
    }

    /// Header for the terminal record
    pub fn terminal() -> Self {
        Self {
            magic: RECORD_MAGIC,
            flags: FLAG_LAST_RECORD,
            compression: 0,
            name_len: 0,
            compressed_len: 0,
            decompressed_len: 0,
        }
    }

    /// Read the header at `offset` from a volume source.
    ///
    /// Only the raw fields are decoded here; the magic is checked by the
    /// caller so the error can carry the scan position.
    pub fn read_from<S: VolumeSource + ?Sized>(source: &S, offset: usize) -> VolumeResult<Self> {
        let available = source.len().saturating_sub(offset);
        if available < HEADER_SIZE {
            return Err(VolumeError::Truncated {
                offset,
                needed: HEADER_SIZE,
                available,
            });
        }

        let mut raw = [0u8; HEADER_SIZE];
        source.read_at(offset, &mut raw);
        Ok(Self::read(&mut Cursor::new(&raw[..]))?)
    }

    /// Whether the magic matches [`RECORD_MAGIC`]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == RECORD_MAGIC
    }

    /// Whether this is the terminal record
    pub fn is_last(&self) -> bool {
        self.flags & FLAG_LAST_RECORD != 0
    }

    /// Decoded compression tag, if known
    pub fn compression_kind(&self) -> Option<CompressionKind> {
        CompressionKind::from_byte(self.compression)
    }
}

/// Round `offset` up to the next record boundary, `None` on overflow
pub fn align_up(offset: usize) -> Option<usize> {
    offset.checked_next_multiple_of(RECORD_ALIGN)
}

/// Location and metadata of a file record found in a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Offset of the record header within the volume
    pub offset: usize,
    /// Decoded header
    pub header: RecordHeader,
    /// File name as stored, without NUL padding
    pub name: Vec<u8>,
}

impl FileRecord {
    /// Offset of the name slot
    pub fn name_offset(&self) -> usize {
        self.offset + HEADER_SIZE
    }

    /// Offset of the first payload byte
    pub fn payload_offset(&self) -> usize {
        self.name_offset() + usize::from(self.header.name_len)
    }

    /// Stored payload length
    pub fn compressed_len(&self) -> usize {
        self.header.compressed_len as usize
    }

    /// Offset of the record that follows this one.
    ///
    /// `None` when the record's lengths run past the address space.
    pub fn next_offset(&self) -> Option<usize> {
        let end = self
            .offset
            .checked_add(HEADER_SIZE)?
            .checked_add(usize::from(self.header.name_len))?
            .checked_add(self.compressed_len())?;
        align_up(end)
    }

    /// Name as UTF-8, lossily
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}
