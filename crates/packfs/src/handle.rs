//! Open file handles

use std::io::Read;

use tracing::debug;

use crate::aligned::VolumeSource;
use crate::decompress::{Decompressor, PayloadCursor};
use crate::record::{CompressionKind, FileRecord};
use crate::volume::Volume;

/// Upper bound on the buffer reserved up front by [`FileHandle::read_to_vec`]
const MAX_PREALLOCATION: usize = 64 * 1024;

/// An open file inside a [`Volume`].
///
/// Reads are forward-only. The handle exclusively owns its decoder state,
/// which is released when the handle is closed or dropped.
#[derive(Debug)]
pub struct FileHandle<'v, S> {
    volume: &'v Volume<S>,
    record: FileRecord,
    compression: CompressionKind,
    cursor: PayloadCursor,
    decompressed: u64,
    decompressor: Decompressor<'v>,
}

impl<'v, S: VolumeSource> FileHandle<'v, S> {
    pub(crate) fn new(
        volume: &'v Volume<S>,
        record: FileRecord,
        compression: CompressionKind,
        cursor: PayloadCursor,
        decompressor: Decompressor<'v>,
    ) -> Self {
        Self {
            volume,
            record,
            compression,
            cursor,
            decompressed: 0,
            decompressor,
        }
    }

    /// Read up to `buf.len()` bytes of file content into `buf`.
    ///
    /// Returns the number of bytes written. Zero means end of file, and
    /// every later call returns zero as well.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self
            .decompressor
            .read(self.volume.source(), &mut self.cursor, buf);
        self.decompressed += n as u64;
        n
    }

    /// Read the rest of the file into a vector
    pub fn read_to_vec(&mut self) -> Vec<u8> {
        let mut content = Vec::with_capacity(self.remaining_hint());
        let mut chunk = [0u8; 256];
        loop {
            let n = self.read(&mut chunk);
            if n == 0 {
                break;
            }
            content.extend_from_slice(&chunk[..n]);
        }
        content
    }

    /// Close the handle, releasing its decoder state
    pub fn close(self) {
        debug!(
            name = %self.record.name_lossy(),
            delivered = self.decompressed,
            "closing file"
        );
    }

    /// Record this handle reads from
    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    /// Compression of the underlying record
    pub fn compression(&self) -> CompressionKind {
        self.compression
    }

    /// Compressed bytes consumed so far, excluding the parameter byte of
    /// streaming records
    pub fn compressed_position(&self) -> usize {
        self.cursor.position
    }

    /// File content bytes delivered so far
    pub fn decompressed_position(&self) -> u64 {
        self.decompressed
    }

    /// Content length declared by the record header
    pub fn decompressed_len(&self) -> u64 {
        u64::from(self.record.header.decompressed_len)
    }

    /// Whether the handle has reached end of file
    pub fn is_eof(&self) -> bool {
        self.decompressor.is_eof(&self.cursor)
    }

    fn remaining_hint(&self) -> usize {
        let remaining = self.decompressed_len().saturating_sub(self.decompressed);
        usize::try_from(remaining)
            .map_or(MAX_PREALLOCATION, |n| n.min(MAX_PREALLOCATION))
    }
}

impl<S: VolumeSource> Read for FileHandle<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(Self::read(self, buf))
    }
}

/// Read from a handle that may be absent.
///
/// An absent handle reads as end of file.
pub fn read<S: VolumeSource>(handle: Option<&mut FileHandle<'_, S>>, buf: &mut [u8]) -> usize {
    handle.map_or(0, |handle| handle.read(buf))
}

/// Close a handle that may be absent
pub fn close<S: VolumeSource>(handle: Option<FileHandle<'_, S>>) {
    if let Some(handle) = handle {
        handle.close();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_handle_is_noop() {
        let mut buf = [0u8; 8];
        assert_eq!(read::<Vec<u8>>(None, &mut buf), 0);
        close::<Vec<u8>>(None);
    }
}
