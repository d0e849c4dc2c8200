//! Read-only file retrieval from packed volume images
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::needless_pass_by_value)] // Handles are consumed on close
#![allow(clippy::missing_fields_in_debug)] // Codec state is summarised
//! A volume is a single contiguous, prebuilt image holding many named files
//! packed back to back. Each file is a record: a fixed header, a name slot,
//! and a payload that is either stored raw or heatshrink-compressed.
//!
//! The reader is built for firmware where the image lives in flash that can
//! only be read through aligned 32-bit loads. All access to the image goes
//! through a [`VolumeSource`]; [`WordAligned`] adapts a word-only store,
//! while plain byte slices (including memory maps) work directly.
//!
//! # Usage
//!
//! ```no_run
//! use packfs::Volume;
//!
//! # fn run(image: &[u8]) -> packfs::VolumeResult<()> {
//! let volume = Volume::new(image);
//! let mut file = volume.open("/index.html")?;
//!
//! let mut buf = [0u8; 64];
//! loop {
//!     let n = file.read(&mut buf);
//!     if n == 0 {
//!         break;
//!     }
//!     // serve &buf[..n]
//! }
//! file.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Design Principles
//!
//! - **Immutable image**: the volume is never written; any number of handles
//!   may read it at once
//! - **Linear lookup**: no index is kept, `open` scans records from the start
//! - **Forward-only reads**: compressed files are decoded incrementally across
//!   bounded reads
//! - **Corruption is terminal**: a bad record aborts the scan instead of
//!   skipping ahead

#![warn(missing_docs)]

pub mod aligned;
pub mod codec;
pub mod config;
pub mod decompress;
pub mod error;
pub mod handle;
pub mod record;
pub mod volume;

pub use aligned::{VolumeSource, WordAligned, WordImage, WordSource, copy_aligned};
pub use codec::{CodecFactory, CodecParams, HeatshrinkFactory, StreamCodec};
pub use config::VolumeOptions;
pub use error::{VolumeError, VolumeResult};
pub use handle::{FileHandle, close, read};
pub use record::{CompressionKind, FileRecord, RecordHeader};
pub use volume::Volume;
