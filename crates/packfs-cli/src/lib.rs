//! Command-line inspection of packfs volume images.
//!
//! The image file is memory-mapped and served either directly as bytes or,
//! with `--aligned`, through the word-aligned reader that firmware targets
//! use. The binary in `bin/packfs.rs` is a thin wrapper around [`run`].
//!
//! # Configuration Sources
//!
//! - CLI arguments (`--image`, `--aligned`, `--read-size`)
//! - Environment variables (`PACKFS_IMAGE`, `PACKFS_ALIGNED`, `PACKFS_READ_SIZE`)
//! - Default values

#![warn(missing_docs)]

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use memmap2::Mmap;
use packfs::{Volume, VolumeSource, WordImage};
use tracing::{debug, info};

/// Command-line configuration
#[derive(Debug, Clone, Parser)]
#[command(
    name = "packfs",
    about = "Inspect and extract files from packed volume images",
    version
)]
pub struct CliConfig {
    /// Path to the volume image
    #[arg(long, short, env = "PACKFS_IMAGE")]
    pub image: PathBuf,

    /// Read through the word-aligned path instead of plain byte copies
    #[arg(long, env = "PACKFS_ALIGNED")]
    pub aligned: bool,

    /// Bytes requested per read call
    #[arg(long, env = "PACKFS_READ_SIZE", default_value_t = 64)]
    pub read_size: usize,

    /// Operation to perform
    #[command(subcommand)]
    pub command: Command,
}

/// Operations on a volume
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write a file's content to stdout
    Cat {
        /// Name of the file inside the volume
        name: String,
    },
    /// Print a file's record metadata
    Stat {
        /// Name of the file inside the volume
        name: String,
    },
}

impl CliConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.read_size == 0 {
            bail!("read size must be at least 1");
        }
        if !self.image.is_file() {
            bail!("image {} does not exist", self.image.display());
        }
        Ok(())
    }
}

/// Map the image and execute the configured command, writing to `out`
pub fn run(config: &CliConfig, out: &mut impl Write) -> Result<()> {
    let file = File::open(&config.image)
        .with_context(|| format!("failed to open image {}", config.image.display()))?;

    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to map image {}", config.image.display()))?;
    info!(
        image = %config.image.display(),
        size = mmap.len(),
        aligned = config.aligned,
        "image mapped"
    );

    if config.aligned {
        let volume = Volume::new(WordImage::from_bytes(&mmap).into_source());
        execute(&volume, config, out)
    } else {
        let volume = Volume::new(&mmap[..]);
        execute(&volume, config, out)
    }
}

fn execute<S: VolumeSource>(
    volume: &Volume<S>,
    config: &CliConfig,
    out: &mut impl Write,
) -> Result<()> {
    match &config.command {
        Command::Cat { name } => {
            let mut file = volume
                .open(name)
                .with_context(|| format!("cannot open {name}"))?;
            let mut buf = vec![0u8; config.read_size];
            let mut total = 0usize;
            loop {
                let n = file.read(&mut buf);
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n])?;
                total += n;
            }
            debug!(name = %name, total, "file written");
            file.close();
        }
        Command::Stat { name } => {
            let record = volume
                .find(name)
                .with_context(|| format!("cannot find {name}"))?;
            let compression = match record.header.compression_kind() {
                Some(kind) => format!("{kind:?}"),
                None => format!("unknown ({})", record.header.compression),
            };
            writeln!(out, "name:             {}", record.name_lossy())?;
            writeln!(out, "offset:           {:#x}", record.offset)?;
            writeln!(out, "payload offset:   {:#x}", record.payload_offset())?;
            writeln!(out, "compression:      {compression}")?;
            writeln!(out, "compressed len:   {}", record.header.compressed_len)?;
            writeln!(out, "decompressed len: {}", record.header.decompressed_len)?;
        }
    }
    out.flush()?;
    Ok(())
}
