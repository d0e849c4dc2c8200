//! Custom decoder factories and decoder release when an open fails

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{ImageBuilder, read_all_with, sample_text};
use packfs::codec::{FinishStatus, PollStatus, SinkStatus};
use packfs::{
    CodecFactory, CodecParams, HeatshrinkFactory, StreamCodec, Volume, VolumeError, VolumeOptions,
    VolumeResult,
};
use pretty_assertions::assert_eq;

/// Factory for a target whose heap is exhausted
struct ExhaustedHeap;

impl CodecFactory for ExhaustedHeap {
    fn create(
        &self,
        _params: CodecParams,
        _input_buffer_size: usize,
    ) -> VolumeResult<Box<dyn StreamCodec>> {
        Err(VolumeError::AllocationFailure("no heap".to_string()))
    }
}

/// Heatshrink decoders that keep a count of how many are alive
#[derive(Default)]
struct CountingFactory {
    live: Arc<AtomicUsize>,
    created: Arc<AtomicUsize>,
}

struct CountedCodec {
    inner: Box<dyn StreamCodec>,
    live: Arc<AtomicUsize>,
}

impl StreamCodec for CountedCodec {
    fn sink(&mut self, input: &[u8]) -> (usize, SinkStatus) {
        self.inner.sink(input)
    }

    fn poll(&mut self, output: &mut [u8]) -> (usize, PollStatus) {
        self.inner.poll(output)
    }

    fn finish(&mut self) -> FinishStatus {
        self.inner.finish()
    }
}

impl Drop for CountedCodec {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::Relaxed);
    }
}

impl CodecFactory for CountingFactory {
    fn create(
        &self,
        params: CodecParams,
        input_buffer_size: usize,
    ) -> VolumeResult<Box<dyn StreamCodec>> {
        let inner = HeatshrinkFactory.create(params, input_buffer_size)?;
        self.live.fetch_add(1, Ordering::Relaxed);
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(CountedCodec {
            inner,
            live: Arc::clone(&self.live),
        }))
    }
}

fn mixed_image(content: &[u8]) -> Vec<u8> {
    ImageBuilder::new()
        .raw("plain.txt", content)
        .compressed("packed.txt", content, CodecParams::new(9, 5))
        .build()
}

#[test]
fn custom_factory_decodes_streaming_records() {
    let content = sample_text(900);
    let image = mixed_image(&content);
    let factory = CountingFactory::default();
    let live = Arc::clone(&factory.live);
    let created = Arc::clone(&factory.created);
    let volume = Volume::with_codec(&image, VolumeOptions::default(), factory)
        .expect("options");

    let mut file = volume.open("packed.txt").expect("open");
    assert_eq!(live.load(Ordering::Relaxed), 1);
    assert_eq!(volume.live_decoders(), 1);
    assert_eq!(read_all_with(&mut file, 37), content);
    file.close();
    assert_eq!(live.load(Ordering::Relaxed), 0);
    assert_eq!(volume.live_decoders(), 0);

    // Raw records never ask the factory for a decoder.
    let mut plain = volume.open("plain.txt").expect("open");
    assert_eq!(plain.read_to_vec(), content);
    assert_eq!(created.load(Ordering::Relaxed), 1);
}

#[test]
fn allocation_failure_is_reported_from_open() {
    let content = sample_text(300);
    let image = mixed_image(&content);
    let volume = Volume::with_codec(&image, VolumeOptions::default(), ExhaustedHeap)
        .expect("options");

    let err = volume.open("packed.txt").expect_err("no heap");
    assert!(matches!(err, VolumeError::AllocationFailure(_)));
    assert!(!err.is_format_error());
    assert_eq!(volume.live_decoders(), 0);

    let mut plain = volume.open("plain.txt").expect("open");
    assert_eq!(plain.read_to_vec(), content);
}

#[test]
fn failed_open_releases_allocated_decoder() {
    let content = sample_text(300);
    let image = mixed_image(&content);
    let factory = CountingFactory::default();
    let live = Arc::clone(&factory.live);
    let created = Arc::clone(&factory.created);
    // The decoder is created first; the feed buffer behind it cannot be reserved.
    let options = VolumeOptions::default().with_feed_chunk_size(usize::MAX);
    let volume = Volume::with_codec(&image, options, factory)
        .expect("options");

    for _ in 0..3 {
        let err = volume.open("packed.txt").expect_err("feed buffer");
        assert!(matches!(err, VolumeError::AllocationFailure(_)));
    }

    assert_eq!(created.load(Ordering::Relaxed), 3);
    assert_eq!(live.load(Ordering::Relaxed), 0);
    assert_eq!(volume.live_decoders(), 0);
}
