//! Access to the backing store that holds a volume image
//!
//! Some targets map flash into the address space such that only aligned
//! 32-bit loads are legal; a byte, halfword or misaligned word load faults.
//! [`WordSource`] models that kind of store: it can only be asked for whole
//! words by word index, so a misaligned load cannot be expressed at all.
//! [`copy_aligned`] rebuilds arbitrary byte ranges from such a store.
//!
//! Everything above this module talks to a [`VolumeSource`], which is either
//! a plain byte slice (bounded copy) or a [`WordAligned`] wrapper around a
//! word store.

/// Width of one load from a word-addressed store
pub const WORD_SIZE: usize = 4;

/// Backing store that only supports aligned, word-sized loads.
///
/// Bytes within a word are little-endian ordered: byte `n` of the image is
/// bits `8 * (n % 4)..8 * (n % 4) + 8` of word `n / 4`.
pub trait WordSource {
    /// Number of words in the store
    fn word_count(&self) -> usize;

    /// Load the word at `index`
    fn load_word(&self, index: usize) -> u32;
}

impl WordSource for [u32] {
    fn word_count(&self) -> usize {
        self.len()
    }

    fn load_word(&self, index: usize) -> u32 {
        self[index]
    }
}

impl WordSource for Vec<u32> {
    fn word_count(&self) -> usize {
        self.len()
    }

    fn load_word(&self, index: usize) -> u32 {
        self[index]
    }
}

impl<W: WordSource + ?Sized> WordSource for &W {
    fn word_count(&self) -> usize {
        (**self).word_count()
    }

    fn load_word(&self, index: usize) -> u32 {
        (**self).load_word(index)
    }
}

/// Copy `dst.len()` bytes starting at byte `offset` out of a word store.
///
/// Each output byte is extracted from the word that encloses it; a word is
/// loaded once per run of bytes that share it. The range must lie inside the
/// store.
pub fn copy_aligned<W: WordSource + ?Sized>(source: &W, offset: usize, dst: &mut [u8]) {
    let mut loaded: Option<(usize, u32)> = None;

    for (i, out) in dst.iter_mut().enumerate() {
        let addr = offset + i;
        let index = addr / WORD_SIZE;
        let word = match loaded {
            Some((cached, word)) if cached == index => word,
            _ => {
                let word = source.load_word(index);
                loaded = Some((index, word));
                word
            }
        };
        *out = (word >> (8 * (addr % WORD_SIZE))) as u8;
    }
}

/// Read-only byte-addressed view of a volume image
pub trait VolumeSource {
    /// Total size of the image in bytes
    fn len(&self) -> usize;

    /// Whether the image is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`.
    ///
    /// Callers keep the range inside `0..len()`.
    fn read_at(&self, offset: usize, dst: &mut [u8]);
}

impl VolumeSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self[offset..offset + dst.len()]);
    }
}

impl VolumeSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) {
        self.as_slice().read_at(offset, dst);
    }
}

impl<S: VolumeSource + ?Sized> VolumeSource for &S {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) {
        (**self).read_at(offset, dst);
    }
}

/// Byte view over a word-only store, going through [`copy_aligned`]
#[derive(Debug, Clone)]
pub struct WordAligned<W> {
    words: W,
}

impl<W: WordSource> WordAligned<W> {
    /// Wrap a word store
    pub fn new(words: W) -> Self {
        Self { words }
    }

    /// Access the underlying word store
    pub fn words(&self) -> &W {
        &self.words
    }
}

impl<W: WordSource> VolumeSource for WordAligned<W> {
    fn len(&self) -> usize {
        self.words.word_count() * WORD_SIZE
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) {
        copy_aligned(&self.words, offset, dst);
    }
}

/// Owned word buffer holding a volume image.
///
/// Used on hosts that emulate a word-only flash mapping. The image is
/// zero-padded to a whole number of words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordImage {
    words: Vec<u32>,
}

impl WordImage {
    /// Pack a byte image into little-endian words
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let words = bytes
            .chunks(WORD_SIZE)
            .map(|chunk| {
                let mut word = [0u8; WORD_SIZE];
                word[..chunk.len()].copy_from_slice(chunk);
                u32::from_le_bytes(word)
            })
            .collect();
        Self { words }
    }

    /// Wrap the image so it can back a volume
    pub fn into_source(self) -> WordAligned<Self> {
        WordAligned::new(self)
    }
}

impl WordSource for WordImage {
    fn word_count(&self) -> usize {
        self.words.len()
    }

    fn load_word(&self, index: usize) -> u32 {
        self.words[index]
    }
}
