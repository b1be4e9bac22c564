//! Word-packed atomic bitsets.
//!
//! This is a dense alternative to `Vec<AtomicBool>` for active-vertex flags.
//! Concurrent writers only ever OR bits in, so writes from different threads
//! merge without coordination.

use core::ops::Range;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Number of bits stored per word.
pub const WORD_BITS: usize = usize::BITS as usize;

/// A word-packed atomic bitset.
pub struct AtomicBitset {
    bits: usize,
    words: Vec<AtomicUsize>,
}

impl AtomicBitset {
    /// Creates a new bitset with `bits` bits, all cleared.
    pub fn new(bits: usize) -> Self {
        let words_len = bits.div_ceil(WORD_BITS);
        let words = (0..words_len).map(|_| AtomicUsize::new(0)).collect();
        Self { bits, words }
    }

    /// Number of bits.
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.bits
    }

    /// Clears all bits.
    pub fn clear_all(&self) {
        for w in &self.words {
            w.store(0, Ordering::Relaxed);
        }
    }

    /// Returns whether `bit` is set.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    #[inline]
    pub fn is_set(&self, bit: usize) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range for {} bits", self.bits);
        // SAFETY: index checked above.
        unsafe { self.is_set_unchecked(bit) }
    }

    /// Sets `bit` and returns `true` iff this call observed it previously cleared.
    ///
    /// # Panics
    /// Panics if `bit >= len_bits()`.
    #[inline]
    pub fn test_and_set(&self, bit: usize, order: Ordering) -> bool {
        assert!(bit < self.bits, "bit {bit} out of range for {} bits", self.bits);
        // SAFETY: index checked above.
        unsafe { self.test_and_set_unchecked(bit, order) }
    }

    /// # Safety
    /// Caller must ensure `bit < len_bits()`.
    #[inline(always)]
    pub unsafe fn is_set_unchecked(&self, bit: usize) -> bool {
        let (word, mask) = bit_word_mask(bit);
        // SAFETY: word index derived from bit < self.bits.
        (unsafe { self.words.get_unchecked(word) }.load(Ordering::Relaxed) & mask) != 0
    }

    /// # Safety
    /// Caller must ensure `bit < len_bits()`.
    #[inline(always)]
    pub unsafe fn test_and_set_unchecked(&self, bit: usize, order: Ordering) -> bool {
        let (word, mask) = bit_word_mask(bit);
        // SAFETY: word index derived from bit < self.bits.
        let prev = unsafe { self.words.get_unchecked(word) }.fetch_or(mask, order);
        (prev & mask) == 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    /// Returns `true` if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| w.load(Ordering::Relaxed) == 0)
    }

    /// Returns `true` if any bit in `range` is set.
    ///
    /// # Panics
    /// Panics if `range.end > len_bits()`.
    pub fn any_in_range(&self, range: Range<usize>) -> bool {
        self.iter_ones_in(range).next().is_some()
    }

    /// Iterates the set bits inside `range`, in ascending order.
    ///
    /// Each word is loaded once; bits set concurrently after that load may or
    /// may not be observed.
    ///
    /// # Panics
    /// Panics if `range.end > len_bits()`.
    pub fn iter_ones_in(&self, range: Range<usize>) -> OnesIter<'_> {
        assert!(
            range.end <= self.bits,
            "range end {} out of range for {} bits",
            range.end,
            self.bits
        );
        let mut iter = OnesIter {
            words: &self.words,
            word_idx: range.start / WORD_BITS,
            current: 0,
            start: range.start,
            end: range.end,
        };
        if range.start < range.end {
            iter.current = iter.load_masked(iter.word_idx);
        } else {
            iter.word_idx = iter.words.len();
        }
        iter
    }

    /// Iterates every set bit, in ascending order.
    pub fn iter_ones(&self) -> OnesIter<'_> {
        self.iter_ones_in(0..self.bits)
    }
}

impl core::fmt::Debug for AtomicBitset {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtomicBitset")
            .field("bits", &self.bits)
            .field("ones", &self.count_ones())
            .finish()
    }
}

/// Iterator over set bits of an [`AtomicBitset`].
pub struct OnesIter<'a> {
    words: &'a [AtomicUsize],
    word_idx: usize,
    current: usize,
    start: usize,
    end: usize,
}

impl OnesIter<'_> {
    #[inline]
    fn load_masked(&self, word_idx: usize) -> usize {
        let mut w = self.words[word_idx].load(Ordering::Relaxed);
        let base = word_idx * WORD_BITS;
        if self.start > base {
            w &= usize::MAX << (self.start - base);
        }
        let last = base + WORD_BITS;
        if self.end < last {
            w &= (1usize << (self.end - base)) - 1;
        }
        w
    }
}

impl Iterator for OnesIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.word_idx >= self.words.len() || self.word_idx * WORD_BITS >= self.end {
                return None;
            }
            if self.current != 0 {
                let tz = self.current.trailing_zeros() as usize;
                self.current &= self.current - 1;
                return Some(self.word_idx * WORD_BITS + tz);
            }
            self.word_idx += 1;
            if self.word_idx < self.words.len() && self.word_idx * WORD_BITS < self.end {
                self.current = self.load_masked(self.word_idx);
            }
        }
    }
}

#[inline(always)]
fn bit_word_mask(bit: usize) -> (usize, usize) {
    // `usize::BITS` is always a power-of-two, so use shifts/masks.
    // This is on the hot path for every relaxation.
    let shift = WORD_BITS.trailing_zeros();
    (bit >> shift, 1usize << (bit & (WORD_BITS - 1)))
}
