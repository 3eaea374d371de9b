use bytemuck::{Pod, Zeroable};

use crate::utils::bit_vector::{BitRow, chunks_for};

pub(crate) const CACHE_LINE_BYTES: usize = 64;
pub(crate) const WORDS_PER_LINE: usize = CACHE_LINE_BYTES / 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C, align(64))]
pub(crate) struct CacheLine([u64; WORDS_PER_LINE]);

// SAFETY: a 64 byte array of u64 with no padding, any bit pattern is valid.
unsafe impl Zeroable for CacheLine {}
unsafe impl Pod for CacheLine {}

const _: () = {
    assert!(core::mem::size_of::<CacheLine>() == CACHE_LINE_BYTES);
    assert!(core::mem::align_of::<CacheLine>() == CACHE_LINE_BYTES);
};

/// Dense bit matrix of `rows x bits_per_row`.
/// * Storage is a run of 64 byte aligned cache lines.
/// * Every row starts on a cache line, the row pitch is a whole number of lines.
/// * `stride` is the number of meaningful words per row, `pitch` the words between row starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitSlab {
    lines: Vec<CacheLine>,
    rows: usize,
    bits_per_row: usize,
    stride: usize,
    pitch: usize,
}

impl BitSlab {
    pub fn new(rows: usize, bits_per_row: usize) -> Self {
        let stride = chunks_for(bits_per_row);
        let pitch = stride.div_ceil(WORDS_PER_LINE) * WORDS_PER_LINE;
        let lines = vec![CacheLine::default(); rows * pitch / WORDS_PER_LINE];
        debug_assert_eq!(lines.as_ptr() as usize % CACHE_LINE_BYTES, 0);
        Self {
            lines,
            rows,
            bits_per_row,
            stride,
            pitch,
        }
    }

    /// Rebuilds a slab from its meaningful words, `stride` words per row.
    pub fn from_row_words(rows: usize, bits_per_row: usize, words: &[u64]) -> Option<Self> {
        let mut slab = Self::new(rows, bits_per_row);
        let stride = slab.stride;
        if words.len() != rows * stride {
            return None;
        }
        for r in 0..rows {
            slab.row_words_mut(r)
                .copy_from_slice(&words[r * stride..(r + 1) * stride]);
        }
        Some(slab)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn bits_per_row(&self) -> usize {
        self.bits_per_row
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn footprint_bytes(&self) -> usize {
        self.lines.len() * CACHE_LINE_BYTES
    }

    #[inline]
    fn words(&self) -> &[u64] {
        bytemuck::cast_slice(&self.lines)
    }

    #[inline]
    fn words_mut(&mut self) -> &mut [u64] {
        bytemuck::cast_slice_mut(&mut self.lines)
    }

    /// Single word of a row, the unit every hot path loads.
    #[inline]
    pub fn word(&self, row: usize, chunk: usize) -> u64 {
        self.words()[row * self.pitch + chunk]
    }

    #[inline]
    pub fn test(&self, row: usize, bit: usize) -> bool {
        self.word(row, bit >> 6) & (1u64 << (bit & 63)) != 0
    }

    /// Sets a bit, returns true if it was newly set.
    #[inline]
    pub fn set(&mut self, row: usize, bit: usize) -> bool {
        let idx = row * self.pitch + (bit >> 6);
        let mask = 1u64 << (bit & 63);
        let word = &mut self.words_mut()[idx];
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    #[inline]
    pub fn row_words(&self, row: usize) -> &[u64] {
        let start = row * self.pitch;
        &self.words()[start..start + self.stride]
    }

    #[inline]
    pub fn row_words_mut(&mut self, row: usize) -> &mut [u64] {
        let start = row * self.pitch;
        let stride = self.stride;
        &mut self.words_mut()[start..start + stride]
    }

    pub fn row(&self, row: usize) -> BitRow<'_> {
        BitRow::new(self.row_words(row), self.bits_per_row)
    }

    /// Address of the first word of a row, for prefetching.
    #[inline]
    pub fn row_ptr(&self, row: usize) -> *const u64 {
        self.words()[row * self.pitch..].as_ptr()
    }

    /// Meaningful words of every row, concatenated.
    pub fn to_row_words(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.rows * self.stride);
        for r in 0..self.rows {
            out.extend_from_slice(self.row_words(r));
        }
        out
    }

    /// `rows[dst] |= rows[src]`, returns true if `dst` changed.
    pub fn or_row_into(&mut self, src: usize, dst: usize) -> bool {
        if src == dst {
            return false;
        }
        let pitch = self.pitch;
        let stride = self.stride;
        let words = self.words_mut();
        let (src_row, dst_row) = if src < dst {
            let (lo, hi) = words.split_at_mut(dst * pitch);
            (&lo[src * pitch..src * pitch + stride], &mut hi[..stride])
        } else {
            let (lo, hi) = words.split_at_mut(src * pitch);
            (&hi[..stride], &mut lo[dst * pitch..dst * pitch + stride])
        };
        let mut changed = 0u64;
        for (d, s) in dst_row.iter_mut().zip(src_row) {
            changed |= s & !*d;
            *d |= s;
        }
        changed != 0
    }

    /// Rows as mutable slices of `stride` words, for parallel row updates.
    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut [u64]> {
        let stride = self.stride;
        let pitch = self.pitch;
        self.words_mut()
            .chunks_mut(pitch.max(1))
            .map(move |chunk| &mut chunk[..stride])
    }

    pub(crate) fn par_rows_mut(&mut self) -> rayon::slice::ChunksMut<'_, u64> {
        use rayon::slice::ParallelSliceMut;
        let pitch = self.pitch.max(1);
        self.words_mut().par_chunks_mut(pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_cache_aligned() {
        let slab = BitSlab::new(5, 100);
        assert_eq!(slab.stride(), 2);
        assert_eq!(slab.pitch(), 8);
        for r in 0..5 {
            assert_eq!(slab.row_ptr(r) as usize % CACHE_LINE_BYTES, 0);
        }
        assert_eq!(slab.footprint_bytes(), 5 * 64);
    }

    #[test]
    fn test_wide_rows_round_up_to_lines() {
        let slab = BitSlab::new(2, 64 * 9);
        assert_eq!(slab.stride(), 9);
        assert_eq!(slab.pitch(), 16);
    }

    #[test]
    fn test_set_and_test_chunk_boundaries() {
        let mut slab = BitSlab::new(3, 200);
        assert!(slab.set(1, 63));
        assert!(slab.set(1, 64));
        assert!(!slab.set(1, 64));
        assert_eq!(slab.word(1, 0), 1u64 << 63);
        assert_eq!(slab.word(1, 1), 1);
        assert!(slab.test(1, 63));
        assert!(!slab.test(0, 63));
        assert!(!slab.test(2, 64));
        assert_eq!(slab.row(1).cardinality(), 2);
    }

    #[test]
    fn test_or_row_into_both_directions() {
        let mut slab = BitSlab::new(4, 128);
        slab.set(0, 1);
        slab.set(3, 100);
        assert!(slab.or_row_into(0, 3));
        assert!(slab.test(3, 1));
        assert!(!slab.or_row_into(0, 3));
        assert!(slab.or_row_into(3, 0));
        assert!(slab.test(0, 100));
    }

    #[test]
    fn test_row_words_round_trip() {
        let mut slab = BitSlab::new(3, 70);
        slab.set(0, 3);
        slab.set(2, 69);
        let words = slab.to_row_words();
        assert_eq!(words.len(), 6);
        let rebuilt = BitSlab::from_row_words(3, 70, &words).unwrap();
        assert_eq!(rebuilt, slab);
        assert!(BitSlab::from_row_words(3, 70, &words[..5]).is_none());

        let empty = BitSlab::from_row_words(4, 0, &[]).unwrap();
        assert_eq!(empty.rows(), 4);
    }
}
