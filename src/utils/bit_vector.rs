use bincode::{Decode, Encode};

#[inline]
pub(crate) const fn chunks_for(bits: usize) -> usize {
    bits.div_ceil(64)
}

/// Owned bit vector over a dense id range, carrying its cardinality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct BitVec {
    words: Vec<u64>,
    len: usize,
    cardinality: usize,
}

impl BitVec {
    /// Empty vector able to hold ids `0..len`.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; chunks_for(len)],
            len,
            cardinality: 0,
        }
    }

    /// Vector with every id in `0..len` set.
    pub fn full(len: usize) -> Self {
        let mut words = vec![!0u64; chunks_for(len)];
        if let Some(last) = words.last_mut()
            && len % 64 != 0
        {
            *last = (1u64 << (len % 64)) - 1;
        }
        Self {
            words,
            len,
            cardinality: len,
        }
    }

    /// Takes ownership of chunk words, recounting the set bits.
    pub fn from_words(words: Vec<u64>, len: usize) -> Self {
        debug_assert!(words.len() >= chunks_for(len));
        let cardinality = popcount(&words);
        Self {
            words,
            len,
            cardinality,
        }
    }

    pub fn from_ids<I: IntoIterator<Item = u32>>(len: usize, ids: I) -> Self {
        let mut v = Self::new(len);
        for id in ids {
            v.insert(id);
        }
        v
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality == 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        let id = id as usize;
        id < self.len && self.words[id >> 6] & (1u64 << (id & 63)) != 0
    }

    /// Sets the bit, returns true if it was newly set.
    /// * Ids past the end are ignored.
    pub fn insert(&mut self, id: u32) -> bool {
        let id = id as usize;
        if id >= self.len {
            return false;
        }
        let word = &mut self.words[id >> 6];
        let mask = 1u64 << (id & 63);
        if *word & mask != 0 {
            return false;
        }
        *word |= mask;
        self.cardinality += 1;
        true
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
        self.cardinality = 0;
    }

    /// Chunk-wise AND.
    pub fn intersect(&self, other: &BitVec) -> BitVec {
        let len = self.len.max(other.len);
        let mut words = vec![0u64; chunks_for(len)];
        let mut cardinality = 0;
        for (i, (a, b)) in self.words.iter().zip(&other.words).enumerate() {
            let w = a & b;
            cardinality += w.count_ones() as usize;
            words[i] = w;
        }
        Self {
            words,
            len,
            cardinality,
        }
    }

    /// Chunk-wise OR.
    pub fn union(&self, other: &BitVec) -> BitVec {
        let len = self.len.max(other.len);
        let mut words = vec![0u64; chunks_for(len)];
        let mut cardinality = 0;
        for (i, w) in words.iter_mut().enumerate() {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = other.words.get(i).copied().unwrap_or(0);
            *w = a | b;
            cardinality += w.count_ones() as usize;
        }
        Self {
            words,
            len,
            cardinality,
        }
    }

    /// Chunk-wise AND NOT.
    pub fn difference(&self, other: &BitVec) -> BitVec {
        let mut words = self.words.clone();
        let mut cardinality = 0;
        for (i, w) in words.iter_mut().enumerate() {
            *w &= !other.words.get(i).copied().unwrap_or(0);
            cardinality += w.count_ones() as usize;
        }
        Self {
            words,
            len: self.len,
            cardinality,
        }
    }

    /// In-place AND with a borrowed row, returns the new cardinality.
    pub fn and_assign_words(&mut self, row: &[u64]) -> usize {
        let mut cardinality = 0;
        for (i, w) in self.words.iter_mut().enumerate() {
            *w &= row.get(i).copied().unwrap_or(0);
            cardinality += w.count_ones() as usize;
        }
        self.cardinality = cardinality;
        cardinality
    }

    /// In-place OR with a borrowed row, returns the new cardinality.
    pub fn or_assign_words(&mut self, row: &[u64]) -> usize {
        let mut cardinality = 0;
        for (w, r) in self.words.iter_mut().zip(row) {
            *w |= r;
            cardinality += w.count_ones() as usize;
        }
        for w in self.words.iter().skip(row.len()) {
            cardinality += w.count_ones() as usize;
        }
        self.cardinality = cardinality;
        cardinality
    }

    /// Set ids in ascending order.
    pub fn iter_ones(&self) -> BitIter<'_> {
        BitIter::new(&self.words)
    }

    /// Decodes up to `limit` ids in ascending order.
    pub fn to_ids(&self, limit: usize) -> Vec<u32> {
        self.iter_ones().take(limit).collect()
    }

    pub fn as_row(&self) -> BitRow<'_> {
        BitRow {
            words: &self.words,
            len: self.len,
        }
    }
}

/// Read-only view of one slab row, borrowed from the engine.
#[derive(Clone, Copy, Debug)]
pub struct BitRow<'a> {
    words: &'a [u64],
    len: usize,
}

impl<'a> BitRow<'a> {
    pub(crate) fn new(words: &'a [u64], len: usize) -> Self {
        Self { words, len }
    }

    pub fn words(&self) -> &'a [u64] {
        self.words
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        let id = id as usize;
        id < self.len && self.words[id >> 6] & (1u64 << (id & 63)) != 0
    }

    pub fn cardinality(&self) -> usize {
        popcount(self.words)
    }

    pub fn iter_ones(&self) -> BitIter<'a> {
        BitIter::new(self.words)
    }

    pub fn to_bit_vec(&self) -> BitVec {
        BitVec::from_words(self.words.to_vec(), self.len)
    }
}

/// Ascending ctz scan over set bits.
pub struct BitIter<'a> {
    words: &'a [u64],
    chunk: usize,
    current: u64,
}

impl<'a> BitIter<'a> {
    fn new(words: &'a [u64]) -> Self {
        Self {
            words,
            chunk: 0,
            current: words.first().copied().unwrap_or(0),
        }
    }
}

impl Iterator for BitIter<'_> {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<u32> {
        while self.current == 0 {
            self.chunk += 1;
            self.current = *self.words.get(self.chunk)?;
        }
        let bit = self.current.trailing_zeros();
        self.current &= self.current - 1; // clear lowest set bit
        Some((self.chunk as u32) * 64 + bit)
    }
}

#[inline]
pub(crate) fn popcount(words: &[u64]) -> usize {
    words.iter().map(|w| w.count_ones() as usize).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_insert_and_contains_at_chunk_boundary() {
        let mut v = BitVec::new(130);
        assert!(v.insert(63));
        assert!(v.insert(64));
        assert!(!v.insert(64));
        assert_eq!(v.words()[0], 1u64 << 63);
        assert_eq!(v.words()[1], 1);
        assert_eq!(v.cardinality(), 2);
        assert!(!v.insert(130)); // past the end
        assert!(!v.contains(130));
    }

    #[test]
    fn test_full_masks_tail() {
        let v = BitVec::full(70);
        assert_eq!(v.cardinality(), 70);
        assert_eq!(v.words()[1], (1u64 << 6) - 1);
        assert_eq!(v.iter_ones().count(), 70);
    }

    #[test]
    fn test_iter_ones_ascending() {
        let v = BitVec::from_ids(300, [299, 0, 64, 128, 5]);
        assert_eq!(v.to_ids(usize::MAX), vec![0, 5, 64, 128, 299]);
        assert_eq!(v.to_ids(2), vec![0, 5]);
    }

    #[test]
    fn test_empty_iteration() {
        let v = BitVec::new(0);
        assert_eq!(v.iter_ones().next(), None);
        let v = BitVec::new(200);
        assert_eq!(v.iter_ones().next(), None);
    }

    fn ids() -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(0u32..500, 0..64)
    }

    proptest! {
        #[test]
        fn intersect_commutes(a in ids(), b in ids()) {
            let a = BitVec::from_ids(500, a);
            let b = BitVec::from_ids(500, b);
            prop_assert_eq!(a.intersect(&b), b.intersect(&a));
        }

        #[test]
        fn union_with_empty_is_identity(a in ids()) {
            let a = BitVec::from_ids(500, a);
            prop_assert_eq!(a.union(&BitVec::new(500)), a);
        }

        #[test]
        fn difference_with_self_is_empty(a in ids()) {
            let a = BitVec::from_ids(500, a);
            let d = a.difference(&a);
            prop_assert!(d.is_empty());
            prop_assert_eq!(d, BitVec::new(500));
        }

        #[test]
        fn cardinality_is_popcount(a in ids(), b in ids()) {
            let a = BitVec::from_ids(500, a);
            let b = BitVec::from_ids(500, b);
            for v in [a.intersect(&b), a.union(&b), a.difference(&b)] {
                prop_assert_eq!(v.cardinality(), popcount(v.words()));
                prop_assert_eq!(v.cardinality(), v.iter_ones().count());
            }
        }
    }
}
