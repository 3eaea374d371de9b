use crate::{
    errors::TickError,
    ids::{IdKind, ObjectId, PredicateId, SubjectId, Triple, check_id},
    store::pso::{PsoLayout, PsoMap},
    utils::{
        aligned_slab::BitSlab,
        bit_vector::{BitRow, BitVec},
    },
};

/// Engine dimensions, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StoreDims {
    pub subjects: u32,
    pub predicates: u32,
    pub objects: u32,
}

/// Grow-only triple store over two bit-slabs and the PS->O map.
/// * `pv` row `p` has bit `s` set iff some `(s, p, _)` is asserted.
/// * `ov` row `o` has bit `s` set iff some `(s, _, o)` is asserted.
/// * Every asserted `(s, p, o)` has `o` in the PS->O cell `p * S + s`.
#[derive(Clone, Debug)]
pub struct TripleStore {
    dims: StoreDims,
    pv: BitSlab,
    ov: BitSlab,
    pso: PsoMap,
    triple_count: usize,
}

impl TripleStore {
    pub fn new(subjects: u32, predicates: u32, objects: u32, layout: PsoLayout) -> Self {
        let cells = predicates as usize * subjects as usize;
        Self {
            dims: StoreDims {
                subjects,
                predicates,
                objects,
            },
            pv: BitSlab::new(predicates as usize, subjects as usize),
            ov: BitSlab::new(objects as usize, subjects as usize),
            pso: PsoMap::new(layout, cells),
            triple_count: 0,
        }
    }

    pub(crate) fn from_parts(
        dims: StoreDims,
        pv: BitSlab,
        ov: BitSlab,
        pso: PsoMap,
        triple_count: usize,
    ) -> Self {
        Self {
            dims,
            pv,
            ov,
            pso,
            triple_count,
        }
    }

    pub fn dims(&self) -> StoreDims {
        self.dims
    }

    pub fn layout(&self) -> PsoLayout {
        self.pso.layout()
    }

    /// Number of distinct asserted triples.
    pub fn triple_count(&self) -> usize {
        self.triple_count
    }

    pub fn is_empty(&self) -> bool {
        self.triple_count == 0
    }

    pub(crate) fn pv(&self) -> &BitSlab {
        &self.pv
    }

    pub(crate) fn ov(&self) -> &BitSlab {
        &self.ov
    }

    pub(crate) fn pso(&self) -> &PsoMap {
        &self.pso
    }

    #[inline]
    fn cell(&self, p: PredicateId, s: SubjectId) -> usize {
        p as usize * self.dims.subjects as usize + s as usize
    }

    #[inline]
    fn in_range(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        s < self.dims.subjects && p < self.dims.predicates && o < self.dims.objects
    }

    pub(crate) fn check_triple(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> Result<(), TickError> {
        check_id(IdKind::Subject, s, self.dims.subjects)?;
        check_id(IdKind::Predicate, p, self.dims.predicates)?;
        check_id(IdKind::Object, o, self.dims.objects)
    }

    /// Would `add_triple` succeed, and would it add something new.
    pub fn check_add(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> Result<bool, TickError> {
        self.check_triple(s, p, o)?;
        let present = self.pv.test(p as usize, s as usize);
        self.pso.check_insert(self.cell(p, s), present, o)
    }

    /// Assert `(s, p, o)`. Returns true if the triple was new.
    /// * Set semantics, repeated triples are a no-op.
    /// * Bits are written in the order PV, OV, PS->O.
    /// * Nothing is written if the call errors.
    pub fn add_triple(
        &mut self,
        s: SubjectId,
        p: PredicateId,
        o: ObjectId,
    ) -> Result<bool, TickError> {
        if !self.check_add(s, p, o)? {
            return Ok(false);
        }
        let idx = self.cell(p, s);
        self.pv.set(p as usize, s as usize);
        self.ov.set(o as usize, s as usize);
        self.pso.insert(idx, o);
        self.triple_count += 1;
        Ok(true)
    }

    /// Exact triple test. Out of range ids answer false.
    #[inline]
    pub fn ask(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        if !self.in_range(s, p, o) {
            return false;
        }
        // 1. predicate bit
        if !self.pv.test(p as usize, s as usize) {
            return false;
        }
        // 2. PS->O cell
        self.pso.contains(self.cell(p, s), o)
    }

    pub fn try_ask(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> Result<bool, TickError> {
        self.check_triple(s, p, o)?;
        Ok(self.ask(s, p, o))
    }

    /// Does `s` have any object for `p`.
    #[inline]
    pub fn has_predicate(&self, s: SubjectId, p: PredicateId) -> bool {
        s < self.dims.subjects
            && p < self.dims.predicates
            && self.pv.test(p as usize, s as usize)
    }

    /// Word `s / 64` of row `p` in the predicate slab, zero when out of range.
    #[inline]
    pub(crate) fn predicate_word(&self, p: PredicateId, s: SubjectId) -> u64 {
        if s < self.dims.subjects && p < self.dims.predicates {
            self.pv.word(p as usize, (s >> 6) as usize)
        } else {
            0
        }
    }

    #[inline]
    pub(crate) fn pso_contains(&self, p: PredicateId, s: SubjectId, o: ObjectId) -> bool {
        self.pso.contains(self.cell(p, s), o)
    }

    pub(crate) fn predicate_row_ptr(&self, p: PredicateId) -> *const u64 {
        self.pv.row_ptr((p % self.dims.predicates.max(1)) as usize)
    }

    /// Objects of `(s, p)` in ascending order, empty when out of range.
    pub fn objects(&self, s: SubjectId, p: PredicateId) -> &[ObjectId] {
        if s >= self.dims.subjects || p >= self.dims.predicates {
            return &[];
        }
        let present = self.pv.test(p as usize, s as usize);
        self.pso.objects(self.cell(p, s), present)
    }

    /// `PV[p] AND OV[o]` with its cardinality.
    /// * A superset of the subjects with `(s, p, o)`: a subject may reach `o` through another predicate.
    pub fn subject_vector(&self, p: PredicateId, o: ObjectId) -> Result<BitVec, TickError> {
        check_id(IdKind::Predicate, p, self.dims.predicates)?;
        check_id(IdKind::Object, o, self.dims.objects)?;
        let mut v = self.pv.row(p as usize).to_bit_vec();
        v.and_assign_words(self.ov.row_words(o as usize));
        Ok(v)
    }

    /// Subjects `s` with `(s, p, o)` asserted.
    pub fn matching_subjects(&self, p: PredicateId, o: ObjectId) -> Result<BitVec, TickError> {
        let candidates = self.subject_vector(p, o)?;
        Ok(BitVec::from_ids(
            self.dims.subjects as usize,
            candidates
                .iter_ones()
                .filter(|s| self.pso_contains(p, *s, o)),
        ))
    }

    /// Objects of `(s, p)` as a vector over the object range.
    pub fn object_vector(&self, s: SubjectId, p: PredicateId) -> Result<BitVec, TickError> {
        check_id(IdKind::Subject, s, self.dims.subjects)?;
        check_id(IdKind::Predicate, p, self.dims.predicates)?;
        Ok(BitVec::from_ids(
            self.dims.objects as usize,
            self.objects(s, p).iter().copied(),
        ))
    }

    /// Predicates linking `s` to `o`, probing from the subject side.
    pub fn predicate_vector(&self, s: SubjectId, o: ObjectId) -> Result<BitVec, TickError> {
        check_id(IdKind::Subject, s, self.dims.subjects)?;
        check_id(IdKind::Object, o, self.dims.objects)?;
        let mut v = BitVec::new(self.dims.predicates as usize);
        if !self.ov.test(o as usize, s as usize) {
            return Ok(v);
        }
        for p in 0..self.dims.predicates {
            if self.pv.test(p as usize, s as usize) && self.pso_contains(p, s, o) {
                v.insert(p);
            }
        }
        Ok(v)
    }

    /// Row `p` of the predicate slab.
    pub fn predicate_row(&self, p: PredicateId) -> Result<BitRow<'_>, TickError> {
        check_id(IdKind::Predicate, p, self.dims.predicates)?;
        Ok(self.pv.row(p as usize))
    }

    /// Row `o` of the object slab.
    pub fn object_row(&self, o: ObjectId) -> Result<BitRow<'_>, TickError> {
        check_id(IdKind::Object, o, self.dims.objects)?;
        Ok(self.ov.row(o as usize))
    }

    /// Subjects with at least one asserted triple.
    pub fn active_subjects(&self) -> BitVec {
        let mut v = BitVec::new(self.dims.subjects as usize);
        for p in 0..self.dims.predicates as usize {
            v.or_assign_words(self.pv.row_words(p));
        }
        v
    }

    /// Every asserted triple, ordered by predicate, subject, object.
    pub fn iter_triples(&self) -> impl Iterator<Item = Triple> + '_ {
        (0..self.dims.predicates).flat_map(move |p| {
            self.pv.row(p as usize).iter_ones().flat_map(move |s| {
                self.pso
                    .objects(self.cell(p, s), true)
                    .iter()
                    .map(move |o| Triple::new(s, p, *o))
            })
        })
    }

    /// Triples of one predicate, ordered by subject then object.
    pub fn iter_predicate(&self, p: PredicateId) -> impl Iterator<Item = Triple> + '_ {
        let row = if p < self.dims.predicates {
            Some(self.pv.row(p as usize))
        } else {
            None
        };
        row.into_iter().flat_map(move |row| {
            row.iter_ones().flat_map(move |s| {
                self.objects(s, p).iter().map(move |o| Triple::new(s, p, *o))
            })
        })
    }

    pub fn has_multi_object_cells(&self) -> bool {
        self.pso.multi_object_cells() > 0
    }

    pub fn footprint_bytes(&self) -> usize {
        self.pv.footprint_bytes() + self.ov.footprint_bytes() + self.pso.footprint_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn store() -> TripleStore {
        TripleStore::new(1000, 100, 1000, PsoLayout::MultiObject)
    }

    #[test]
    fn test_basic_ask() {
        let mut st = TripleStore::new(100, 10, 1000, PsoLayout::MultiObject);
        st.add_triple(42, 1, 100).unwrap();
        st.add_triple(42, 2, 200).unwrap();
        st.add_triple(99, 1, 100).unwrap();
        assert!(st.ask(42, 1, 100));
        assert!(!st.ask(42, 1, 200));
        assert!(st.ask(99, 1, 100));
        assert!(!st.ask(99, 2, 200));
    }

    #[test]
    fn test_multiple_objects_same_cell() {
        let mut st = store();
        for (s, p, o) in [(1, 2, 3), (1, 2, 4), (1, 2, 5), (2, 2, 3)] {
            assert!(st.add_triple(s, p, o).unwrap());
        }
        assert!(st.ask(1, 2, 3));
        assert!(st.ask(1, 2, 4));
        assert!(st.ask(1, 2, 5));
        assert!(st.ask(2, 2, 3));
        assert!(!st.ask(1, 2, 6));
        assert_eq!(st.objects(1, 2), &[3, 4, 5]);
        assert_eq!(st.triple_count(), 4);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut st = store();
        assert!(st.add_triple(5, 5, 5).unwrap());
        assert!(!st.add_triple(5, 5, 5).unwrap());
        assert_eq!(st.triple_count(), 1);
        assert_eq!(st.objects(5, 5), &[5]);
    }

    #[test]
    fn test_out_of_range_is_rejected_without_side_effects() {
        let mut st = TripleStore::new(100, 10, 100, PsoLayout::MultiObject);
        let err = st.add_triple(42, 1, 100).unwrap_err();
        assert!(matches!(
            err,
            TickError::IdOutOfRange {
                kind: IdKind::Object,
                id: 100,
                max: 100
            }
        ));
        assert!(st.is_empty());
        assert!(st.predicate_row(1).unwrap().is_empty());
        assert!(!st.ask(42, 1, 100));
        assert!(st.try_ask(42, 1, 100).is_err());
        assert!(st.subject_vector(10, 0).is_err());
    }

    #[test]
    fn test_single_object_layout_mismatch_leaves_store_untouched() {
        let mut st = TripleStore::new(10, 4, 10, PsoLayout::SingleObject);
        st.add_triple(1, 1, 2).unwrap();
        let err = st.add_triple(1, 1, 3).unwrap_err();
        assert!(matches!(err, TickError::LayoutMismatch { .. }));
        assert!(!st.ov().test(3, 1));
        assert!(st.ask(1, 1, 2));
        assert!(!st.ask(1, 1, 3));
        assert_eq!(st.triple_count(), 1);
    }

    #[test]
    fn test_chunk_boundary_subjects() {
        let mut st = store();
        st.add_triple(63, 1, 7).unwrap();
        st.add_triple(64, 1, 7).unwrap();
        let row = st.predicate_row(1).unwrap();
        assert_eq!(row.words()[0], 1u64 << 63);
        assert_eq!(row.words()[1], 1);
        assert_eq!(st.subject_vector(1, 7).unwrap().to_ids(10), vec![63, 64]);
    }

    #[test]
    fn test_vectors() {
        let mut st = store();
        st.add_triple(1, 2, 3).unwrap();
        st.add_triple(1, 4, 3).unwrap();
        st.add_triple(1, 2, 9).unwrap();
        st.add_triple(7, 4, 9).unwrap();
        assert_eq!(st.object_vector(1, 2).unwrap().to_ids(10), vec![3, 9]);
        assert_eq!(st.predicate_vector(1, 3).unwrap().to_ids(10), vec![2, 4]);
        assert_eq!(st.predicate_vector(7, 3).unwrap().cardinality(), 0);
        // raw AND includes subject 1 via (1, 2, 9), exact set does not include 7
        assert_eq!(st.subject_vector(4, 9).unwrap().to_ids(10), vec![1, 7]);
        assert_eq!(st.matching_subjects(4, 9).unwrap().to_ids(10), vec![7]);
        assert_eq!(st.active_subjects().to_ids(10), vec![1, 7]);
    }

    #[test]
    fn test_empty_store() {
        let st = store();
        assert!(!st.ask(0, 0, 0));
        assert_eq!(st.subject_vector(3, 3).unwrap().cardinality(), 0);
        assert_eq!(st.iter_triples().count(), 0);
    }

    #[test]
    fn test_full_predicate_row_yields_object_row() {
        let mut st = TripleStore::new(128, 4, 8, PsoLayout::MultiObject);
        for s in 0..128 {
            st.add_triple(s, 1, s % 8).unwrap();
        }
        for o in 0..8 {
            let sv = st.subject_vector(1, o).unwrap();
            assert_eq!(sv, st.object_row(o).unwrap().to_bit_vec());
        }
    }

    proptest! {
        #[test]
        fn ask_after_add(triples in prop::collection::vec((0u32..200, 0u32..16, 0u32..200), 1..64)) {
            let mut st = TripleStore::new(200, 16, 200, PsoLayout::MultiObject);
            for (s, p, o) in &triples {
                st.add_triple(*s, *p, *o).unwrap();
            }
            for (s, p, o) in &triples {
                prop_assert!(st.ask(*s, *p, *o));
                prop_assert!(st.pv().test(*p as usize, *s as usize));
                prop_assert!(st.ov().test(*o as usize, *s as usize));
            }
            // no false positives
            for t in st.iter_triples() {
                prop_assert!(triples.contains(&(t.s, t.p, t.o)));
            }
            // every predicate bit has a witness
            for p in 0..16 {
                for s in st.predicate_row(p).unwrap().iter_ones() {
                    prop_assert!(!st.objects(s, p).is_empty());
                }
            }
        }

        #[test]
        fn subject_vector_is_row_and(triples in prop::collection::vec((0u32..300, 0u32..4, 0u32..8), 0..64), p in 0u32..4, o in 0u32..8) {
            let mut st = TripleStore::new(300, 4, 8, PsoLayout::MultiObject);
            for (s, p, o) in &triples {
                st.add_triple(*s, *p, *o).unwrap();
            }
            let sv = st.subject_vector(p, o).unwrap();
            let pv = st.predicate_row(p).unwrap();
            let ov = st.object_row(o).unwrap();
            for (i, w) in sv.words().iter().enumerate() {
                prop_assert_eq!(*w, pv.words()[i] & ov.words()[i]);
            }
        }
    }
}
