use std::sync::Arc;

use crate::{
    ids::{ClassId, NodeId, ObjectId, PredicateId, ShapeId, SubjectId, Triple},
    kernel::{AccessKernel, KernelSchema, LayoutFamily},
    store::triple_store::StoreDims,
    utils::{aligned_slab::BitSlab, bit_vector::BitVec},
};

/// L2 kernel: no dense PS->O, `ask` filters through `PV[p] & OV[o]` and confirms
/// against a sorted triple list.
#[derive(Debug)]
pub struct BitVectorKernel {
    dims: StoreDims,
    pv: BitSlab,
    ov: BitSlab,
    triples: Vec<Triple>,
    schema: Arc<KernelSchema>,
}

impl BitVectorKernel {
    pub fn build(dims: StoreDims, triples: &[Triple], schema: Arc<KernelSchema>) -> Self {
        let mut pv = BitSlab::new(dims.predicates as usize, dims.subjects as usize);
        let mut ov = BitSlab::new(dims.objects as usize, dims.subjects as usize);
        for t in triples {
            pv.set(t.p as usize, t.s as usize);
            ov.set(t.o as usize, t.s as usize);
        }
        let mut sorted = triples.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        Self {
            dims,
            pv,
            ov,
            triples: sorted,
            schema,
        }
    }

    /// Subjects matching both `(?, p1, o1)` and `(?, p2, o2)` at the slab level,
    /// `(PV[p1] & OV[o1]) & (PV[p2] & OV[o2])` chunk-wise.
    pub fn join_pair(&self, p1: PredicateId, o1: ObjectId, p2: PredicateId, o2: ObjectId) -> BitVec {
        let mut v = BitVec::new(self.dims.subjects as usize);
        if p1 >= self.dims.predicates
            || p2 >= self.dims.predicates
            || o1 >= self.dims.objects
            || o2 >= self.dims.objects
        {
            return v;
        }
        let words: Vec<u64> = self
            .pv
            .row_words(p1 as usize)
            .iter()
            .zip(self.ov.row_words(o1 as usize))
            .zip(self.pv.row_words(p2 as usize))
            .zip(self.ov.row_words(o2 as usize))
            .map(|(((a, b), c), d)| a & b & c & d)
            .collect();
        v.or_assign_words(&words);
        v
    }
}

impl AccessKernel for BitVectorKernel {
    #[inline]
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        if s >= self.dims.subjects || p >= self.dims.predicates || o >= self.dims.objects {
            return false;
        }
        self.pv.test(p as usize, s as usize)
            && self.ov.test(o as usize, s as usize)
            && self.triples.binary_search(&Triple::new(s, p, o)).is_ok()
    }

    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.schema.validate_node(node, shape)
    }

    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.schema.check_subclass(sub, sup)
    }

    fn layout(&self) -> LayoutFamily {
        LayoutFamily::BitVector
    }

    fn footprint_bytes(&self) -> usize {
        self.pv.footprint_bytes()
            + self.ov.footprint_bytes()
            + self.triples.len() * size_of::<Triple>()
            + self.schema.footprint_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{kernel::test_support, store::pso::PsoLayout};

    #[test]
    fn test_agrees_with_store() {
        let (st, schema) = test_support::fixture(PsoLayout::MultiObject);
        let triples: Vec<Triple> = st.iter_triples().collect();
        let kernel = BitVectorKernel::build(st.dims(), &triples, schema);
        assert_eq!(kernel.layout(), LayoutFamily::BitVector);
        test_support::assert_agrees(&kernel, &st);
    }

    #[test]
    fn test_join_pair() {
        let (st, schema) = test_support::fixture(PsoLayout::MultiObject);
        let triples: Vec<Triple> = st.iter_triples().collect();
        let kernel = BitVectorKernel::build(st.dims(), &triples, schema);
        // (7, 1, 57) exists but 7 has no (7, 2, 7)
        assert!(kernel.join_pair(1, 57, 2, 7).is_empty());
        let v = kernel.join_pair(1, 56, 2, 7);
        assert_eq!(v.to_ids(10), vec![6]);
        assert!(kernel.join_pair(9, 0, 1, 0).is_empty());
    }
}
