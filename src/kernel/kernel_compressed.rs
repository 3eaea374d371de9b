use std::sync::Arc;

use crate::{
    ids::{ClassId, NodeId, ObjectId, PredicateId, ShapeId, SubjectId, Triple},
    kernel::{AccessKernel, KernelSchema, LayoutFamily, rle::RleBitVec},
    store::triple_store::StoreDims,
};

/// L3 kernel.
/// * CSR over (predicate, subject): `row_ptrs[p] .. row_ptrs[p + 1]` indexes the sorted
///   subjects of `p`, `value_ptrs` the object codes of each (p, s) entry.
/// * Objects are dictionary coded, `dictionary[code]` is the object id.
/// * Per object code, an RLE vector of the subjects pointing at it.
#[derive(Debug)]
pub struct CompressedKernel {
    dims: StoreDims,
    row_ptrs: Vec<u32>,
    col_subjects: Vec<SubjectId>,
    value_ptrs: Vec<u32>,
    values: Vec<u32>,
    dictionary: Vec<ObjectId>,
    object_subjects: Vec<RleBitVec>,
    schema: Arc<KernelSchema>,
}

impl CompressedKernel {
    pub fn build(dims: StoreDims, triples: &[Triple], schema: Arc<KernelSchema>) -> Self {
        let mut sorted: Vec<Triple> = triples.to_vec();
        sorted.sort_unstable_by_key(|t| (t.p, t.s, t.o));
        sorted.dedup();

        let mut dictionary: Vec<ObjectId> = sorted.iter().map(|t| t.o).collect();
        dictionary.sort_unstable();
        dictionary.dedup();

        let mut row_ptrs = vec![0u32; dims.predicates as usize + 1];
        let mut col_subjects = vec![];
        let mut value_ptrs = vec![0u32];
        let mut values = vec![];
        let mut linked: Vec<Vec<SubjectId>> = vec![vec![]; dictionary.len()];

        let mut prev: Option<(PredicateId, SubjectId)> = None;
        for t in &sorted {
            if prev != Some((t.p, t.s)) {
                if prev.is_some() {
                    value_ptrs.push(values.len() as u32);
                }
                col_subjects.push(t.s);
                row_ptrs[t.p as usize + 1] += 1;
                prev = Some((t.p, t.s));
            }
            // dictionary is built from these objects
            let code = dictionary.binary_search(&t.o).unwrap_or_default();
            values.push(code as u32);
            linked[code].push(t.s);
        }
        if prev.is_some() {
            value_ptrs.push(values.len() as u32);
        }
        for p in 0..dims.predicates as usize {
            row_ptrs[p + 1] += row_ptrs[p];
        }

        let object_subjects = linked
            .into_iter()
            .map(|mut subjects| {
                subjects.sort_unstable();
                RleBitVec::from_sorted_ids(dims.subjects, subjects)
            })
            .collect();

        Self {
            dims,
            row_ptrs,
            col_subjects,
            value_ptrs,
            values,
            dictionary,
            object_subjects,
            schema,
        }
    }

    pub fn dictionary(&self) -> &[ObjectId] {
        &self.dictionary
    }

    /// Number of (predicate, subject) entries.
    pub fn nnz(&self) -> usize {
        self.col_subjects.len()
    }

    /// Subjects with any triple pointing at `o`.
    pub fn object_subjects(&self, o: ObjectId) -> Option<&RleBitVec> {
        let code = self.dictionary.binary_search(&o).ok()?;
        self.object_subjects.get(code)
    }

    /// Objects of `(s, p)` in ascending order.
    pub fn objects(&self, s: SubjectId, p: PredicateId) -> Vec<ObjectId> {
        self.entry(s, p)
            .map(|idx| self.codes(idx).iter().map(|c| self.dictionary[*c as usize]).collect())
            .unwrap_or_default()
    }

    #[inline]
    fn entry(&self, s: SubjectId, p: PredicateId) -> Option<usize> {
        if p >= self.dims.predicates {
            return None;
        }
        let lo = self.row_ptrs[p as usize] as usize;
        let hi = self.row_ptrs[p as usize + 1] as usize;
        self.col_subjects[lo..hi]
            .binary_search(&s)
            .ok()
            .map(|i| lo + i)
    }

    #[inline]
    fn codes(&self, idx: usize) -> &[u32] {
        &self.values[self.value_ptrs[idx] as usize..self.value_ptrs[idx + 1] as usize]
    }
}

impl AccessKernel for CompressedKernel {
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        let Ok(code) = self.dictionary.binary_search(&o) else {
            return false;
        };
        self.entry(s, p)
            .is_some_and(|idx| self.codes(idx).binary_search(&(code as u32)).is_ok())
    }

    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.schema.validate_node(node, shape)
    }

    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.schema.check_subclass(sub, sup)
    }

    fn layout(&self) -> LayoutFamily {
        LayoutFamily::Compressed
    }

    fn footprint_bytes(&self) -> usize {
        (self.row_ptrs.len()
            + self.col_subjects.len()
            + self.value_ptrs.len()
            + self.values.len()
            + self.dictionary.len())
            * 4
            + self
                .object_subjects
                .iter()
                .map(RleBitVec::footprint_bytes)
                .sum::<usize>()
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
        let kernel = CompressedKernel::build(st.dims(), &triples, schema);
        assert_eq!(kernel.layout(), LayoutFamily::Compressed);
        test_support::assert_agrees(&kernel, &st);
        assert_eq!(kernel.nnz(), 200 + 67 + 1);
    }

    #[test]
    fn test_objects_and_rle_vectors() {
        let (st, schema) = test_support::fixture(PsoLayout::MultiObject);
        let triples: Vec<Triple> = st.iter_triples().collect();
        let kernel = CompressedKernel::build(st.dims(), &triples, schema);
        assert_eq!(kernel.objects(64, 3), vec![1, 2]);
        assert_eq!(kernel.objects(5, 1), vec![55, 299]);
        assert!(kernel.objects(5, 9).is_empty());

        let linked = kernel.object_subjects(7).unwrap();
        assert_eq!(linked.cardinality(), 67);
        assert!(linked.contains(198) && !linked.contains(199));
        assert_eq!(
            linked.to_bit_vec(),
            st.matching_subjects(2, 7).unwrap()
        );
        assert!(kernel.object_subjects(3).is_none());
    }
}
