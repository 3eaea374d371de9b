use std::sync::Arc;

use crate::{
    errors::TickError,
    ids::{ClassId, NodeId, ObjectId, PredicateId, ShapeId, SubjectId, Triple},
    kernel::{AccessKernel, KernelSchema, LayoutFamily},
    store::triple_store::StoreDims,
};

const EMPTY_CELL: ObjectId = ObjectId::MAX;

/// L1 kernel: `ask(s, p, o)` is `objects[p * S + s] == o`.
#[derive(Debug)]
pub struct DirectKernel {
    subjects: u32,
    predicates: u32,
    objects: Vec<ObjectId>,
    schema: Arc<KernelSchema>,
}

impl DirectKernel {
    /// Fails with `LayoutMismatch` when a (predicate, subject) pair has two objects.
    pub fn build(
        dims: StoreDims,
        triples: &[Triple],
        schema: Arc<KernelSchema>,
    ) -> Result<Self, TickError> {
        let s_max = dims.subjects as usize;
        let mut objects = vec![EMPTY_CELL; dims.predicates as usize * s_max];
        for t in triples {
            let cell = &mut objects[t.p as usize * s_max + t.s as usize];
            if *cell != EMPTY_CELL && *cell != t.o {
                return Err(TickError::LayoutMismatch {
                    layout: LayoutFamily::Direct.name(),
                    operation: "a second object for one (predicate, subject) pair",
                });
            }
            *cell = t.o;
        }
        Ok(Self {
            subjects: dims.subjects,
            predicates: dims.predicates,
            objects,
            schema,
        })
    }

    pub fn cells(&self) -> &[ObjectId] {
        &self.objects
    }
}

impl AccessKernel for DirectKernel {
    #[inline]
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        s < self.subjects
            && p < self.predicates
            && o != EMPTY_CELL
            && self.objects[p as usize * self.subjects as usize + s as usize] == o
    }

    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.schema.validate_node(node, shape)
    }

    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.schema.check_subclass(sub, sup)
    }

    fn layout(&self) -> LayoutFamily {
        LayoutFamily::Direct
    }

    fn footprint_bytes(&self) -> usize {
        self.objects.len() * size_of::<ObjectId>() + self.schema.footprint_bytes()
    }
}
