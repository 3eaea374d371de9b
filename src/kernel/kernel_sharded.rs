use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    errors::TickError,
    ids::{ClassId, NodeId, ObjectId, PredicateId, ShapeId, SubjectId, Triple},
    kernel::{AccessKernel, KernelSchema, LayoutFamily, LeafKernel},
    store::triple_store::StoreDims,
};

/// Subject-partitioned kernel.
/// * `shard_of(s) = s mod n` with `n` a power of two, so the dispatch is a mask.
/// * Shard `k` stores subject `s` under the local id `s >> log2(n)`.
#[derive(Debug)]
pub struct ShardedKernel {
    mask: u32,
    shift: u32,
    dims: StoreDims,
    shards: Vec<LeafKernel>,
    schema: Arc<KernelSchema>,
}

impl ShardedKernel {
    pub fn build(
        layout: LayoutFamily,
        dims: StoreDims,
        triples: &[Triple],
        schema: Arc<KernelSchema>,
        num_shards: u32,
    ) -> Result<Self, TickError> {
        if !num_shards.is_power_of_two() {
            return Err(TickError::InvalidConfig(format!(
                "shard count {num_shards} is not a power of two"
            )));
        }
        let mask = num_shards - 1;
        let shift = num_shards.trailing_zeros();

        let mut buckets: Vec<Vec<Triple>> = vec![vec![]; num_shards as usize];
        for t in triples {
            buckets[(t.s & mask) as usize].push(Triple::new(t.s >> shift, t.p, t.o));
        }

        let shards = buckets
            .into_par_iter()
            .enumerate()
            .map(|(k, local)| {
                let shard_dims = StoreDims {
                    subjects: shard_subjects(dims.subjects, num_shards, k as u32),
                    ..dims
                };
                tracing::debug!(
                    shard = k,
                    subjects = shard_dims.subjects,
                    triples = local.len(),
                    layout = layout.name(),
                    "building shard kernel"
                );
                LeafKernel::build(layout, shard_dims, &local, schema.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mask,
            shift,
            dims,
            shards,
            schema,
        })
    }

    #[inline]
    pub fn shard_of(&self, s: SubjectId) -> usize {
        (s & self.mask) as usize
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn shards(&self) -> &[LeafKernel] {
        &self.shards
    }

    /// Dimensions of shard `k`, which holds `ceil((S - k) / n)` subjects.
    pub fn shard_dims(&self, k: usize) -> StoreDims {
        StoreDims {
            subjects: shard_subjects(self.dims.subjects, self.shards.len() as u32, k as u32),
            ..self.dims
        }
    }
}

fn shard_subjects(subjects: u32, num_shards: u32, k: u32) -> u32 {
    if k >= subjects {
        0
    } else {
        (subjects - k).div_ceil(num_shards)
    }
}

impl AccessKernel for ShardedKernel {
    #[inline]
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        s < self.dims.subjects && self.shards[self.shard_of(s)].ask_pattern(s >> self.shift, p, o)
    }

    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.schema.validate_node(node, shape)
    }

    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.schema.check_subclass(sub, sup)
    }

    fn layout(&self) -> LayoutFamily {
        LayoutFamily::Sharded
    }

    /// Shard data plus one copy of the shared schema.
    fn footprint_bytes(&self) -> usize {
        let schema = self.schema.footprint_bytes();
        self.shards
            .iter()
            .map(|k| k.footprint_bytes().saturating_sub(schema))
            .sum::<usize>()
            + schema
    }
}
