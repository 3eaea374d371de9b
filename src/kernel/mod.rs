use std::{fmt, sync::Arc};

use crate::{
    errors::TickError,
    ids::{ClassId, NodeId, ObjectId, PredicateId, ShapeId, SubjectId, Triple},
    owl::owl_core::OwlCore,
    shacl::shacl_core::ShaclCore,
    store::triple_store::StoreDims,
    utils::aligned_slab::BitSlab,
};

pub mod kernel_bitvector;
pub mod kernel_compressed;
pub mod kernel_direct;
pub mod kernel_sharded;
pub mod rle;

use kernel_bitvector::BitVectorKernel;
use kernel_compressed::CompressedKernel;
use kernel_direct::DirectKernel;
use kernel_sharded::ShardedKernel;

/// Physical layout family of an emitted kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutFamily {
    /// Dense single-object PS->O array.
    Direct,
    /// Predicate/object slabs with a sorted triple list behind them.
    BitVector,
    /// CSR over (predicate, subject), dictionary-coded objects, RLE object vectors.
    Compressed,
    /// Subject partitions, each with its own leaf kernel.
    Sharded,
}

impl LayoutFamily {
    pub fn name(&self) -> &'static str {
        match self {
            LayoutFamily::Direct => "l1-direct",
            LayoutFamily::BitVector => "l2-bitvector",
            LayoutFamily::Compressed => "l3-compressed",
            LayoutFamily::Sharded => "sharded",
        }
    }
}

impl fmt::Display for LayoutFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The narrow surface every specialized kernel exposes.
/// * All ids are concrete, out of range ids answer false.
pub trait AccessKernel: Send + Sync {
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool;
    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool;
    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool;
    fn layout(&self) -> LayoutFamily;
    fn footprint_bytes(&self) -> usize;
}

/// SHACL and OWL state frozen into a kernel, shared by every shard.
#[derive(Debug)]
pub struct KernelSchema {
    shacl: ShaclCore,
    subclass: BitSlab,
}

impl KernelSchema {
    pub fn new(shacl: &ShaclCore, owl: &OwlCore) -> Result<Self, TickError> {
        owl.require_closures()?;
        Ok(Self {
            shacl: shacl.clone(),
            subclass: owl.subclass_closure().clone(),
        })
    }

    #[inline]
    pub fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.shacl.validate_node(node, shape)
    }

    #[inline]
    pub fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        let n = self.subclass.rows();
        (sub as usize) < n && (sup as usize) < n && self.subclass.test(sub as usize, sup as usize)
    }

    pub fn footprint_bytes(&self) -> usize {
        self.shacl.footprint_bytes() + self.subclass.footprint_bytes()
    }
}

/// One unsharded kernel.
#[derive(Debug)]
pub enum LeafKernel {
    Direct(DirectKernel),
    BitVector(BitVectorKernel),
    Compressed(CompressedKernel),
}

impl LeafKernel {
    /// Builds a leaf of `layout` from triples ordered by predicate, subject, object.
    pub fn build(
        layout: LayoutFamily,
        dims: StoreDims,
        triples: &[Triple],
        schema: Arc<KernelSchema>,
    ) -> Result<Self, TickError> {
        Ok(match layout {
            LayoutFamily::Direct => LeafKernel::Direct(DirectKernel::build(dims, triples, schema)?),
            LayoutFamily::BitVector => {
                LeafKernel::BitVector(BitVectorKernel::build(dims, triples, schema))
            }
            LayoutFamily::Compressed => {
                LeafKernel::Compressed(CompressedKernel::build(dims, triples, schema))
            }
            LayoutFamily::Sharded => {
                return Err(TickError::LayoutMismatch {
                    layout: LayoutFamily::Sharded.name(),
                    operation: "use as a leaf kernel",
                });
            }
        })
    }

    fn inner(&self) -> &dyn AccessKernel {
        match self {
            LeafKernel::Direct(k) => k,
            LeafKernel::BitVector(k) => k,
            LeafKernel::Compressed(k) => k,
        }
    }
}

impl AccessKernel for LeafKernel {
    #[inline]
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        match self {
            LeafKernel::Direct(k) => k.ask_pattern(s, p, o),
            LeafKernel::BitVector(k) => k.ask_pattern(s, p, o),
            LeafKernel::Compressed(k) => k.ask_pattern(s, p, o),
        }
    }

    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.inner().validate_node(node, shape)
    }

    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.inner().check_subclass(sub, sup)
    }

    fn layout(&self) -> LayoutFamily {
        self.inner().layout()
    }

    fn footprint_bytes(&self) -> usize {
        self.inner().footprint_bytes()
    }
}

/// Kernel chosen by the specializer, dispatched once per call.
#[derive(Debug)]
pub enum SpecializedKernel {
    Leaf(LeafKernel),
    Sharded(ShardedKernel),
}

impl AccessKernel for SpecializedKernel {
    #[inline]
    fn ask_pattern(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        match self {
            SpecializedKernel::Leaf(k) => k.ask_pattern(s, p, o),
            SpecializedKernel::Sharded(k) => k.ask_pattern(s, p, o),
        }
    }

    fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        match self {
            SpecializedKernel::Leaf(k) => k.validate_node(node, shape),
            SpecializedKernel::Sharded(k) => k.validate_node(node, shape),
        }
    }

    fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        match self {
            SpecializedKernel::Leaf(k) => k.check_subclass(sub, sup),
            SpecializedKernel::Sharded(k) => k.check_subclass(sub, sup),
        }
    }

    fn layout(&self) -> LayoutFamily {
        match self {
            SpecializedKernel::Leaf(k) => k.layout(),
            SpecializedKernel::Sharded(_) => LayoutFamily::Sharded,
        }
    }

    fn footprint_bytes(&self) -> usize {
        match self {
            SpecializedKernel::Leaf(k) => k.footprint_bytes(),
            SpecializedKernel::Sharded(k) => k.footprint_bytes(),
        }
    }
}
