use bincode::{Decode, Encode};
use rayon::{
    iter::{IndexedParallelIterator, ParallelIterator},
    slice::{ParallelSlice, ParallelSliceMut},
};

use crate::{
    errors::TickError,
    ids::{ClassId, IdKind, NodeId, PropertyId, ShapeId, check_id},
    shacl::{
        shacl_pattern::run_table,
        shacl_shape::{CompiledShape, constraint},
    },
    utils::{aligned_slab::BitSlab, bit_vector::BitRow},
};

/// Chunk size used by `validate_batch_parallel`.
pub const PARALLEL_CHUNK: usize = 1024;

const LANES: usize = 4;

static EMPTY_SHAPE: CompiledShape = CompiledShape::EMPTY;

/// Outcome of `add_shape`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeUpdate {
    Inserted,
    Unchanged,
    Replaced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ShaclDims {
    pub nodes: u32,
    pub classes: u32,
    pub properties: u32,
    pub shapes: u32,
}

/// Compiled shapes plus the node-side class/property indices.
#[derive(Clone, Debug)]
pub struct ShaclCore {
    dims: ShaclDims,
    shapes: Vec<CompiledShape>,
    present: Vec<bool>,
    node_class: BitSlab,
    node_property: BitSlab,
    node_datatype: Vec<u32>,
    node_value: Vec<u32>,
    node_literal: Vec<Option<Box<str>>>,
    property_count: Vec<u32>,
}

/// Owned copy of the node indices, for snapshots.
#[derive(Encode, Decode)]
pub(crate) struct ShaclParts {
    pub(crate) dims: ShaclDims,
    pub(crate) shapes: Vec<(ShapeId, CompiledShape)>,
    pub(crate) node_class: Vec<u64>,
    pub(crate) node_property: Vec<u64>,
    pub(crate) node_datatype: Vec<u32>,
    pub(crate) node_value: Vec<u32>,
    pub(crate) node_literal: Vec<Option<String>>,
}

impl ShaclCore {
    pub fn new(dims: ShaclDims) -> Self {
        let nodes = dims.nodes as usize;
        Self {
            dims,
            shapes: vec![CompiledShape::EMPTY; dims.shapes as usize],
            present: vec![false; dims.shapes as usize],
            node_class: BitSlab::new(nodes, dims.classes as usize),
            node_property: BitSlab::new(nodes, dims.properties as usize),
            node_datatype: vec![0; nodes],
            node_value: vec![0; nodes],
            node_literal: vec![None; nodes],
            property_count: vec![0; nodes],
        }
    }

    pub fn dims(&self) -> ShaclDims {
        self.dims
    }

    /// Store a compiled shape.
    /// * Identical payloads are a no-op, a different payload overwrites.
    pub fn add_shape(
        &mut self,
        shape_id: ShapeId,
        shape: CompiledShape,
    ) -> Result<ShapeUpdate, TickError> {
        check_id(IdKind::Shape, shape_id, self.dims.shapes)?;
        if shape.class_chunk as usize >= self.node_class.stride().max(1)
            || shape.property_chunk as usize >= self.node_property.stride().max(1)
        {
            return Err(TickError::InvalidShape(format!(
                "shape {shape_id} refers to a chunk outside the class/property range"
            )));
        }
        let idx = shape_id as usize;
        let update = if !self.present[idx] {
            ShapeUpdate::Inserted
        } else if self.shapes[idx] == shape {
            ShapeUpdate::Unchanged
        } else {
            tracing::debug!(shape_id, "overwriting compiled shape");
            ShapeUpdate::Replaced
        };
        self.shapes[idx] = shape;
        self.present[idx] = true;
        Ok(update)
    }

    pub fn shape(&self, shape_id: ShapeId) -> Option<&CompiledShape> {
        let idx = shape_id as usize;
        (idx < self.shapes.len() && self.present[idx]).then(|| &self.shapes[idx])
    }

    pub fn set_node_class(&mut self, node: NodeId, class: ClassId) -> Result<bool, TickError> {
        check_id(IdKind::Node, node, self.dims.nodes)?;
        check_id(IdKind::Class, class, self.dims.classes)?;
        Ok(self.node_class.set(node as usize, class as usize))
    }

    /// Sets the property bit and keeps `property_count` in step.
    pub fn set_node_property(
        &mut self,
        node: NodeId,
        prop: PropertyId,
    ) -> Result<bool, TickError> {
        check_id(IdKind::Node, node, self.dims.nodes)?;
        check_id(IdKind::Property, prop, self.dims.properties)?;
        let fresh = self.node_property.set(node as usize, prop as usize);
        if fresh {
            self.property_count[node as usize] += 1;
        }
        Ok(fresh)
    }

    pub fn set_node_datatype(&mut self, node: NodeId, datatype: u32) -> Result<(), TickError> {
        check_id(IdKind::Node, node, self.dims.nodes)?;
        self.node_datatype[node as usize] = datatype;
        Ok(())
    }

    pub fn set_node_value(&mut self, node: NodeId, value: u32) -> Result<(), TickError> {
        check_id(IdKind::Node, node, self.dims.nodes)?;
        self.node_value[node as usize] = value;
        Ok(())
    }

    pub fn set_node_literal(&mut self, node: NodeId, literal: &str) -> Result<(), TickError> {
        check_id(IdKind::Node, node, self.dims.nodes)?;
        self.node_literal[node as usize] = Some(literal.into());
        Ok(())
    }

    pub fn node_classes(&self, node: NodeId) -> Option<BitRow<'_>> {
        (node < self.dims.nodes).then(|| self.node_class.row(node as usize))
    }

    pub fn node_properties(&self, node: NodeId) -> Option<BitRow<'_>> {
        (node < self.dims.nodes).then(|| self.node_property.row(node as usize))
    }

    pub fn property_count(&self, node: NodeId) -> u32 {
        self.property_count.get(node as usize).copied().unwrap_or(0)
    }

    /// Shapes plus node indices, literal strings excluded.
    pub fn footprint_bytes(&self) -> usize {
        self.shapes.len() * size_of::<CompiledShape>()
            + self.node_class.footprint_bytes()
            + self.node_property.footprint_bytes()
            + (self.node_datatype.len() + self.node_value.len() + self.property_count.len()) * 4
    }

    #[inline]
    fn shape_or_empty(&self, shape_id: ShapeId) -> &CompiledShape {
        self.shapes.get(shape_id as usize).unwrap_or(&EMPTY_SHAPE)
    }

    #[inline]
    fn class_word(&self, node: NodeId, chunk: u32) -> u64 {
        if node < self.dims.nodes && (chunk as usize) < self.node_class.stride() {
            self.node_class.word(node as usize, chunk as usize)
        } else {
            0
        }
    }

    #[inline]
    fn property_word(&self, node: NodeId, chunk: u32) -> u64 {
        if node < self.dims.nodes && (chunk as usize) < self.node_property.stride() {
            self.node_property.word(node as usize, chunk as usize)
        } else {
            0
        }
    }

    /// Constant-time validation.
    /// * A node the shape does not target is valid.
    /// * Unknown nodes and shapes have no bits set, so they are vacuously valid.
    #[inline]
    pub fn validate_node(&self, node: NodeId, shape_id: ShapeId) -> bool {
        // 1. shape
        let shape = self.shape_or_empty(shape_id);
        // 2. classes
        let classes = self.class_word(node, shape.class_chunk);
        // 3. target hit
        let target_hit = classes & shape.target_class_mask;
        // 4. not targeted
        if target_hit == 0 {
            return true;
        }
        // 5. properties
        let props = self.property_word(node, shape.property_chunk);
        self.finish(node, shape, props)
    }

    /// Steps 6 and 7 plus the optional constraints.
    #[inline]
    fn finish(&self, node: NodeId, shape: &CompiledShape, props: u64) -> bool {
        // 6. required
        let mut valid = props & shape.required_property_mask == shape.required_property_mask;
        // 7. forbidden
        if shape.constraint_flags & constraint::FORBIDDEN != 0 {
            valid &= props & shape.forbidden_property_mask == 0;
        }
        if shape.constraint_flags & constraint::OPTIONAL != 0 {
            valid &= self.check_optional(node, shape, props);
        }
        valid
    }

    #[inline(never)]
    fn check_optional(&self, node: NodeId, shape: &CompiledShape, props: u64) -> bool {
        let idx = node as usize;
        let flags = shape.constraint_flags;

        let datatype = self.node_datatype.get(idx).copied().unwrap_or(0);
        let datatype_ok =
            flags & constraint::DATATYPE == 0 || shape.datatype_mask & (1u64 << (datatype & 63)) != 0;

        let count = if shape.cardinality_mask != 0 {
            (props & shape.cardinality_mask).count_ones()
        } else {
            self.property_count(node)
        };
        let count_ok = flags & constraint::CARDINALITY == 0
            || (shape.min_count <= count && count <= shape.max_count);

        let value = self.node_value.get(idx).copied().unwrap_or(0);
        let literal_ok = flags & constraint::LITERAL_SET == 0
            || shape.literal_set_mask & (1u64 << (value & 63)) != 0;

        let pattern_ok = flags & constraint::PATTERN == 0 || {
            let literal = self
                .node_literal
                .get(idx)
                .and_then(|l| l.as_deref())
                .unwrap_or("");
            run_table(
                &shape.pattern_dfa,
                flags & constraint::PATTERN_NON_EMPTY != 0,
                literal.as_bytes(),
            )
        };

        datatype_ok & count_ok & literal_ok & pattern_ok
    }

    pub fn try_validate_node(&self, node: NodeId, shape_id: ShapeId) -> Result<bool, TickError> {
        check_id(IdKind::Node, node, self.dims.nodes)?;
        check_id(IdKind::Shape, shape_id, self.dims.shapes)?;
        Ok(self.validate_node(node, shape_id))
    }

    /// Validates `nodes[i]` against `shapes[i]` into `results[i]`.
    /// * Four lanes per step, every load of a group is issued before any lane branches.
    pub fn validate_batch(
        &self,
        nodes: &[NodeId],
        shapes: &[ShapeId],
        results: &mut [bool],
    ) -> Result<(), TickError> {
        check_len(nodes.len(), shapes.len())?;
        check_len(nodes.len(), results.len())?;
        self.validate_lanes(nodes, shapes, results);
        Ok(())
    }

    fn validate_lanes(&self, nodes: &[NodeId], shapes: &[ShapeId], results: &mut [bool]) {
        let groups = nodes.len() / LANES * LANES;
        for ((n, s), r) in nodes[..groups]
            .chunks_exact(LANES)
            .zip(shapes[..groups].chunks_exact(LANES))
            .zip(results[..groups].chunks_exact_mut(LANES))
        {
            let shape: [&CompiledShape; LANES] =
                std::array::from_fn(|i| self.shape_or_empty(s[i]));
            let classes: [u64; LANES] =
                std::array::from_fn(|i| self.class_word(n[i], shape[i].class_chunk));
            let props: [u64; LANES] =
                std::array::from_fn(|i| self.property_word(n[i], shape[i].property_chunk));
            let targeted: [bool; LANES] =
                std::array::from_fn(|i| classes[i] & shape[i].target_class_mask != 0);
            for i in 0..LANES {
                r[i] = !targeted[i] || self.finish(n[i], shape[i], props[i]);
            }
        }
        for i in groups..nodes.len() {
            results[i] = self.validate_node(nodes[i], shapes[i]);
        }
    }

    /// `validate_batch` over fixed-size chunks processed on the rayon pool.
    pub fn validate_batch_parallel(
        &self,
        nodes: &[NodeId],
        shapes: &[ShapeId],
        results: &mut [bool],
    ) -> Result<(), TickError> {
        check_len(nodes.len(), shapes.len())?;
        check_len(nodes.len(), results.len())?;
        results
            .par_chunks_mut(PARALLEL_CHUNK)
            .zip(nodes.par_chunks(PARALLEL_CHUNK))
            .zip(shapes.par_chunks(PARALLEL_CHUNK))
            .for_each(|((r, n), s)| self.validate_lanes(n, s, r));
        Ok(())
    }

    pub(crate) fn to_parts(&self) -> ShaclParts {
        ShaclParts {
            dims: self.dims,
            shapes: self
                .present
                .iter()
                .enumerate()
                .filter(|(_, p)| **p)
                .map(|(i, _)| (i as ShapeId, self.shapes[i]))
                .collect(),
            node_class: self.node_class.to_row_words(),
            node_property: self.node_property.to_row_words(),
            node_datatype: self.node_datatype.clone(),
            node_value: self.node_value.clone(),
            node_literal: self
                .node_literal
                .iter()
                .map(|l| l.as_deref().map(str::to_owned))
                .collect(),
        }
    }

    pub(crate) fn from_parts(parts: ShaclParts) -> Result<Self, TickError> {
        let dims = parts.dims;
        let nodes = dims.nodes as usize;
        let bad = || TickError::InvalidConfig("snapshot SHACL index does not match its dimensions".into());
        let node_class = BitSlab::from_row_words(nodes, dims.classes as usize, &parts.node_class)
            .ok_or_else(bad)?;
        let node_property =
            BitSlab::from_row_words(nodes, dims.properties as usize, &parts.node_property)
                .ok_or_else(bad)?;
        if parts.node_datatype.len() != nodes
            || parts.node_value.len() != nodes
            || parts.node_literal.len() != nodes
        {
            return Err(bad());
        }
        let property_count = (0..nodes)
            .map(|n| node_property.row(n).cardinality() as u32)
            .collect();
        let mut core = Self {
            dims,
            shapes: vec![CompiledShape::EMPTY; dims.shapes as usize],
            present: vec![false; dims.shapes as usize],
            node_class,
            node_property,
            node_datatype: parts.node_datatype,
            node_value: parts.node_value,
            node_literal: parts
                .node_literal
                .into_iter()
                .map(|l| l.map(String::into_boxed_str))
                .collect(),
            property_count,
        };
        for (id, shape) in parts.shapes {
            core.add_shape(id, shape)?;
        }
        Ok(core)
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), TickError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TickError::LengthMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn core() -> ShaclCore {
        ShaclCore::new(ShaclDims {
            nodes: 512,
            classes: 128,
            properties: 128,
            shapes: 16,
        })
    }

    fn person_shape() -> CompiledShape {
        CompiledShape::builder()
            .target_class(1)
            .require_property(7)
            .build()
            .unwrap()
    }

    #[test]
    fn test_single_node_validation() {
        let mut c = core();
        c.add_shape(1, person_shape()).unwrap();
        c.set_node_class(100, 1).unwrap();
        c.set_node_property(100, 7).unwrap();
        c.set_node_class(200, 1).unwrap();
        c.set_node_class(300, 2).unwrap();
        assert!(c.validate_node(100, 1));
        assert!(!c.validate_node(200, 1));
        assert!(c.validate_node(300, 1));
    }

    #[test]
    fn test_add_shape_updates() {
        let mut c = core();
        assert_eq!(c.add_shape(2, person_shape()).unwrap(), ShapeUpdate::Inserted);
        assert_eq!(c.add_shape(2, person_shape()).unwrap(), ShapeUpdate::Unchanged);
        assert_eq!(c.add_shape(2, CompiledShape::EMPTY).unwrap(), ShapeUpdate::Replaced);
        assert!(c.add_shape(16, CompiledShape::EMPTY).is_err());
        let mut far = CompiledShape::EMPTY;
        far.class_chunk = 2;
        assert!(matches!(c.add_shape(3, far), Err(TickError::InvalidShape(_))));
        assert!(c.shape(3).is_none());
    }

    #[test]
    fn test_forbidden_properties() {
        let mut c = core();
        let shape = CompiledShape::builder()
            .target_class(4)
            .require_property(1)
            .forbid_property(2)
            .build()
            .unwrap();
        c.add_shape(0, shape).unwrap();
        for n in [10, 11] {
            c.set_node_class(n, 4).unwrap();
            c.set_node_property(n, 1).unwrap();
        }
        c.set_node_property(11, 2).unwrap();
        assert!(c.validate_node(10, 0));
        assert!(!c.validate_node(11, 0));
    }

    #[test]
    fn test_second_chunk_shape() {
        let mut c = core();
        let shape = CompiledShape::builder()
            .target_class(70)
            .require_property(100)
            .build()
            .unwrap();
        c.add_shape(5, shape).unwrap();
        c.set_node_class(1, 70).unwrap();
        assert!(!c.validate_node(1, 5));
        c.set_node_property(1, 100).unwrap();
        assert!(c.validate_node(1, 5));
        c.set_node_class(2, 6).unwrap(); // class 6 shares bit 6 but lives in chunk 0
        assert!(c.validate_node(2, 5));
    }

    #[test]
    fn test_optional_constraints() {
        let mut c = core();
        let shape = CompiledShape::builder()
            .target_class(1)
            .datatype(3)
            .literal_value(9)
            .count_range(1, 2)
            .pattern("[a-z]+")
            .unwrap()
            .build()
            .unwrap();
        c.add_shape(0, shape).unwrap();
        c.set_node_class(5, 1).unwrap();
        c.set_node_property(5, 20).unwrap();
        c.set_node_datatype(5, 3).unwrap();
        c.set_node_value(5, 9).unwrap();
        c.set_node_literal(5, "alice").unwrap();
        assert!(c.validate_node(5, 0));

        c.set_node_literal(5, "Alice").unwrap();
        assert!(!c.validate_node(5, 0));
        c.set_node_literal(5, "alice").unwrap();

        c.set_node_datatype(5, 4).unwrap();
        assert!(!c.validate_node(5, 0));
        c.set_node_datatype(5, 3).unwrap();

        c.set_node_value(5, 10).unwrap();
        assert!(!c.validate_node(5, 0));
        c.set_node_value(5, 9).unwrap();

        c.set_node_property(5, 21).unwrap();
        c.set_node_property(5, 22).unwrap();
        assert_eq!(c.property_count(5), 3);
        assert!(!c.validate_node(5, 0));
    }

    #[test]
    fn test_counted_properties_subset() {
        let mut c = core();
        let shape = CompiledShape::builder()
            .target_class(1)
            .count_property(3)
            .count_property(4)
            .count_range(2, 2)
            .build()
            .unwrap();
        c.add_shape(0, shape).unwrap();
        c.set_node_class(8, 1).unwrap();
        c.set_node_property(8, 3).unwrap();
        c.set_node_property(8, 50).unwrap();
        assert!(!c.validate_node(8, 0));
        c.set_node_property(8, 4).unwrap();
        assert!(c.validate_node(8, 0));
    }

    #[test]
    fn test_empty_shape_and_unknown_ids_are_vacuous() {
        let mut c = core();
        c.set_node_class(1, 0).unwrap();
        assert!(c.validate_node(1, 3));
        assert!(c.validate_node(10_000, 0));
        assert!(c.validate_node(1, 10_000));
        assert!(c.try_validate_node(10_000, 0).is_err());
    }

    #[test]
    fn test_validate_batch_matches_scalar() {
        let mut c = core();
        c.add_shape(1, person_shape()).unwrap();
        for n in 0..40 {
            if n % 2 == 0 {
                c.set_node_class(n, 1).unwrap();
            }
            if n % 3 == 0 {
                c.set_node_property(n, 7).unwrap();
            }
        }
        let nodes: Vec<u32> = (0..40).collect();
        let shapes = vec![1; 40];
        let mut batch = vec![false; 40];
        c.validate_batch(&nodes, &shapes, &mut batch).unwrap();
        let mut parallel = vec![false; 40];
        c.validate_batch_parallel(&nodes, &shapes, &mut parallel).unwrap();
        for n in 0..40 {
            assert_eq!(batch[n], c.validate_node(n as u32, 1), "node {n}");
        }
        assert_eq!(batch, parallel);
        assert!(matches!(
            c.validate_batch(&nodes, &shapes[..3], &mut batch),
            Err(TickError::LengthMismatch { .. })
        ));
    }

    proptest! {
        #[test]
        fn untargeted_nodes_are_valid(class in 0u32..64, target in 0u32..64, props in prop::collection::vec(0u32..64, 0..8)) {
            prop_assume!(class != target);
            let mut c = core();
            let shape = CompiledShape::builder().target_class(target).require_property(5).build().unwrap();
            c.add_shape(0, shape).unwrap();
            c.set_node_class(1, class).unwrap();
            for p in props {
                c.set_node_property(1, p).unwrap();
            }
            prop_assert!(c.validate_node(1, 0));
        }

        #[test]
        fn targeted_nodes_follow_property_law(
            required in prop::collection::vec(0u32..32, 0..4),
            forbidden in prop::collection::vec(32u32..64, 0..4),
            props in prop::collection::vec(0u32..64, 0..12),
        ) {
            let mut c = core();
            let mut b = CompiledShape::builder();
            b.target_class(1);
            required.iter().for_each(|p| { b.require_property(*p); });
            forbidden.iter().for_each(|p| { b.forbid_property(*p); });
            let shape = b.build().unwrap();
            c.add_shape(0, shape).unwrap();
            c.set_node_class(1, 1).unwrap();
            let mut node_props = 0u64;
            for p in props {
                c.set_node_property(1, p).unwrap();
                node_props |= 1 << p;
            }
            let req = shape.required_property_mask;
            let mut expected = node_props & req == req;
            if shape.has(constraint::FORBIDDEN) {
                expected &= node_props & shape.forbidden_property_mask == 0;
            }
            prop_assert_eq!(c.validate_node(1, 0), expected);
        }
    }
}
