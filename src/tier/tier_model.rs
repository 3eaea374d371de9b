use std::{fmt, str::FromStr};

use bincode::{Decode, Encode};

use crate::{errors::TickError, shacl::shacl_shape::CompiledShape, utils::bit_vector::chunks_for};

/// Code size attributed to every emitted kernel.
pub const KERNEL_CODE_KB: f64 = 12.0;

/// Below this many subjects the dense PS->O index is modelled.
pub const INDEX_SUBJECT_LIMIT: u64 = 10_000;

/// Cache tier a kernel's working set fits in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub enum ComplianceTier {
    L1,
    L2,
    L3,
    NonCompliant,
}

impl ComplianceTier {
    pub const ALL: [ComplianceTier; 4] = [
        ComplianceTier::L1,
        ComplianceTier::L2,
        ComplianceTier::L3,
        ComplianceTier::NonCompliant,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ComplianceTier::L1 => "L1",
            ComplianceTier::L2 => "L2",
            ComplianceTier::L3 => "L3",
            ComplianceTier::NonCompliant => "NON_COMPLIANT",
        }
    }

    pub fn spec(&self) -> &'static TierSpecification {
        &TIER_SPECIFICATIONS[*self as usize]
    }

    pub fn cap_kb(&self) -> f64 {
        self.spec().max_footprint_kb
    }
}

impl fmt::Display for ComplianceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComplianceTier {
    type Err = TickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L1" => Ok(ComplianceTier::L1),
            "L2" => Ok(ComplianceTier::L2),
            "L3" => Ok(ComplianceTier::L3),
            "NON_COMPLIANT" | "NONE" => Ok(ComplianceTier::NonCompliant),
            other => Err(TickError::InvalidConfig(format!(
                "unknown tier '{other}', expected L1, L2 or L3"
            ))),
        }
    }
}

/// Guarantees attached to a tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierSpecification {
    pub tier: ComplianceTier,
    pub max_footprint_kb: f64,
    pub max_latency_ns: f64,
    pub min_throughput_ops_sec: f64,
}

pub const TIER_SPECIFICATIONS: [TierSpecification; 4] = [
    TierSpecification {
        tier: ComplianceTier::L1,
        max_footprint_kb: 64.0,
        max_latency_ns: 10.0,
        min_throughput_ops_sec: 100e6,
    },
    TierSpecification {
        tier: ComplianceTier::L2,
        max_footprint_kb: 512.0,
        max_latency_ns: 30.0,
        min_throughput_ops_sec: 30e6,
    },
    TierSpecification {
        tier: ComplianceTier::L3,
        max_footprint_kb: 16384.0,
        max_latency_ns: 100.0,
        min_throughput_ops_sec: 10e6,
    },
    TierSpecification {
        tier: ComplianceTier::NonCompliant,
        max_footprint_kb: f64::INFINITY,
        max_latency_ns: 1000.0,
        min_throughput_ops_sec: 1e6,
    },
];

/// Schema counts, the only input of the footprint model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct SchemaProfile {
    pub num_classes: u64,
    pub num_properties: u64,
    pub num_shapes: u64,
    pub num_subjects: u64,
    pub num_predicates: u64,
    pub num_objects: u64,
    pub use_index: bool,
}

impl SchemaProfile {
    /// `use_index` follows the `subjects < 10_000` heuristic.
    pub fn new(
        num_classes: u64,
        num_properties: u64,
        num_shapes: u64,
        num_subjects: u64,
        num_predicates: u64,
        num_objects: u64,
    ) -> Self {
        Self {
            num_classes,
            num_properties,
            num_shapes,
            num_subjects,
            num_predicates,
            num_objects,
            use_index: num_subjects < INDEX_SUBJECT_LIMIT,
        }
    }

    pub fn with_index(mut self, use_index: bool) -> Self {
        self.use_index = use_index;
        self
    }

    /// Profile of one of `shards` subject partitions.
    /// * The index heuristic is re-applied to the shard's subject count.
    pub fn shard(&self, shards: u64) -> Self {
        let subjects = self.num_subjects.div_ceil(shards.max(1));
        Self {
            num_subjects: subjects,
            use_index: subjects < INDEX_SUBJECT_LIMIT,
            ..*self
        }
    }
}

fn kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

fn words(bits: u64) -> u64 {
    chunks_for(bits as usize) as u64
}

/// Subclass closure plus the four characteristic vectors.
pub fn owl_footprint_bytes(classes: u64, properties: u64) -> u64 {
    words(classes) * 8 * classes + 4 * words(properties) * 8
}

/// Shapes plus their property masks at 50% density.
pub fn shacl_footprint_bytes(shapes: u64, properties: u64) -> u64 {
    shapes * size_of::<CompiledShape>() as u64 + shapes * words(properties) * 8 / 2
}

/// Predicate and object slabs, plus the dense PS->O index when used.
pub fn sparql_footprint_bytes(subjects: u64, predicates: u64, objects: u64, use_index: bool) -> u64 {
    let row = words(subjects) * 8;
    let index = if use_index { predicates * subjects * 4 } else { 0 };
    predicates * row + objects * row + index
}

/// Per-slab KB of a kernel layout.
#[derive(Clone, Copy, Debug, PartialEq, Default, Encode, Decode)]
pub struct KernelFootprint {
    pub owl_class_masks_kb: f64,
    pub owl_property_vectors_kb: f64,
    pub shacl_shapes_kb: f64,
    pub sparql_predicate_vectors_kb: f64,
    pub sparql_object_vectors_kb: f64,
    pub sparql_index_kb: f64,
    pub kernel_code_kb: f64,
    pub total_kb: f64,
}

impl KernelFootprint {
    pub fn from_profile(profile: &SchemaProfile) -> Self {
        let owl = kb(owl_footprint_bytes(profile.num_classes, profile.num_properties));
        let shacl = kb(shacl_footprint_bytes(profile.num_shapes, profile.num_properties));
        let sparql = kb(sparql_footprint_bytes(
            profile.num_subjects,
            profile.num_predicates,
            profile.num_objects,
            profile.use_index,
        ));
        let (pred, obj, index) = if profile.use_index {
            (0.05, 0.05, 0.90)
        } else {
            (0.30, 0.70, 0.0)
        };
        Self {
            owl_class_masks_kb: owl * 0.8,
            owl_property_vectors_kb: owl * 0.2,
            shacl_shapes_kb: shacl,
            sparql_predicate_vectors_kb: sparql * pred,
            sparql_object_vectors_kb: sparql * obj,
            sparql_index_kb: sparql * index,
            kernel_code_kb: KERNEL_CODE_KB,
            total_kb: owl + shacl + sparql + KERNEL_CODE_KB,
        }
    }

    /// Named slabs in certificate order.
    pub fn slabs(&self) -> [(&'static str, f64); 7] {
        [
            ("owl_class_masks", self.owl_class_masks_kb),
            ("owl_property_vectors", self.owl_property_vectors_kb),
            ("shacl_shapes", self.shacl_shapes_kb),
            ("sparql_predicate_vectors", self.sparql_predicate_vectors_kb),
            ("sparql_object_vectors", self.sparql_object_vectors_kb),
            ("sparql_index", self.sparql_index_kb),
            ("kernel_code", self.kernel_code_kb),
        ]
    }

    pub fn largest_slab(&self) -> &'static str {
        self.slabs()
            .into_iter()
            .fold(("kernel_code", f64::MIN), |best, s| if s.1 > best.1 { s } else { best })
            .0
    }
}

/// Lowest tier whose cap holds the total.
pub fn calculate_compliance_tier(footprint: &KernelFootprint) -> ComplianceTier {
    ComplianceTier::ALL
        .into_iter()
        .find(|t| footprint.total_kb <= t.cap_kb())
        .unwrap_or(ComplianceTier::NonCompliant)
}

/// Footprint of `profile`, or `TierBudgetExceeded` when it does not fit `target`.
pub fn analyze_schema(
    profile: &SchemaProfile,
    target: ComplianceTier,
) -> Result<KernelFootprint, TickError> {
    let footprint = KernelFootprint::from_profile(profile);
    if calculate_compliance_tier(&footprint) > target {
        return Err(TickError::TierBudgetExceeded {
            tier: target,
            required_kb: footprint.total_kb,
            cap_kb: target.cap_kb(),
            largest_slab: footprint.largest_slab(),
        });
    }
    Ok(footprint)
}
