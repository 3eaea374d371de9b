use std::{fmt::Write, sync::Arc};

use crate::{
    batch::batch_evaluator::ask_batch_with,
    errors::TickError,
    ids::Triple,
    kernel::{
        KernelSchema, LayoutFamily, LeafKernel, SpecializedKernel, kernel_sharded::ShardedKernel,
    },
    owl::owl_core::OwlCore,
    shacl::shacl_core::ShaclCore,
    sparql::sparql_pattern::TriplePattern,
    store::triple_store::TripleStore,
    tier::{
        certificate::ComplianceCertificate,
        compiler_config::{CompilerConfig, OptimizeFor},
        tier_model::{
            ComplianceTier, INDEX_SUBJECT_LIMIT, KernelFootprint, SchemaProfile,
            calculate_compliance_tier,
        },
    },
};

/// Layout decision for one profile.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelPlan {
    /// Leaf layout, used by every shard when `shards > 1`.
    pub layout: LayoutFamily,
    pub shards: u32,
    /// Worst tier over all shards.
    pub tier: ComplianceTier,
    /// Footprint of the whole kernel, or of the largest shard.
    pub footprint: KernelFootprint,
    /// Independent tier of every shard, empty when unsharded.
    pub shard_tiers: Vec<ComplianceTier>,
    pub profile: SchemaProfile,
    /// Batches run in eight-lane groups when set.
    pub vectorized: bool,
}

impl KernelPlan {
    pub fn is_sharded(&self) -> bool {
        self.shards > 1
    }

    pub fn kernel_name(&self) -> String {
        if self.is_sharded() {
            format!("sharded-{}x-{}", self.shards, self.layout.name())
        } else {
            self.layout.name().to_string()
        }
    }
}

/// What a schema needs to shed to fit the target tier.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizationReport {
    pub target: ComplianceTier,
    pub required_kb: f64,
    pub cap_kb: f64,
    pub largest_slab: &'static str,
    pub largest_slab_kb: f64,
    pub reduction_kb: f64,
    /// Largest shard count tried, `None` when sharding is disabled.
    pub max_shards_tried: Option<u32>,
}

impl OptimizationReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Optimization report for target {}", self.target);
        let _ = writeln!(
            out,
            "  footprint {:.2} KB, cap {:.2} KB, reduce by {:.2} KB",
            self.required_kb, self.cap_kb, self.reduction_kb
        );
        let _ = writeln!(
            out,
            "  largest slab: {} ({:.2} KB)",
            self.largest_slab, self.largest_slab_kb
        );
        match self.max_shards_tried {
            Some(n) => {
                let _ = writeln!(out, "  sharding up to {n} shards did not fit");
            }
            None => {
                let _ = writeln!(out, "  sharding disabled");
            }
        }
        out
    }
}

/// Kernel, its plan and its certificate.
#[derive(Debug)]
pub struct CompiledKernel {
    pub plan: KernelPlan,
    pub kernel: SpecializedKernel,
    pub certificate: ComplianceCertificate,
}

impl CompiledKernel {
    pub fn batch_lanes(&self) -> usize {
        if self.plan.vectorized { 8 } else { 1 }
    }

    /// Answers concrete patterns with the kernel, `batch_lanes` patterns per group.
    pub fn ask_batch(&self, patterns: &[TriplePattern], results: &mut [bool]) -> Result<(), TickError> {
        if self.plan.vectorized {
            ask_batch_with::<_, 8>(&self.kernel, patterns, results)
        } else {
            ask_batch_with::<_, 1>(&self.kernel, patterns, results)
        }
    }
}

/// Picks a layout family from the footprint model and builds the kernel.
/// * A profile that fits the target gets its own tier's canonical layout.
/// * Otherwise shard counts `num_shards, 2 * num_shards, .. max_shards` are tried,
///   every shard must classify at or under the target.
#[derive(Clone, Copy, Debug, Default)]
pub struct KernelSpecializer {
    config: CompilerConfig,
}

impl KernelSpecializer {
    pub fn new(config: CompilerConfig) -> Result<Self, TickError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Layout for a working set of `tier`.
    /// * Direct needs single-object cells, multi-object data moves it to bit-vectors.
    pub fn canonical_layout(&self, tier: ComplianceTier, has_multi_object: bool) -> LayoutFamily {
        let layout = match (tier, self.config.optimize_for) {
            (ComplianceTier::L1, OptimizeFor::Latency) => LayoutFamily::Direct,
            (ComplianceTier::L1, OptimizeFor::Throughput) => LayoutFamily::Compressed,
            (ComplianceTier::L2, _) => LayoutFamily::BitVector,
            _ => LayoutFamily::Compressed,
        };
        if layout == LayoutFamily::Direct && has_multi_object {
            tracing::debug!(tier = %tier, "multi-object cells present, using bit-vector layout");
            return LayoutFamily::BitVector;
        }
        layout
    }

    pub fn plan(&self, profile: &SchemaProfile, has_multi_object: bool) -> Result<KernelPlan, TickError> {
        let target = self.config.target_tier;
        let footprint = KernelFootprint::from_profile(profile);
        let tier = calculate_compliance_tier(&footprint);
        if tier <= target {
            return Ok(KernelPlan {
                layout: self.canonical_layout(tier, has_multi_object),
                shards: 1,
                tier,
                footprint,
                shard_tiers: vec![],
                profile: *profile,
                vectorized: self.config.enable_vectorization,
            });
        }

        if self.config.enable_sharding {
            let mut shards = self.config.num_shards.max(2);
            while shards <= self.config.max_shards {
                if let Some(plan) = self.try_shards(profile, shards, has_multi_object) {
                    return Ok(plan);
                }
                shards = shards.saturating_mul(2);
            }
        }

        let report = self.optimization_report(profile);
        tracing::warn!(
            target_tier = %target,
            required_kb = report.required_kb,
            largest_slab = report.largest_slab,
            "{}",
            report.render()
        );
        Err(TickError::TierBudgetExceeded {
            tier: target,
            required_kb: footprint.total_kb,
            cap_kb: target.cap_kb(),
            largest_slab: footprint.largest_slab(),
        })
    }

    fn try_shards(
        &self,
        profile: &SchemaProfile,
        shards: u32,
        has_multi_object: bool,
    ) -> Option<KernelPlan> {
        let target = self.config.target_tier;
        // shard 0 holds the most subjects
        let largest = profile.shard(shards as u64);
        let footprint = KernelFootprint::from_profile(&largest);
        let tier = calculate_compliance_tier(&footprint);
        tracing::debug!(
            shards,
            shard_subjects = largest.num_subjects,
            shard_kb = footprint.total_kb,
            tier = %tier,
            "trying shard count"
        );
        if tier > target {
            return None;
        }
        let shard_tiers: Vec<ComplianceTier> = (0..shards as u64)
            .map(|k| {
                let subjects = profile.num_subjects.saturating_sub(k).div_ceil(shards as u64);
                let shard = SchemaProfile {
                    num_subjects: subjects,
                    use_index: subjects < INDEX_SUBJECT_LIMIT,
                    ..largest
                };
                calculate_compliance_tier(&KernelFootprint::from_profile(&shard))
            })
            .collect();
        let worst = shard_tiers.iter().copied().max().unwrap_or(tier);
        Some(KernelPlan {
            layout: self.canonical_layout(worst, has_multi_object),
            shards,
            tier: worst,
            footprint,
            shard_tiers,
            profile: *profile,
            vectorized: self.config.enable_vectorization,
        })
    }

    pub fn optimization_report(&self, profile: &SchemaProfile) -> OptimizationReport {
        let target = self.config.target_tier;
        let footprint = KernelFootprint::from_profile(profile);
        let largest_slab = footprint.largest_slab();
        let largest_slab_kb = footprint
            .slabs()
            .into_iter()
            .find(|(name, _)| *name == largest_slab)
            .map_or(0.0, |(_, kb)| kb);
        OptimizationReport {
            target,
            required_kb: footprint.total_kb,
            cap_kb: target.cap_kb(),
            largest_slab,
            largest_slab_kb,
            reduction_kb: (footprint.total_kb - target.cap_kb()).max(0.0),
            max_shards_tried: self.config.enable_sharding.then_some(self.config.max_shards),
        }
    }

    /// Profile of the engine's current dimensions.
    pub fn profile_of(store: &TripleStore, shacl: &ShaclCore, owl: &OwlCore) -> SchemaProfile {
        let dims = store.dims();
        SchemaProfile::new(
            owl.num_classes() as u64,
            owl.num_properties() as u64,
            shacl.dims().shapes as u64,
            dims.subjects as u64,
            dims.predicates as u64,
            dims.objects as u64,
        )
    }

    /// Plans against the engine's dimensions and builds the kernel from its data.
    /// * Needs computed closures, the kernel freezes the subclass closure.
    pub fn compile(
        &self,
        store: &TripleStore,
        shacl: &ShaclCore,
        owl: &OwlCore,
    ) -> Result<CompiledKernel, TickError> {
        let profile = Self::profile_of(store, shacl, owl);
        let plan = self.plan(&profile, store.has_multi_object_cells())?;
        let schema = Arc::new(KernelSchema::new(shacl, owl)?);
        let triples: Vec<Triple> = store.iter_triples().collect();

        let kernel = if plan.is_sharded() {
            SpecializedKernel::Sharded(ShardedKernel::build(
                plan.layout,
                store.dims(),
                &triples,
                schema,
                plan.shards,
            )?)
        } else {
            SpecializedKernel::Leaf(LeafKernel::build(plan.layout, store.dims(), &triples, schema)?)
        };

        let certificate = ComplianceCertificate::new(plan.kernel_name(), plan.footprint, plan.tier);
        tracing::info!(
            kernel = %plan.kernel_name(),
            tier = %plan.tier,
            footprint_kb = plan.footprint.total_kb,
            shards = plan.shards,
            triples = triples.len(),
            "compiled kernel"
        );
        Ok(CompiledKernel {
            plan,
            kernel,
            certificate,
        })
    }
}
