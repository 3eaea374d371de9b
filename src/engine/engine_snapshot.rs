use std::{collections::HashSet, fs, path::Path};

use bincode::{Decode, Encode, config};

use crate::{
    engine::{engine_config::EngineConfig, knowledge_engine::KnowledgeEngine},
    errors::TickError,
    ids::{IdSpace, Interner, PropertyId, Triple},
    owl::{
        owl_axiom::OwlAxiom,
        owl_core::{OwlCore, PropertyStrategy},
    },
    shacl::shacl_core::{ShaclCore, ShaclParts},
    store::{
        pso::PsoMap,
        triple_store::{StoreDims, TripleStore},
    },
    utils::aligned_slab::BitSlab,
};

const SNAPSHOT_VERSION: u32 = 2;

/// Encoded engine state.
/// * Id tables, PV/OV rows, PS->O cells, SHACL shapes and node indices, OWL axioms,
///   and which stored triples came from materialization.
/// * Closures are not stored, they are recomputed on load.
/// * Hook subscriptions are not part of a snapshot.
#[derive(Encode, Decode)]
pub struct EngineSnapshot {
    version: u32,
    config: EngineConfig,
    node_names: Vec<String>,
    predicate_names: Vec<String>,
    shape_names: Vec<String>,
    pv: Vec<u64>,
    ov: Vec<u64>,
    pso: PsoMap,
    triple_count: u64,
    shacl: ShaclParts,
    axioms: Vec<OwlAxiom>,
    strategies: Vec<(PropertyId, PropertyStrategy)>,
    derived: Vec<Triple>,
}

fn names(interner: &Interner) -> Vec<String> {
    interner.names().map(str::to_owned).collect()
}

impl EngineSnapshot {
    pub fn triple_count(&self) -> u64 {
        self.triple_count
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TickError> {
        Ok(bincode::encode_to_vec(self, config::standard())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TickError> {
        let snapshot: Self = bincode::decode_from_slice(bytes, config::standard())?.0;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TickError::InvalidConfig(format!(
                "snapshot version {} is not supported (expected {SNAPSHOT_VERSION})",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }
}

impl KnowledgeEngine {
    pub fn snapshot(&self) -> EngineSnapshot {
        let store = self.store();
        let ids = self.ids();
        EngineSnapshot {
            version: SNAPSHOT_VERSION,
            config: *self.config(),
            node_names: names(&ids.nodes),
            predicate_names: names(&ids.predicates),
            shape_names: names(&ids.shapes),
            pv: store.pv().to_row_words(),
            ov: store.ov().to_row_words(),
            pso: store.pso().clone(),
            triple_count: store.triple_count() as u64,
            shacl: self.shacl().to_parts(),
            axioms: self.owl().axioms().to_vec(),
            strategies: self.owl().strategy_overrides(),
            derived: {
                let mut derived: Vec<Triple> = self.derived_triples().iter().copied().collect();
                derived.sort_unstable();
                derived
            },
        }
    }

    /// Rebuilds an engine and recomputes its closures.
    pub fn from_snapshot(snapshot: EngineSnapshot) -> Result<Self, TickError> {
        let config = snapshot.config;
        config.validate()?;
        let dims = StoreDims {
            subjects: config.max_subjects,
            predicates: config.max_predicates,
            objects: config.max_objects,
        };
        let bad = |what: &str| TickError::InvalidConfig(format!("snapshot {what} does not match its dimensions"));

        let pv = BitSlab::from_row_words(dims.predicates as usize, dims.subjects as usize, &snapshot.pv)
            .ok_or_else(|| bad("predicate slab"))?;
        let ov = BitSlab::from_row_words(dims.objects as usize, dims.subjects as usize, &snapshot.ov)
            .ok_or_else(|| bad("object slab"))?;
        if snapshot.pso.layout() != config.layout
            || snapshot.pso.cell_count() != dims.predicates as usize * dims.subjects as usize
        {
            return Err(bad("PS->O layout"));
        }
        let store = TripleStore::from_parts(dims, pv, ov, snapshot.pso, snapshot.triple_count as usize);

        if snapshot.shacl.dims.nodes != config.max_nodes
            || snapshot.shacl.dims.shapes != config.max_shapes
        {
            return Err(bad("SHACL index"));
        }
        let shacl = ShaclCore::from_parts(snapshot.shacl)?;

        let mut owl = OwlCore::from_axioms(config.max_classes, config.max_properties, &snapshot.axioms)?;
        for (prop, strategy) in snapshot.strategies {
            owl.set_strategy(prop, strategy)?;
        }
        owl.compute_closures();

        if snapshot.derived.iter().any(|t| !store.ask(t.s, t.p, t.o)) {
            return Err(bad("derived triple list"));
        }
        let derived: HashSet<Triple> = snapshot.derived.into_iter().collect();

        let ids = IdSpace {
            nodes: Interner::from_names(snapshot.node_names),
            predicates: Interner::from_names(snapshot.predicate_names),
            shapes: Interner::from_names(snapshot.shape_names),
        };
        tracing::info!(
            triples = store.triple_count(),
            axioms = owl.axioms().len(),
            "loaded engine snapshot"
        );
        Ok(KnowledgeEngine::from_parts(config, ids, store, shacl, owl, derived))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), TickError> {
        fs::write(path, self.snapshot().to_bytes()?)?;
        Ok(())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, TickError> {
        let bytes = fs::read(path)?;
        Self::from_snapshot(EngineSnapshot::from_bytes(&bytes)?)
    }
}
