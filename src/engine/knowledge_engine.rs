use std::collections::HashSet;

use crate::{
    batch::batch_evaluator::BatchEvaluator,
    engine::engine_config::EngineConfig,
    errors::TickError,
    hooks::triple_hooks::{HookHandle, TripleHooks},
    ids::{IdSpace, NodeId, ObjectId, PredicateId, ShapeId, SubjectId, Triple},
    owl::{
        owl_consistency::{ConsistencyChecker, ConsistencyReport},
        owl_core::{ClosureStats, OwlCore},
        owl_reasoner::{MaterializationReport, Materializer, OwlReasoner},
    },
    shacl::{
        shacl_core::{ShaclCore, ShaclDims, ShapeUpdate},
        shacl_shape::CompiledShape,
    },
    sparql::{
        sparql_core::SparqlCore,
        sparql_pattern::{JoinPattern, TriplePattern},
        sparql_planner::JoinPlanner,
    },
    store::triple_store::TripleStore,
    tier::{
        compiler_config::CompilerConfig,
        kernel_specializer::{CompiledKernel, KernelSpecializer},
    },
    utils::bit_vector::{BitRow, BitVec},
};

/// The store and its three sub-engines behind one writer.
/// * `add_triple` keeps the SHACL node index in step: `rdf:type` triples set node classes,
///   other triples set node properties. Ids outside the SHACL dimensions are not indexed.
/// * Closures are recomputed on the next reasoning call after any OWL change.
/// * Borrowed rows hold `&self`, so they end before the next write.
/// * Triples written by `materialize` are remembered, the next run starts from asserted data.
pub struct KnowledgeEngine {
    config: EngineConfig,
    ids: IdSpace,
    store: TripleStore,
    shacl: ShaclCore,
    owl: OwlCore,
    hooks: TripleHooks,
    derived: HashSet<Triple>,
}

impl KnowledgeEngine {
    pub fn new(config: EngineConfig) -> Result<Self, TickError> {
        config.validate()?;
        Ok(Self {
            store: TripleStore::new(
                config.max_subjects,
                config.max_predicates,
                config.max_objects,
                config.layout,
            ),
            shacl: ShaclCore::new(ShaclDims {
                nodes: config.max_nodes,
                classes: config.max_classes,
                properties: config.max_properties,
                shapes: config.max_shapes,
            }),
            owl: OwlCore::new(config.max_classes, config.max_properties),
            ids: IdSpace::new(),
            hooks: TripleHooks::new(),
            derived: HashSet::new(),
            config,
        })
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        ids: IdSpace,
        store: TripleStore,
        shacl: ShaclCore,
        owl: OwlCore,
        derived: HashSet<Triple>,
    ) -> Self {
        Self {
            config,
            ids,
            store,
            shacl,
            owl,
            hooks: TripleHooks::new(),
            derived,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ids(&self) -> &IdSpace {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdSpace {
        &mut self.ids
    }

    pub fn store(&self) -> &TripleStore {
        &self.store
    }

    pub fn shacl(&self) -> &ShaclCore {
        &self.shacl
    }

    /// Direct access for node datatype, value and literal indices.
    pub fn shacl_mut(&mut self) -> &mut ShaclCore {
        &mut self.shacl
    }

    pub fn owl(&self) -> &OwlCore {
        &self.owl
    }

    /// Axioms added here invalidate the closures until the next reasoning call.
    pub fn owl_mut(&mut self) -> &mut OwlCore {
        &mut self.owl
    }

    pub fn sparql(&self) -> SparqlCore<'_> {
        SparqlCore::new(&self.store)
    }

    // ---------- writes ----------

    /// Asserts `(s, p, o)`. `Ok(false)` when it was already present.
    pub fn add_triple(
        &mut self,
        s: SubjectId,
        p: PredicateId,
        o: ObjectId,
    ) -> Result<bool, TickError> {
        let t = Triple::new(s, p, o);
        if !self.store.add_triple(s, p, o)? {
            // asserting an inferred triple keeps it across materializations
            self.derived.remove(&t);
            return Ok(false);
        }
        self.index_for_shacl(t)?;
        self.hooks.notify(t);
        Ok(true)
    }

    /// Interns the three names, then asserts the triple.
    pub fn add_named_triple(&mut self, s: &str, p: &str, o: &str) -> Result<Triple, TickError> {
        let t = Triple::new(
            self.ids.nodes.intern(s),
            self.ids.predicates.intern(p),
            self.ids.nodes.intern(o),
        );
        self.add_triple(t.s, t.p, t.o)?;
        Ok(t)
    }

    fn index_for_shacl(&mut self, t: Triple) -> Result<(), TickError> {
        let dims = self.shacl.dims();
        if t.s >= dims.nodes {
            return Ok(());
        }
        if t.p == self.config.rdf_type {
            if t.o < dims.classes {
                self.shacl.set_node_class(t.s, t.o)?;
            }
        } else if t.p < dims.properties {
            self.shacl.set_node_property(t.s, t.p)?;
        }
        Ok(())
    }

    pub fn add_shape(
        &mut self,
        shape_id: ShapeId,
        shape: CompiledShape,
    ) -> Result<ShapeUpdate, TickError> {
        self.shacl.add_shape(shape_id, shape)
    }

    // ---------- SPARQL ----------

    #[inline]
    pub fn ask(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        self.store.ask(s, p, o)
    }

    pub fn try_ask(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> Result<bool, TickError> {
        self.store.try_ask(s, p, o)
    }

    pub fn ask_pattern(&self, pattern: TriplePattern) -> bool {
        self.sparql().ask_pattern(pattern)
    }

    pub fn ask_batch(
        &self,
        patterns: &[TriplePattern],
        results: &mut [bool],
    ) -> Result<(), TickError> {
        self.batch().ask_batch(patterns, results)
    }

    pub fn batch(&self) -> BatchEvaluator<'_> {
        BatchEvaluator::new(&self.store).with_vectorization(self.config.vectorize)
    }

    pub fn subject_vector(&self, p: PredicateId, o: ObjectId) -> Result<BitVec, TickError> {
        self.store.subject_vector(p, o)
    }

    pub fn object_vector(&self, s: SubjectId, p: PredicateId) -> Result<BitVec, TickError> {
        self.store.object_vector(s, p)
    }

    /// Planned join, subjects ascending.
    pub fn join_patterns(
        &self,
        patterns: &[JoinPattern],
        limit: usize,
    ) -> Result<Vec<SubjectId>, TickError> {
        JoinPlanner::new(self.sparql()).join_patterns(patterns, limit)
    }

    // ---------- SHACL ----------

    #[inline]
    pub fn validate_node(&self, node: NodeId, shape: ShapeId) -> bool {
        self.shacl.validate_node(node, shape)
    }

    pub fn validate_batch(
        &self,
        nodes: &[NodeId],
        shapes: &[ShapeId],
        results: &mut [bool],
    ) -> Result<(), TickError> {
        self.shacl.validate_batch(nodes, shapes, results)
    }

    // ---------- OWL ----------

    pub fn compute_closures(&mut self) -> ClosureStats {
        self.owl.compute_closures()
    }

    fn ensure_closures(&mut self) {
        if !self.owl.closures_computed() {
            self.owl.compute_closures();
        }
    }

    /// Asserted or entailed. Computes stale closures first.
    pub fn ask_with_reasoning(
        &mut self,
        s: SubjectId,
        p: PredicateId,
        o: ObjectId,
    ) -> Result<bool, TickError> {
        self.ensure_closures();
        self.reasoner().ask_with_reasoning(s, p, o)
    }

    /// Read-only reasoner, fails with `ClosureNotComputed` on stale closures.
    pub fn reasoner(&self) -> OwlReasoner<'_> {
        OwlReasoner::new(
            &self.store,
            &self.owl,
            self.config.rdf_type,
            self.config.reasoning,
        )
    }

    /// Forward-chains OWL consequences into the store.
    /// * Each run starts from the asserted triples, earlier inferences are derived again.
    /// * The report lists only triples new to the store, they reach the SHACL index and
    ///   the hooks like asserted ones.
    pub fn materialize(&mut self) -> Result<MaterializationReport, TickError> {
        self.ensure_closures();
        let mut work = self.asserted_store()?;
        let mut report = Materializer::new(&self.owl, self.config.rdf_type, self.config.reasoning)
            .materialize_inferences(&mut work)?;
        let derived: HashSet<Triple> = report.added.iter().copied().collect();
        report.added.retain(|t| !self.store.ask(t.s, t.p, t.o));
        report.touched_subjects = report.added.iter().map(|t| t.s).collect();

        self.store = work;
        self.derived = derived;
        for t in &report.added {
            self.index_for_shacl(*t)?;
        }
        self.hooks.notify_all(&report.added);
        Ok(report)
    }

    /// The store without the triples earlier materializations wrote.
    fn asserted_store(&self) -> Result<TripleStore, TickError> {
        if self.derived.is_empty() {
            return Ok(self.store.clone());
        }
        let dims = self.store.dims();
        let mut store = TripleStore::new(dims.subjects, dims.predicates, dims.objects, self.store.layout());
        for t in self.store.iter_triples().filter(|t| !self.derived.contains(t)) {
            store.add_triple(t.s, t.p, t.o)?;
        }
        Ok(store)
    }

    pub(crate) fn derived_triples(&self) -> &HashSet<Triple> {
        &self.derived
    }

    pub fn check_consistency(&mut self) -> Result<ConsistencyReport, TickError> {
        self.ensure_closures();
        ConsistencyChecker::new(&self.store, &self.owl, self.config.rdf_type).check_consistency()
    }

    // ---------- kernels ----------

    /// Specializes an access kernel for the current data.
    pub fn compile_kernel(&mut self, config: CompilerConfig) -> Result<CompiledKernel, TickError> {
        self.ensure_closures();
        KernelSpecializer::new(config)?.compile(&self.store, &self.shacl, &self.owl)
    }

    // ---------- hooks ----------

    pub fn subscribe_triple_added<F>(&mut self, callback: F) -> HookHandle
    where
        F: Fn(Triple) + Send + Sync + 'static,
    {
        self.hooks.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, handle: HookHandle) -> bool {
        self.hooks.unsubscribe(handle)
    }

    pub fn borrow_predicate_vector(&self, p: PredicateId) -> Result<BitRow<'_>, TickError> {
        self.store.predicate_row(p)
    }

    pub fn borrow_object_vector(&self, o: ObjectId) -> Result<BitRow<'_>, TickError> {
        self.store.object_row(o)
    }
}
