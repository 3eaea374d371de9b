use bincode::{Decode, Encode};
use roaring::RoaringBitmap;

use crate::{
    errors::TickError,
    ids::{ClassId, ObjectId, PredicateId, SubjectId, Triple},
    owl::{
        owl_axiom::{Characteristic, axiom_flags},
        owl_core::{OwlCore, PropertyStrategy},
    },
    store::triple_store::TripleStore,
    utils::bit_vector::BitVec,
};

/// Bounds for query-time traversal and materialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ReasoningConfig {
    /// Longest transitive path, in edges, for both query-time traversal and materialization.
    pub transitive_depth: u32,
    /// Rounds `materialize_inferences` runs before giving up on a fixpoint.
    pub max_iterations: u32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            transitive_depth: 5,
            max_iterations: 16,
        }
    }
}

/// Reasoning-aware reads over a store and a closed `OwlCore`.
/// * Facts reached through sub-properties, symmetry and inverses count as direct.
/// * Query-time transitive properties are followed breadth first up to `transitive_depth` edges.
/// * Materialized transitive properties answer from the store, paths appear after materialization.
pub struct OwlReasoner<'a> {
    store: &'a TripleStore,
    owl: &'a OwlCore,
    rdf_type: PredicateId,
    config: ReasoningConfig,
}

impl<'a> OwlReasoner<'a> {
    pub fn new(
        store: &'a TripleStore,
        owl: &'a OwlCore,
        rdf_type: PredicateId,
        config: ReasoningConfig,
    ) -> Self {
        Self {
            store,
            owl,
            rdf_type,
            config,
        }
    }

    pub fn ask_with_reasoning(
        &self,
        s: SubjectId,
        p: PredicateId,
        o: ObjectId,
    ) -> Result<bool, TickError> {
        self.owl.require_closures()?;
        self.store.check_triple(s, p, o)?;

        // 1. asserted
        if self.store.ask(s, p, o) {
            return Ok(true);
        }
        // 2. typed through the subclass closure
        if p == self.rdf_type && self.has_type(s, o) {
            return Ok(true);
        }
        // 3. sub-property, symmetric, inverse
        if self.holds_direct(s, p, o) {
            return Ok(true);
        }
        // 4. transitive path, materialized properties answer from the store alone
        if self.owl.is_transitive(p)
            && self.owl.strategy(p) == PropertyStrategy::QueryTime
            && self.reachable(s, p, o)
        {
            return Ok(true);
        }
        Ok(self.owl.has_characteristic(p, Characteristic::Reflexive) && s == o)
    }

    /// Does `s` carry a type that is a subclass of `class`.
    pub fn has_type(&self, s: SubjectId, class: ClassId) -> bool {
        class < self.owl.num_classes()
            && self
                .store
                .objects(s, self.rdf_type)
                .iter()
                .any(|t| self.owl.check_subclass(*t, class))
    }

    /// `p` and every declared sub-property of `p` the store can hold.
    fn props_under(&self, p: PredicateId) -> impl Iterator<Item = PredicateId> + '_ {
        let predicates = self.store.dims().predicates;
        let closure = self.owl.subproperty_closure();
        let subs = (p < self.owl.num_properties())
            .then(|| {
                (0..closure.rows().min(predicates as usize))
                    .filter(move |q| *q != p as usize && closure.test(*q, p as usize))
                    .map(|q| q as PredicateId)
            })
            .into_iter()
            .flatten();
        std::iter::once(p).chain(subs)
    }

    fn holds_direct(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        let st = self.store;
        let symmetric = self.owl.is_symmetric(p);
        self.props_under(p).any(|q| {
            st.ask(s, q, o)
                || ((symmetric || self.owl.is_symmetric(q)) && st.ask(o, q, s))
                || self
                    .owl
                    .inverses(q)
                    .iter()
                    .any(|r| self.props_under(*r).any(|r2| st.ask(o, r2, s)))
        })
    }

    /// Nodes one `p` edge away from `x` under `holds_direct`.
    fn successors(&self, x: u32, p: PredicateId, out: &mut Vec<u32>) {
        let st = self.store;
        let symmetric = self.owl.is_symmetric(p);
        for q in self.props_under(p) {
            out.extend_from_slice(st.objects(x, q));
            if symmetric || self.owl.is_symmetric(q) {
                out.extend(subjects_pointing_at(st, q, x));
            }
            for r in self.owl.inverses(q) {
                for r2 in self.props_under(*r) {
                    out.extend(subjects_pointing_at(st, r2, x));
                }
            }
        }
    }

    fn reachable(&self, s: SubjectId, p: PredicateId, o: ObjectId) -> bool {
        self.walk(s, p, |y| y == o)
    }

    /// Iterative frontier expansion over `p` from `s`, at most `transitive_depth` edges.
    /// * `visit` sees every reached node once, `s` included when a cycle leads back to it.
    /// * Returns true as soon as `visit` does.
    pub(crate) fn walk(
        &self,
        s: SubjectId,
        p: PredicateId,
        mut visit: impl FnMut(u32) -> bool,
    ) -> bool {
        let dims = self.store.dims();
        let mut visited = BitVec::new(dims.subjects.max(dims.objects) as usize);
        let mut frontier = vec![s];
        let mut next = vec![];
        let mut step = vec![];
        for _ in 0..self.config.transitive_depth {
            for x in frontier.drain(..) {
                step.clear();
                self.successors(x, p, &mut step);
                for y in step.iter().copied() {
                    if visited.insert(y) {
                        if visit(y) {
                            return true;
                        }
                        next.push(y);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            std::mem::swap(&mut frontier, &mut next);
        }
        false
    }
}

fn subjects_pointing_at(st: &TripleStore, p: PredicateId, o: ObjectId) -> Vec<u32> {
    st.matching_subjects(p, o)
        .map(|v| v.iter_ones().collect())
        .unwrap_or_default()
}

/// Outcome of `materialize_inferences`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterializationReport {
    pub rounds: u32,
    /// New triples in the order they were asserted.
    pub added: Vec<Triple>,
    /// Subjects that gained at least one triple.
    pub touched_subjects: RoaringBitmap,
    /// False when `max_iterations` ran out before a round added nothing.
    pub converged: bool,
}

/// Forward-chains OWL consequences into a store.
/// * Domain, range, subclass typing, sub-property, symmetric, inverse, has-value,
///   some-values-from and all-values-from always materialize.
/// * Transitive paths of at most `transitive_depth` edges materialize only for
///   `PropertyStrategy::Materialized` properties, after the other rules reach a fixpoint.
/// * Reflexive properties stay query-time.
pub struct Materializer<'a> {
    owl: &'a OwlCore,
    rdf_type: PredicateId,
    config: ReasoningConfig,
}

impl<'a> Materializer<'a> {
    pub fn new(owl: &'a OwlCore, rdf_type: PredicateId, config: ReasoningConfig) -> Self {
        Self {
            owl,
            rdf_type,
            config,
        }
    }

    /// Runs rounds until one adds nothing or `max_iterations` is reached.
    /// * Works on a copy of the store that replaces it only on success.
    pub fn materialize_inferences(
        &self,
        store: &mut TripleStore,
    ) -> Result<MaterializationReport, TickError> {
        self.owl.require_closures()?;
        let mut work = store.clone();
        let mut report = MaterializationReport::default();
        let mut staged = vec![];

        while report.rounds < self.config.max_iterations {
            report.rounds += 1;
            staged.clear();
            self.stage_round(&work, &mut staged);
            staged.sort_unstable();
            staged.dedup();
            let mut added = 0;
            for t in staged.iter() {
                if work.add_triple(t.s, t.p, t.o)? {
                    report.added.push(*t);
                    report.touched_subjects.insert(t.s);
                    added += 1;
                }
            }
            if added == 0 {
                report.converged = true;
                break;
            }
        }

        staged.clear();
        self.stage_transitive(&work, &mut staged);
        for t in staged.iter() {
            if work.add_triple(t.s, t.p, t.o)? {
                report.added.push(*t);
                report.touched_subjects.insert(t.s);
            }
        }

        *store = work;
        tracing::info!(
            rounds = report.rounds,
            added = report.added.len(),
            touched = report.touched_subjects.len(),
            converged = report.converged,
            "materialized OWL inferences"
        );
        Ok(report)
    }

    /// Paths of at most `transitive_depth` edges for every materialized transitive property.
    /// * Walks the same successors as query-time traversal, so both strategies answer alike.
    /// * Runs once after the rule fixpoint, its output is not composed again.
    fn stage_transitive(&self, st: &TripleStore, staged: &mut Vec<Triple>) {
        let owl = self.owl;
        let dims = st.dims();
        let reasoner = OwlReasoner::new(st, owl, self.rdf_type, self.config);
        for q in 0..dims.predicates.min(owl.num_properties()) {
            if !owl.is_transitive(q) || owl.strategy(q) != PropertyStrategy::Materialized {
                continue;
            }
            for s in 0..dims.subjects {
                reasoner.walk(s, q, |y| {
                    if y < dims.objects && !st.ask(s, q, y) {
                        staged.push(Triple::new(s, q, y));
                    }
                    false
                });
            }
        }
    }

    fn stage_round(&self, st: &TripleStore, staged: &mut Vec<Triple>) {
        let owl = self.owl;
        let rdf = self.rdf_type;
        let dims = st.dims();
        let props = dims.predicates.min(owl.num_properties());
        let mut stage = |s: u32, p: u32, o: u32| {
            if s < dims.subjects && p < dims.predicates && o < dims.objects && !st.ask(s, p, o) {
                staged.push(Triple::new(s, p, o));
            }
        };

        for a in owl.axioms_of(axiom_flags::DOMAIN) {
            for t in st.iter_predicate(a.subject) {
                stage(t.s, rdf, a.object);
            }
        }
        for a in owl.axioms_of(axiom_flags::RANGE) {
            for t in st.iter_predicate(a.subject) {
                stage(t.o, rdf, a.object);
            }
        }

        let subclass = owl.subclass_closure();
        for t in st.iter_predicate(rdf) {
            if t.o < owl.num_classes() {
                for sup in subclass.row(t.o as usize).iter_ones() {
                    if sup != t.o {
                        stage(t.s, rdf, sup);
                    }
                }
            }
        }

        let subproperty = owl.subproperty_closure();
        for q in 0..props {
            for sup in subproperty.row(q as usize).iter_ones() {
                if sup != q {
                    for t in st.iter_predicate(q) {
                        stage(t.s, sup, t.o);
                    }
                }
            }
            if owl.is_symmetric(q) {
                for t in st.iter_predicate(q) {
                    stage(t.o, q, t.s);
                }
            }
            for r in owl.inverses(q) {
                for t in st.iter_predicate(q) {
                    stage(t.o, *r, t.s);
                }
            }
        }

        for a in owl.axioms_of(axiom_flags::HAS_VALUE) {
            for x in typed(st, rdf, a.subject) {
                stage(x, a.predicate, a.object);
            }
            for x in subjects_pointing_at(st, a.predicate, a.object) {
                stage(x, rdf, a.subject);
            }
        }
        for a in owl.axioms_of(axiom_flags::SOME_VALUES_FROM) {
            for t in st.iter_predicate(a.predicate) {
                if st.ask(t.o, rdf, a.object) {
                    stage(t.s, rdf, a.subject);
                }
            }
        }
        for a in owl.axioms_of(axiom_flags::ALL_VALUES_FROM) {
            for x in typed(st, rdf, a.subject) {
                for y in st.objects(x, a.predicate) {
                    stage(*y, rdf, a.object);
                }
            }
        }
    }
}

/// Subjects with an asserted `rdf:type` of exactly `class`.
fn typed(st: &TripleStore, rdf_type: PredicateId, class: ClassId) -> Vec<u32> {
    subjects_pointing_at(st, rdf_type, class)
}
