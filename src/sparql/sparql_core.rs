use crate::{
    errors::TickError,
    ids::{IdKind, ObjectId, PredicateId, SubjectId, WILDCARD, check_id},
    sparql::sparql_pattern::{JoinPattern, MAX_JOIN_PATTERNS, Term, TriplePattern},
    store::triple_store::TripleStore,
    utils::bit_vector::BitVec,
};

/// Read-only SPARQL view over the triple store.
#[derive(Clone, Copy)]
pub struct SparqlCore<'a> {
    store: &'a TripleStore,
}

impl<'a> SparqlCore<'a> {
    pub fn new(store: &'a TripleStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a TripleStore {
        self.store
    }

    /// Existence test. Concrete patterns go straight to the store's `ask`.
    /// * Wildcard positions match anything.
    /// * Out of range ids answer false.
    pub fn ask_pattern(&self, pattern: TriplePattern) -> bool {
        let TriplePattern { s, p, o } = pattern;
        let st = self.store;
        let dims = st.dims();
        if s >= dims.subjects || p >= dims.predicates || o >= dims.objects {
            return false;
        }
        match (s != WILDCARD, p != WILDCARD, o != WILDCARD) {
            (true, true, true) => st.ask(s, p, o),
            (true, true, false) => st.has_predicate(s, p),
            (false, true, true) => st
                .subject_vector(p, o)
                .map(|v| v.iter_ones().any(|s| st.pso_contains(p, s, o)))
                .unwrap_or(false),
            (true, false, true) => {
                st.ov().test(o as usize, s as usize)
                    && (0..dims.predicates).any(|p| st.ask(s, p, o))
            }
            (false, true, false) => !st.pv().row(p as usize).is_empty(),
            (true, false, false) => (0..dims.predicates).any(|p| st.has_predicate(s, p)),
            (false, false, true) => !st.ov().row(o as usize).is_empty(),
            (false, false, false) => !st.is_empty(),
        }
    }

    pub fn try_ask_pattern(&self, pattern: TriplePattern) -> Result<bool, TickError> {
        let dims = self.store.dims();
        check_id(IdKind::Subject, pattern.s, dims.subjects)?;
        check_id(IdKind::Predicate, pattern.p, dims.predicates)?;
        check_id(IdKind::Object, pattern.o, dims.objects)?;
        Ok(self.ask_pattern(pattern))
    }

    pub fn subject_vector(&self, p: PredicateId, o: ObjectId) -> Result<BitVec, TickError> {
        self.store.subject_vector(p, o)
    }

    pub fn object_vector(&self, s: SubjectId, p: PredicateId) -> Result<BitVec, TickError> {
        self.store.object_vector(s, p)
    }

    pub fn intersect(a: &BitVec, b: &BitVec) -> BitVec {
        a.intersect(b)
    }

    pub fn union(a: &BitVec, b: &BitVec) -> BitVec {
        a.union(b)
    }

    pub fn difference(a: &BitVec, b: &BitVec) -> BitVec {
        a.difference(b)
    }

    /// Subjects with `(s, p, o)` asserted, ascending.
    pub fn materialize_subjects(
        &self,
        p: PredicateId,
        o: ObjectId,
    ) -> Result<Vec<SubjectId>, TickError> {
        Ok(self.store.matching_subjects(p, o)?.to_ids(usize::MAX))
    }

    fn check_join_pattern(&self, pattern: &JoinPattern) -> Result<(), TickError> {
        if pattern.var_count() > 2 {
            return Err(TickError::InvalidPattern(
                "join pattern binds all three positions to variables".into(),
            ));
        }
        let dims = self.store.dims();
        if let Term::Bound(s) = pattern.s {
            check_id(IdKind::Subject, s, dims.subjects)?;
        }
        if let Term::Bound(p) = pattern.p {
            check_id(IdKind::Predicate, p, dims.predicates)?;
        }
        if let Term::Bound(o) = pattern.o {
            check_id(IdKind::Object, o, dims.objects)?;
        }
        Ok(())
    }

    /// Candidate subjects of one pattern. The pattern must already be checked.
    pub(crate) fn pattern_subjects(&self, pattern: &JoinPattern) -> BitVec {
        let st = self.store;
        let subjects = st.dims().subjects as usize;
        match (pattern.s, pattern.p, pattern.o) {
            (Term::Bound(s), p, o) => {
                let hit = match (p, o) {
                    (Term::Bound(p), Term::Bound(o)) => st.ask(s, p, o),
                    (Term::Bound(p), Term::Var) => st.has_predicate(s, p),
                    (Term::Var, Term::Bound(o)) => st
                        .predicate_vector(s, o)
                        .map(|v| !v.is_empty())
                        .unwrap_or(false),
                    (Term::Var, Term::Var) => {
                        (0..st.dims().predicates).any(|p| st.has_predicate(s, p))
                    }
                };
                if hit {
                    BitVec::from_ids(subjects, [s])
                } else {
                    BitVec::new(subjects)
                }
            }
            (Term::Var, Term::Bound(p), Term::Bound(o)) => st
                .matching_subjects(p, o)
                .unwrap_or_else(|_| BitVec::new(subjects)),
            (Term::Var, Term::Bound(p), Term::Var) => st.pv().row(p as usize).to_bit_vec(),
            (Term::Var, Term::Var, Term::Bound(o)) => st.ov().row(o as usize).to_bit_vec(),
            (Term::Var, Term::Var, Term::Var) => BitVec::new(subjects),
        }
    }

    pub(crate) fn check_join(&self, patterns: &[JoinPattern]) -> Result<(), TickError> {
        if patterns.len() > MAX_JOIN_PATTERNS {
            return Err(TickError::InvalidPattern(format!(
                "{} join patterns, at most {MAX_JOIN_PATTERNS} supported",
                patterns.len()
            )));
        }
        patterns.iter().try_for_each(|p| self.check_join_pattern(p))
    }

    /// Folds the patterns left to right, intersecting subject sets.
    /// * Stops early once the candidate set is empty.
    /// * An empty pattern list yields an empty set.
    pub fn join_vector(&self, patterns: &[JoinPattern]) -> Result<BitVec, TickError> {
        self.check_join(patterns)?;
        let Some((first, rest)) = patterns.split_first() else {
            return Ok(BitVec::new(self.store.dims().subjects as usize));
        };
        let mut candidates = self.pattern_subjects(first);
        for pattern in rest {
            if candidates.is_empty() {
                break;
            }
            let next = self.pattern_subjects(pattern);
            candidates.and_assign_words(next.words());
        }
        Ok(candidates)
    }

    /// Up to `limit` subjects matching every pattern, ascending.
    pub fn join_patterns(
        &self,
        patterns: &[JoinPattern],
        limit: usize,
    ) -> Result<Vec<SubjectId>, TickError> {
        Ok(self.join_vector(patterns)?.to_ids(limit))
    }

    /// `join_patterns` that maps every error to an empty result.
    pub fn join_patterns_or_empty(&self, patterns: &[JoinPattern], limit: usize) -> Vec<SubjectId> {
        self.join_patterns(patterns, limit).unwrap_or_default()
    }
}
