use crate::{
    errors::TickError,
    ids::SubjectId,
    sparql::{
        sparql_core::SparqlCore,
        sparql_pattern::{JoinPattern, Term},
    },
};

/// Reorders join patterns by estimated selectivity, most selective first.
/// * Wraps `SparqlCore::join_patterns`, the result set is unchanged.
pub struct JoinPlanner<'a> {
    core: SparqlCore<'a>,
}

impl<'a> JoinPlanner<'a> {
    pub fn new(core: SparqlCore<'a>) -> Self {
        Self { core }
    }

    /// Upper bound on the subjects one pattern can produce.
    /// * Uses row popcounts only, no PS->O probes.
    pub fn estimate(&self, pattern: &JoinPattern) -> usize {
        let st = self.core.store();
        let pv = |p: u32| st.pv().row(p as usize).cardinality();
        let ov = |o: u32| st.ov().row(o as usize).cardinality();
        match (pattern.s, pattern.p, pattern.o) {
            (Term::Bound(_), _, _) => 1,
            (Term::Var, Term::Bound(p), Term::Bound(o)) => pv(p).min(ov(o)),
            (Term::Var, Term::Bound(p), Term::Var) => pv(p),
            (Term::Var, Term::Var, Term::Bound(o)) => ov(o),
            (Term::Var, Term::Var, Term::Var) => st.dims().subjects as usize,
        }
    }

    /// Pattern indices in evaluation order. Ties keep their input order.
    pub fn plan(&self, patterns: &[JoinPattern]) -> Result<Vec<usize>, TickError> {
        self.core.check_join(patterns)?;
        let mut order: Vec<(usize, usize)> = patterns
            .iter()
            .enumerate()
            .map(|(idx, p)| (self.estimate(p), idx))
            .collect();
        order.sort_by_key(|(est, idx)| (*est, *idx));
        Ok(order.into_iter().map(|(_, idx)| idx).collect())
    }

    pub fn join_patterns(
        &self,
        patterns: &[JoinPattern],
        limit: usize,
    ) -> Result<Vec<SubjectId>, TickError> {
        let order = self.plan(patterns)?;
        let reordered: Vec<JoinPattern> = order.into_iter().map(|i| patterns[i]).collect();
        self.core.join_patterns(&reordered, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{pso::PsoLayout, triple_store::TripleStore};

    #[test]
    fn test_plan_puts_selective_patterns_first() {
        let mut st = TripleStore::new(512, 4, 8, PsoLayout::MultiObject);
        for s in 0..400 {
            st.add_triple(s, 1, 1).unwrap();
        }
        for s in [7, 9, 11] {
            st.add_triple(s, 2, 3).unwrap();
        }
        let core = SparqlCore::new(&st);
        let planner = JoinPlanner::new(core);
        let patterns = [
            JoinPattern::subjects_of(1, 1),
            JoinPattern::subjects_with(2),
        ];
        assert_eq!(planner.estimate(&patterns[0]), 400);
        assert_eq!(planner.estimate(&patterns[1]), 3);
        assert_eq!(planner.plan(&patterns).unwrap(), vec![1, 0]);
        assert_eq!(
            planner.join_patterns(&patterns, 10).unwrap(),
            core.join_patterns(&patterns, 10).unwrap()
        );
        assert_eq!(planner.join_patterns(&patterns, 10).unwrap(), vec![7, 9, 11]);
    }
}
