use std::collections::BTreeMap;

use roaring::RoaringBitmap;

use crate::{
    errors::TickError,
    ids::{ClassId, ObjectId, PredicateId, PropertyId, SubjectId},
    owl::{
        owl_axiom::{Characteristic, axiom_flags},
        owl_core::OwlCore,
    },
    store::triple_store::TripleStore,
};

/// One violated axiom, with the node that witnesses it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    Disjoint { a: ClassId, b: ClassId, node: u32 },
    Irreflexive { prop: PropertyId, node: u32 },
    Asymmetric { prop: PropertyId, s: SubjectId, o: ObjectId },
    Functional { prop: PropertyId, node: SubjectId, objects: usize },
    InverseFunctional { prop: PropertyId, node: ObjectId, subjects: usize },
    Cardinality { class: ClassId, prop: PropertyId, node: SubjectId, count: usize, max: u32 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsistencyReport {
    /// Classes named by a violated class axiom.
    pub inconsistent_classes: RoaringBitmap,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Err(Inconsistent)` when anything was violated.
    pub fn into_result(self) -> Result<Self, TickError> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(TickError::Inconsistent {
                classes: self.inconsistent_classes.len(),
                violations: self.violations.len(),
            })
        }
    }
}

/// Checks instance data against disjointness, property characteristics and cardinality.
/// * Distinct ids are distinct individuals.
/// * Min cardinality is never violated under open-world reading, exact checks its upper bound.
pub struct ConsistencyChecker<'a> {
    store: &'a TripleStore,
    owl: &'a OwlCore,
    rdf_type: PredicateId,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(store: &'a TripleStore, owl: &'a OwlCore, rdf_type: PredicateId) -> Self {
        Self {
            store,
            owl,
            rdf_type,
        }
    }

    pub fn check_consistency(&self) -> Result<ConsistencyReport, TickError> {
        self.owl.require_closures()?;
        let mut report = ConsistencyReport::default();
        self.check_disjoint(&mut report);
        self.check_characteristics(&mut report);
        self.check_cardinality(&mut report);
        if !report.is_consistent() {
            tracing::debug!(
                classes = report.inconsistent_classes.len(),
                violations = report.violations.len(),
                "knowledge base inconsistent"
            );
        }
        Ok(report)
    }

    /// Instances of `class` or any of its subclasses.
    pub fn instances(&self, class: ClassId) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        let closure = self.owl.subclass_closure();
        if class >= self.owl.num_classes() {
            return out;
        }
        for sub in 0..closure.rows() {
            if closure.test(sub, class as usize)
                && let Ok(v) = self.store.matching_subjects(self.rdf_type, sub as u32)
            {
                out.extend(v.iter_ones());
            }
        }
        out
    }

    fn check_disjoint(&self, report: &mut ConsistencyReport) {
        for axiom in self.owl.axioms_of(axiom_flags::DISJOINT_WITH) {
            let (a, b) = (axiom.subject, axiom.object);
            let both = self.instances(a) & self.instances(b);
            if both.is_empty() {
                continue;
            }
            report.inconsistent_classes.insert(a);
            report.inconsistent_classes.insert(b);
            report
                .violations
                .extend(both.iter().map(|node| Violation::Disjoint { a, b, node }));
        }
    }

    fn check_characteristics(&self, report: &mut ConsistencyReport) {
        let st = self.store;
        let props = st.dims().predicates.min(self.owl.num_properties());
        for p in 0..props {
            let has = |c| self.owl.has_characteristic(p, c);
            if has(Characteristic::Irreflexive) {
                for t in st.iter_predicate(p).filter(|t| t.s == t.o) {
                    report.violations.push(Violation::Irreflexive { prop: p, node: t.s });
                }
            }
            if has(Characteristic::Asymmetric) {
                for t in st.iter_predicate(p) {
                    if t.s <= t.o && st.ask(t.o, p, t.s) {
                        report.violations.push(Violation::Asymmetric {
                            prop: p,
                            s: t.s,
                            o: t.o,
                        });
                    }
                }
            }
            if has(Characteristic::Functional) {
                for s in st.pv().row(p as usize).iter_ones() {
                    let objects = st.objects(s, p).len();
                    if objects > 1 {
                        report.violations.push(Violation::Functional {
                            prop: p,
                            node: s,
                            objects,
                        });
                    }
                }
            }
            if has(Characteristic::InverseFunctional) {
                let mut subjects: BTreeMap<ObjectId, usize> = BTreeMap::new();
                for t in st.iter_predicate(p) {
                    *subjects.entry(t.o).or_default() += 1;
                }
                for (node, subjects) in subjects.into_iter().filter(|(_, n)| *n > 1) {
                    report.violations.push(Violation::InverseFunctional {
                        prop: p,
                        node,
                        subjects,
                    });
                }
            }
        }
    }

    fn check_cardinality(&self, report: &mut ConsistencyReport) {
        let restrictions = self
            .owl
            .axioms()
            .iter()
            .filter_map(|a| Some((a, a.cardinality_kind()?.max_bound(a.cardinality)?)));
        for (axiom, max) in restrictions {
            let mut violated = false;
            for node in self.instances(axiom.subject) {
                let count = self.store.objects(node, axiom.predicate).len();
                if count > max as usize {
                    violated = true;
                    report.violations.push(Violation::Cardinality {
                        class: axiom.subject,
                        prop: axiom.predicate,
                        node,
                        count,
                        max,
                    });
                }
            }
            if violated {
                report.inconsistent_classes.insert(axiom.subject);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{owl::owl_axiom::Cardinality, store::pso::PsoLayout};

    const RDF_TYPE: u32 = 0;

    #[test]
    fn test_disjoint_classes() {
        let mut st = TripleStore::new(128, 8, 128, PsoLayout::MultiObject);
        let mut owl = OwlCore::new(64, 8);
        owl.add_disjoint(10, 20).unwrap();
        owl.add_subclass(11, 10).unwrap();
        owl.compute_closures();
        st.add_triple(1, RDF_TYPE, 11).unwrap();
        st.add_triple(2, RDF_TYPE, 20).unwrap();
        let checker = ConsistencyChecker::new(&st, &owl, RDF_TYPE);
        assert!(checker.check_consistency().unwrap().is_consistent());

        st.add_triple(1, RDF_TYPE, 20).unwrap();
        let checker = ConsistencyChecker::new(&st, &owl, RDF_TYPE);
        let report = checker.check_consistency().unwrap();
        assert_eq!(
            report.violations,
            vec![Violation::Disjoint { a: 10, b: 20, node: 1 }]
        );
        assert_eq!(report.inconsistent_classes.iter().collect::<Vec<_>>(), vec![10, 20]);
        assert!(matches!(
            report.into_result(),
            Err(TickError::Inconsistent { classes: 2, violations: 1 })
        ));
    }

    #[test]
    fn test_property_characteristics() {
        let mut st = TripleStore::new(64, 8, 64, PsoLayout::MultiObject);
        let mut owl = OwlCore::new(4, 8);
        owl.set_characteristic(1, Characteristic::Irreflexive).unwrap();
        owl.set_characteristic(2, Characteristic::Asymmetric).unwrap();
        owl.set_functional(3).unwrap();
        owl.set_inverse_functional(4).unwrap();
        st.add_triple(5, 1, 5).unwrap();
        st.add_triple(6, 2, 7).unwrap();
        st.add_triple(7, 2, 6).unwrap();
        st.add_triple(8, 3, 1).unwrap();
        st.add_triple(8, 3, 2).unwrap();
        st.add_triple(9, 4, 30).unwrap();
        st.add_triple(10, 4, 30).unwrap();
        let report = ConsistencyChecker::new(&st, &owl, RDF_TYPE)
            .check_consistency()
            .unwrap();
        assert_eq!(
            report.violations,
            vec![
                Violation::Irreflexive { prop: 1, node: 5 },
                Violation::Asymmetric { prop: 2, s: 6, o: 7 },
                Violation::Functional { prop: 3, node: 8, objects: 2 },
                Violation::InverseFunctional { prop: 4, node: 30, subjects: 2 },
            ]
        );
        assert!(report.inconsistent_classes.is_empty());
    }

    #[test]
    fn test_max_cardinality() {
        let mut st = TripleStore::new(64, 8, 64, PsoLayout::MultiObject);
        let mut owl = OwlCore::new(32, 8);
        owl.add_cardinality(5, 2, Cardinality::Exact, 1).unwrap();
        owl.add_cardinality(5, 3, Cardinality::Min, 4).unwrap();
        owl.compute_closures();
        st.add_triple(1, RDF_TYPE, 5).unwrap();
        st.add_triple(1, 2, 10).unwrap();
        assert!(
            ConsistencyChecker::new(&st, &owl, RDF_TYPE)
                .check_consistency()
                .unwrap()
                .is_consistent()
        );
        st.add_triple(1, 2, 11).unwrap();
        let report = ConsistencyChecker::new(&st, &owl, RDF_TYPE)
            .check_consistency()
            .unwrap();
        assert_eq!(report.violations.len(), 1);
        assert!(report.inconsistent_classes.contains(5));
    }
}
