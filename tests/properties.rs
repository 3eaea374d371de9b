use std::collections::BTreeSet;

use proptest::prelude::*;
use seven_tick::{
    EngineConfig, JoinPattern, KnowledgeEngine, TickError,
    owl_axiom::{Cardinality, Characteristic},
};

const RDF_TYPE: u32 = 1;

// (kind, a, b, c): class ids are 2..32, property ids 2..8
fn add_axiom(engine: &mut KnowledgeEngine, (kind, a, b, c): (u8, u32, u32, u32)) -> Result<(), TickError> {
    let (class_a, class_b) = (2 + a % 30, 2 + b % 30);
    let (prop_a, prop_b) = (2 + a % 6, 2 + b % 6);
    let owl = engine.owl_mut();
    match kind {
        0 => owl.add_subclass(class_a, class_b),
        1 => owl.add_equivalent_class(class_a, class_b),
        2 => owl.add_disjoint(class_a, class_b),
        3 => owl.add_subproperty(prop_a, prop_b),
        4 | 5 | 6 => owl.add_inverse_of(prop_a, prop_b),
        7 => owl.set_transitive(prop_a),
        8 => owl.set_symmetric(prop_a),
        9 => owl.set_functional(prop_a),
        10 => owl.set_inverse_functional(prop_a),
        11 => owl.set_characteristic(prop_a, Characteristic::Reflexive),
        12 => owl.set_characteristic(prop_a, Characteristic::Asymmetric),
        13 => owl.set_characteristic(prop_a, Characteristic::Irreflexive),
        14 => owl.add_domain(prop_a, class_b),
        15 => owl.add_range(prop_a, class_b),
        16 => owl.add_has_value(class_a, prop_b, c),
        17 => owl.add_some_values_from(class_a, prop_b, 2 + c % 30),
        18 => owl.add_all_values_from(class_a, prop_b, 2 + c % 30),
        _ => {
            let kind = [Cardinality::Min, Cardinality::Max, Cardinality::Exact][(c % 3) as usize];
            owl.add_cardinality(class_a, prop_b, kind, c % 4)
        }
    }
}

proptest! {
    #[test]
    fn asserted_triples_are_answered(
        triples in proptest::collection::vec((1u32..200, 2u32..8, 1u32..150), 1..300),
        lookups in proptest::collection::vec((1u32..200, 2u32..8, 1u32..150), 0..200),
    ) {
        let mut engine = KnowledgeEngine::new(EngineConfig::new(200, 8, 150)).unwrap();
        for (s, p, o) in &triples {
            engine.add_triple(*s, *p, *o).unwrap();
        }
        let asserted: BTreeSet<_> = triples.iter().copied().collect();
        prop_assert_eq!(engine.store().triple_count(), asserted.len());

        for (s, p, o) in &asserted {
            prop_assert!(engine.ask(*s, *p, *o));
        }
        for (s, p, o) in lookups {
            prop_assert_eq!(engine.ask(s, p, o), asserted.contains(&(s, p, o)));
        }
    }

    #[test]
    fn join_of_one_pattern_is_exact(
        triples in proptest::collection::vec((1u32..128, 2u32..5, 1u32..16), 1..200),
        p in 2u32..5,
        o in 1u32..16,
    ) {
        let mut engine = KnowledgeEngine::new(EngineConfig::new(128, 5, 16)).unwrap();
        for (s, tp, to) in &triples {
            engine.add_triple(*s, *tp, *to).unwrap();
        }
        let expected: Vec<u32> = triples
            .iter()
            .filter(|(_, tp, to)| *tp == p && *to == o)
            .map(|(s, _, _)| *s)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let joined = engine
            .join_patterns(&[JoinPattern::subjects_of(p, o)], usize::MAX)
            .unwrap();
        prop_assert_eq!(joined, expected);
    }

    #[test]
    fn reasoning_only_adds_answers(
        edges in proptest::collection::vec((2u32..32, 2u32..32), 0..40),
        types in proptest::collection::vec((1u32..64, 2u32..32), 1..60),
    ) {
        let mut engine = KnowledgeEngine::new(EngineConfig::new(64, 4, 32)).unwrap();
        for (sub, sup) in edges {
            engine.owl_mut().add_subclass(sub, sup).unwrap();
        }
        for (s, class) in &types {
            engine.add_triple(*s, RDF_TYPE, *class).unwrap();
        }
        engine.compute_closures();

        for (s, class) in types {
            prop_assert!(engine.ask_with_reasoning(s, RDF_TYPE, class).unwrap());
            let supers: Vec<u32> = (2..32)
                .filter(|sup| engine.owl().check_subclass(class, *sup))
                .collect();
            for sup in supers {
                prop_assert!(engine.ask_with_reasoning(s, RDF_TYPE, sup).unwrap());
            }
        }
    }

    #[test]
    fn answers_survive_added_axioms(
        edges in proptest::collection::vec((1u32..32, 2u32..8, 1u32..32), 1..60),
        types in proptest::collection::vec((1u32..32, 2u32..32), 0..30),
        queries in proptest::collection::vec((1u32..32, 1u32..8, 1u32..32), 0..120),
        axioms in proptest::collection::vec((0u8..20, 0u32..64, 0u32..64, 0u32..64), 1..40),
    ) {
        let mut engine = KnowledgeEngine::new(EngineConfig::new(32, 8, 32)).unwrap();
        for (s, p, o) in &edges {
            engine.add_triple(*s, *p, *o).unwrap();
        }
        for (s, class) in &types {
            engine.add_triple(*s, RDF_TYPE, *class).unwrap();
        }
        let queries: Vec<(u32, u32, u32)> = edges
            .iter()
            .copied()
            .chain(types.iter().map(|(s, class)| (*s, RDF_TYPE, *class)))
            .chain(queries)
            .collect();

        let mut held: Vec<bool> = queries
            .iter()
            .map(|(s, p, o)| engine.ask_with_reasoning(*s, *p, *o).unwrap())
            .collect();
        for axiom in axioms {
            add_axiom(&mut engine, axiom).unwrap();
            for ((s, p, o), before) in queries.iter().zip(held.iter_mut()) {
                let now = engine.ask_with_reasoning(*s, *p, *o).unwrap();
                prop_assert!(now || !*before, "({}, {}, {}) lost after {:?}", s, p, o, axiom);
                *before = now;
            }
        }
    }
}
