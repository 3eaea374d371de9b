use seven_tick::{
    AccessKernel, CompiledShape, ComplianceTier, CompilerConfig, EngineConfig, KernelSpecializer,
    KnowledgeEngine, SchemaProfile, TickError, TriplePattern,
    certificate::ComplianceCertificate,
    kernel::LayoutFamily,
    pso::PsoLayout,
    tier_model::{KernelFootprint, calculate_compliance_tier},
};

const RDF_TYPE: u32 = 1;

#[test]
fn basic_ask() {
    let mut engine = KnowledgeEngine::new(EngineConfig::new(100, 10, 1000)).unwrap();
    engine.add_triple(42, 1, 100).unwrap();
    engine.add_triple(42, 2, 200).unwrap();
    engine.add_triple(99, 1, 100).unwrap();

    assert!(engine.ask(42, 1, 100));
    assert!(!engine.ask(42, 1, 200));
    assert!(engine.ask(99, 1, 100));
    assert!(!engine.ask(99, 2, 200));
}

#[test]
fn basic_ask_rejects_object_outside_dimensions() {
    let mut engine = KnowledgeEngine::new(EngineConfig::new(100, 10, 100)).unwrap();
    assert!(matches!(
        engine.add_triple(42, 2, 200),
        Err(TickError::IdOutOfRange { id: 200, max: 100, .. })
    ));
    assert_eq!(engine.store().triple_count(), 0);
}

#[test]
fn multiple_objects_for_one_pair() {
    let mut engine = KnowledgeEngine::new(EngineConfig::new(1000, 100, 1000)).unwrap();
    for (s, p, o) in [(1, 2, 3), (1, 2, 4), (1, 2, 5), (2, 2, 3)] {
        engine.add_triple(s, p, o).unwrap();
    }
    assert!(engine.ask(1, 2, 3));
    assert!(engine.ask(1, 2, 4));
    assert!(engine.ask(1, 2, 5));
    assert!(engine.ask(2, 2, 3));
    assert!(!engine.ask(1, 2, 6));

    let patterns: Vec<TriplePattern> = [(1, 2, 3), (1, 2, 4), (1, 2, 5), (2, 2, 3), (1, 2, 6)]
        .into_iter()
        .map(TriplePattern::from)
        .collect();
    let mut results = vec![false; patterns.len()];
    engine.ask_batch(&patterns, &mut results).unwrap();
    assert_eq!(results, vec![true, true, true, true, false]);
}

#[test]
fn single_object_layout_refuses_second_object() {
    let config = EngineConfig::new(1000, 100, 1000).with_layout(PsoLayout::SingleObject);
    let mut engine = KnowledgeEngine::new(config).unwrap();
    engine.add_triple(1, 2, 3).unwrap();
    assert!(matches!(
        engine.add_triple(1, 2, 4),
        Err(TickError::LayoutMismatch { .. })
    ));
    assert!(engine.ask(1, 2, 3));
    assert!(!engine.ask(1, 2, 4));
}

#[test]
fn shacl_single_node_validation() {
    let mut engine = KnowledgeEngine::new(EngineConfig::new(1000, 16, 1000).with_shapes(4)).unwrap();
    let shape = CompiledShape::builder()
        .target_class(1)
        .require_property(7)
        .build()
        .unwrap();
    engine.add_shape(0, shape).unwrap();

    engine.add_triple(100, RDF_TYPE, 1).unwrap();
    engine.add_triple(100, 7, 55).unwrap();
    engine.add_triple(200, RDF_TYPE, 1).unwrap();
    engine.add_triple(300, RDF_TYPE, 2).unwrap();

    assert!(engine.validate_node(100, 0));
    assert!(!engine.validate_node(200, 0));
    assert!(engine.validate_node(300, 0));
}

#[test]
fn owl_subclass_reasoning() {
    let mut engine = KnowledgeEngine::new(EngineConfig::new(1000, 16, 1000)).unwrap();
    let (employee, manager) = (100, 101);
    engine.owl_mut().add_subclass(manager, employee).unwrap();
    engine.add_triple(42, RDF_TYPE, manager).unwrap();
    engine.compute_closures();

    assert!(!engine.ask(42, RDF_TYPE, employee));
    assert!(engine.ask_with_reasoning(42, RDF_TYPE, employee).unwrap());
}

#[test]
fn tier_classification() {
    let profile = SchemaProfile::new(200, 10, 50, 1000, 10, 1000).with_index(true);
    let footprint = KernelFootprint::from_profile(&profile);
    // the dense PS->O index alone is 39 KB, so the working set lands in L2
    let tier = calculate_compliance_tier(&footprint);
    assert_eq!(tier, ComplianceTier::L2);

    let cert = ComplianceCertificate::new("l2-bitvector", footprint, tier);
    assert_eq!(cert.guaranteed_latency_ns, 30.0);
    assert!(cert.render().contains("Tier: L2"));

    let small = SchemaProfile::new(32, 8, 4, 256, 8, 256);
    let small_fp = KernelFootprint::from_profile(&small);
    assert_eq!(calculate_compliance_tier(&small_fp), ComplianceTier::L1);
    let cert = ComplianceCertificate::new("l1-direct", small_fp, ComplianceTier::L1);
    assert_eq!(cert.guaranteed_latency_ns, 10.0);
}

#[test]
fn sharded_deployment() {
    let profile = SchemaProfile::new(0, 0, 0, 100_000, 50, 20_000);
    let whole = calculate_compliance_tier(&KernelFootprint::from_profile(&profile));
    assert!(whole > ComplianceTier::L2);

    let specializer = KernelSpecializer::new(CompilerConfig::new(ComplianceTier::L2)).unwrap();
    let plan = specializer.plan(&profile, false).unwrap();
    assert!(plan.is_sharded());
    assert!(plan.shards >= 4);
    assert!(plan.shard_tiers.iter().all(|t| *t == ComplianceTier::L2));
    assert_eq!(plan.tier, ComplianceTier::L2);
}

#[test]
fn sharded_kernel_routes_by_subject() {
    let mut engine = KnowledgeEngine::new(EngineConfig::new(4096, 8, 4096).with_classes(64).with_shapes(4)).unwrap();
    for s in 0..4096 {
        engine.add_triple(s, 2, (s * 7) % 4096).unwrap();
    }
    let config = CompilerConfig::new(ComplianceTier::L1).with_shards(4, 64);
    let compiled = engine.compile_kernel(config).unwrap();
    assert!(compiled.plan.is_sharded());
    assert_eq!(compiled.kernel.layout(), LayoutFamily::Sharded);
    for s in (0..4096).step_by(97) {
        assert!(compiled.kernel.ask_pattern(s, 2, (s * 7) % 4096));
        assert!(!compiled.kernel.ask_pattern(s, 2, (s * 7 + 1) % 4096));
    }
    let artifact = compiled.artifact().render();
    assert!(artifact.starts_with("// layout: sharded-"));
}
