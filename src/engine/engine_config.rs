use bincode::{Decode, Encode};

use crate::{
    errors::TickError,
    ids::PredicateId,
    owl::owl_reasoner::ReasoningConfig,
    store::pso::PsoLayout,
};

/// Dimensions and options of a `KnowledgeEngine`, fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct EngineConfig {
    pub max_subjects: u32,
    pub max_predicates: u32,
    pub max_objects: u32,
    /// Class ids share the node space and appear as `rdf:type` objects.
    pub max_classes: u32,
    pub max_properties: u32,
    pub max_shapes: u32,
    /// Nodes indexed for SHACL validation.
    pub max_nodes: u32,
    pub layout: PsoLayout,
    pub rdf_type: PredicateId,
    pub reasoning: ReasoningConfig,
    /// Eight-lane batches when set, four otherwise.
    pub vectorize: bool,
}

impl EngineConfig {
    /// Engine of `S x P x O`.
    /// * Classes cover the object space, properties the predicate space, nodes the subject space.
    /// * 64 shapes, multi-object PS->O, `rdf:type` is predicate 1.
    pub fn new(max_subjects: u32, max_predicates: u32, max_objects: u32) -> Self {
        Self {
            max_subjects,
            max_predicates,
            max_objects,
            max_classes: max_objects,
            max_properties: max_predicates,
            max_shapes: 64,
            max_nodes: max_subjects,
            layout: PsoLayout::default(),
            rdf_type: 1,
            reasoning: ReasoningConfig::default(),
            vectorize: true,
        }
    }

    pub fn with_classes(mut self, max_classes: u32) -> Self {
        self.max_classes = max_classes;
        self
    }

    pub fn with_properties(mut self, max_properties: u32) -> Self {
        self.max_properties = max_properties;
        self
    }

    pub fn with_shapes(mut self, max_shapes: u32) -> Self {
        self.max_shapes = max_shapes;
        self
    }

    pub fn with_nodes(mut self, max_nodes: u32) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_layout(mut self, layout: PsoLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_rdf_type(mut self, rdf_type: PredicateId) -> Self {
        self.rdf_type = rdf_type;
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningConfig) -> Self {
        self.reasoning = reasoning;
        self
    }

    pub fn with_vectorization(mut self, vectorize: bool) -> Self {
        self.vectorize = vectorize;
        self
    }

    pub fn validate(&self) -> Result<(), TickError> {
        if self.max_subjects == 0 || self.max_predicates == 0 || self.max_objects == 0 {
            return Err(TickError::InvalidConfig(format!(
                "engine dimensions must be non-zero, got {}x{}x{}",
                self.max_subjects, self.max_predicates, self.max_objects
            )));
        }
        if self.rdf_type >= self.max_predicates {
            return Err(TickError::InvalidConfig(format!(
                "rdf:type predicate {} outside 0..{}",
                self.rdf_type, self.max_predicates
            )));
        }
        if self.reasoning.max_iterations == 0 {
            return Err(TickError::InvalidConfig(
                "reasoning.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
