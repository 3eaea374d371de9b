mod engine;
pub use engine::engine_config::EngineConfig;
pub use engine::engine_snapshot::EngineSnapshot;
pub use engine::knowledge_engine::KnowledgeEngine;

mod errors;
pub use errors::TickError;

mod ids;
pub use ids::{
    ClassId, IdKind, IdSpace, Interner, NodeId, ObjectId, PredicateId, PropertyId, ShapeId,
    SubjectId, Triple, WILDCARD,
};

mod store;
pub use store::{pso, triple_store};
pub use store::triple_store::TripleStore;

mod sparql;
pub use sparql::{sparql_core, sparql_pattern, sparql_planner};
pub use sparql::sparql_core::SparqlCore;
pub use sparql::sparql_pattern::{JoinPattern, Term, TriplePattern};

mod batch;
pub use batch::batch_evaluator;
pub use batch::batch_evaluator::BatchEvaluator;

mod shacl;
pub use shacl::{shacl_core, shacl_pattern, shacl_shape};
pub use shacl::shacl_core::ShaclCore;
pub use shacl::shacl_shape::CompiledShape;

mod owl;
pub use owl::{owl_axiom, owl_consistency, owl_core, owl_reasoner};
pub use owl::owl_core::OwlCore;
pub use owl::owl_reasoner::{OwlReasoner, ReasoningConfig};

mod tier;
pub use tier::{certificate, compiler_config, kernel_codegen, kernel_specializer, tier_model};
pub use tier::certificate::ComplianceCertificate;
pub use tier::compiler_config::CompilerConfig;
pub use tier::kernel_specializer::KernelSpecializer;
pub use tier::tier_model::{ComplianceTier, SchemaProfile};

pub mod kernel;
pub use kernel::AccessKernel;

mod hooks;
pub use hooks::triple_hooks;
pub use hooks::triple_hooks::HookHandle;

mod utils;
pub use utils::{bit_vector, generational_vector};
pub use utils::bit_vector::{BitRow, BitVec};

pub use bincode;
pub use bincode::{Decode, Encode};
