pub mod engine_config;
pub mod engine_snapshot;
pub mod knowledge_engine;
