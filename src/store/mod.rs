pub mod pso;
pub mod triple_store;
