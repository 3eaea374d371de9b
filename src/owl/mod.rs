pub mod owl_axiom;
pub mod owl_consistency;
pub mod owl_core;
pub mod owl_reasoner;
