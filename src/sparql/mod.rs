pub mod sparql_core;
pub mod sparql_pattern;
pub mod sparql_planner;
