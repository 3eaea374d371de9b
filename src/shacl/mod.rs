pub mod shacl_core;
pub mod shacl_pattern;
pub mod shacl_shape;
