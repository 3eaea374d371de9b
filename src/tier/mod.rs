pub mod certificate;
pub mod compiler_config;
pub mod kernel_codegen;
pub mod kernel_specializer;
pub mod tier_model;
