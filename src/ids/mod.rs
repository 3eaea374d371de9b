pub mod id_types;
pub mod interner;

pub use id_types::*;
pub use interner::{IdSpace, Interner};
