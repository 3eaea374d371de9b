pub mod aligned_slab;
pub mod bit_vector;
pub mod generational_vector;
pub mod prefetch;
