use std::io;

use bincode::error::{DecodeError, EncodeError};
use thiserror::Error;

use crate::{ids::IdKind, tier::tier_model::ComplianceTier};

#[derive(Error, Debug)]
pub enum TickError {
    #[error("{kind} id {id} out of range (max {max})")]
    IdOutOfRange { kind: IdKind, id: u32, max: u32 },
    #[error(
        "Footprint of {required_kb:.1} KB exceeds the {tier} cap of {cap_kb:.1} KB (largest slab: {largest_slab})"
    )]
    TierBudgetExceeded {
        tier: ComplianceTier,
        required_kb: f64,
        cap_kb: f64,
        largest_slab: &'static str,
    },
    #[error("Layout {layout} does not support {operation}")]
    LayoutMismatch {
        layout: &'static str,
        operation: &'static str,
    },
    #[error("Closures must be computed before reasoning queries")]
    ClosureNotComputed,
    #[error("Knowledge base inconsistent: {classes} class(es), {violations} violation(s)")]
    Inconsistent { classes: u64, violations: usize },
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid shape: {0}")]
    InvalidShape(String),
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Serialization error: {0}")]
    EncodeError(#[from] EncodeError),
    #[error("Error decoding data")]
    DecodeError(#[from] DecodeError),
    #[error("IO error: {0}")]
    IOError(#[from] io::Error),
}
