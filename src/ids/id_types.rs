use std::fmt;

use bincode::{Decode, Encode};

use crate::errors::TickError;

pub type SubjectId = u32;
pub type PredicateId = u32;
pub type ObjectId = u32;
pub type ClassId = u32;
pub type PropertyId = u32;
pub type ShapeId = u32;
pub type NodeId = u32;

/// Pattern sentinel meaning "any". A legal data id outside of patterns.
pub const WILDCARD: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub enum IdKind {
    Subject,
    Predicate,
    Object,
    Class,
    Property,
    Shape,
    Node,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdKind::Subject => "subject",
            IdKind::Predicate => "predicate",
            IdKind::Object => "object",
            IdKind::Class => "class",
            IdKind::Property => "property",
            IdKind::Shape => "shape",
            IdKind::Node => "node",
        };
        f.write_str(name)
    }
}

/// Errors with `IdOutOfRange` unless `id < max`.
#[inline]
pub(crate) fn check_id(kind: IdKind, id: u32, max: u32) -> Result<(), TickError> {
    if id < max {
        Ok(())
    } else {
        Err(TickError::IdOutOfRange { kind, id, max })
    }
}

/// A concrete asserted fact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode)]
pub struct Triple {
    pub s: SubjectId,
    pub p: PredicateId,
    pub o: ObjectId,
}

impl Triple {
    pub fn new(s: SubjectId, p: PredicateId, o: ObjectId) -> Self {
        Self { s, p, o }
    }
}

impl From<(u32, u32, u32)> for Triple {
    fn from((s, p, o): (u32, u32, u32)) -> Self {
        Self { s, p, o }
    }
}
