use bincode::{Decode, Encode};

use crate::ids::{ObjectId, PredicateId, SubjectId, WILDCARD};

/// Triple pattern, any field may be the wildcard `0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Encode, Decode)]
pub struct TriplePattern {
    pub s: SubjectId,
    pub p: PredicateId,
    pub o: ObjectId,
}

impl TriplePattern {
    pub fn new(s: SubjectId, p: PredicateId, o: ObjectId) -> Self {
        Self { s, p, o }
    }

    pub fn is_concrete(&self) -> bool {
        self.s != WILDCARD && self.p != WILDCARD && self.o != WILDCARD
    }
}

impl From<(u32, u32, u32)> for TriplePattern {
    fn from((s, p, o): (u32, u32, u32)) -> Self {
        Self { s, p, o }
    }
}

/// Position of a join pattern: bound to an id, or a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub enum Term {
    Bound(u32),
    Var,
}

impl Term {
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var)
    }
}

/// Pattern joined on its subject position.
/// * At most 2 of the 3 positions may be variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct JoinPattern {
    pub s: Term,
    pub p: Term,
    pub o: Term,
}

impl JoinPattern {
    /// `?s p o`
    pub fn subjects_of(p: PredicateId, o: ObjectId) -> Self {
        Self {
            s: Term::Var,
            p: Term::Bound(p),
            o: Term::Bound(o),
        }
    }

    /// `?s p ?o`
    pub fn subjects_with(p: PredicateId) -> Self {
        Self {
            s: Term::Var,
            p: Term::Bound(p),
            o: Term::Var,
        }
    }

    /// `?s ?p o`
    pub fn subjects_linked_to(o: ObjectId) -> Self {
        Self {
            s: Term::Var,
            p: Term::Var,
            o: Term::Bound(o),
        }
    }

    pub fn var_count(&self) -> usize {
        [self.s, self.p, self.o].iter().filter(|t| t.is_var()).count()
    }
}

/// Largest pattern array accepted by a single join.
pub const MAX_JOIN_PATTERNS: usize = 8;
