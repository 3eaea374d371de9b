use bincode::{Decode, Encode};

use crate::ids::{ClassId, PropertyId};

/// Axiom kind bits of `OwlAxiom::flags`.
pub mod axiom_flags {
    pub const SUBCLASS_OF: u32 = 1 << 0;
    pub const EQUIVALENT_CLASS: u32 = 1 << 1;
    pub const DISJOINT_WITH: u32 = 1 << 2;
    pub const SUBPROPERTY_OF: u32 = 1 << 3;
    pub const INVERSE_OF: u32 = 1 << 4;
    pub const FUNCTIONAL: u32 = 1 << 5;
    pub const INVERSE_FUNCTIONAL: u32 = 1 << 6;
    pub const TRANSITIVE: u32 = 1 << 7;
    pub const SYMMETRIC: u32 = 1 << 8;
    pub const ASYMMETRIC: u32 = 1 << 9;
    pub const REFLEXIVE: u32 = 1 << 10;
    pub const IRREFLEXIVE: u32 = 1 << 11;
    pub const DOMAIN: u32 = 1 << 12;
    pub const RANGE: u32 = 1 << 13;
    pub const HAS_VALUE: u32 = 1 << 14;
    pub const ALL_VALUES_FROM: u32 = 1 << 15;
    pub const SOME_VALUES_FROM: u32 = 1 << 16;
    pub const MIN_CARDINALITY: u32 = 1 << 17;
    pub const MAX_CARDINALITY: u32 = 1 << 18;
    pub const EXACT_CARDINALITY: u32 = 1 << 19;

    /// Kinds that mark a single property.
    pub const CHARACTERISTICS: u32 = FUNCTIONAL
        | INVERSE_FUNCTIONAL
        | TRANSITIVE
        | SYMMETRIC
        | ASYMMETRIC
        | REFLEXIVE
        | IRREFLEXIVE;

    /// Kinds whose `cardinality` field is meaningful.
    pub const CARDINALITIES: u32 = MIN_CARDINALITY | MAX_CARDINALITY | EXACT_CARDINALITY;
}

/// Property characteristic, one per characteristic vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Characteristic {
    Functional,
    InverseFunctional,
    Transitive,
    Symmetric,
    Asymmetric,
    Reflexive,
    Irreflexive,
}

impl Characteristic {
    pub const ALL: [Characteristic; 7] = [
        Characteristic::Functional,
        Characteristic::InverseFunctional,
        Characteristic::Transitive,
        Characteristic::Symmetric,
        Characteristic::Asymmetric,
        Characteristic::Reflexive,
        Characteristic::Irreflexive,
    ];

    pub fn flag(&self) -> u32 {
        use axiom_flags::*;
        match self {
            Characteristic::Functional => FUNCTIONAL,
            Characteristic::InverseFunctional => INVERSE_FUNCTIONAL,
            Characteristic::Transitive => TRANSITIVE,
            Characteristic::Symmetric => SYMMETRIC,
            Characteristic::Asymmetric => ASYMMETRIC,
            Characteristic::Reflexive => REFLEXIVE,
            Characteristic::Irreflexive => IRREFLEXIVE,
        }
    }

    pub fn from_flag(flag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.flag() == flag)
    }

    pub(crate) fn index(&self) -> usize {
        self.flag().trailing_zeros() as usize - axiom_flags::FUNCTIONAL.trailing_zeros() as usize
    }
}

/// Restriction kinds over a class and a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Min,
    Max,
    Exact,
}

impl Cardinality {
    pub fn flag(&self) -> u32 {
        match self {
            Cardinality::Min => axiom_flags::MIN_CARDINALITY,
            Cardinality::Max => axiom_flags::MAX_CARDINALITY,
            Cardinality::Exact => axiom_flags::EXACT_CARDINALITY,
        }
    }

    /// Upper bound implied by the restriction, if any.
    pub fn max_bound(&self, n: u32) -> Option<u32> {
        match self {
            Cardinality::Min => None,
            Cardinality::Max | Cardinality::Exact => Some(n),
        }
    }
}

/// One stored axiom.
/// * Class axioms: `subject` and `object` are classes, `predicate` is unused.
/// * Property axioms: `subject` (and `object` for sub-property/inverse) are properties.
/// * Domain/range: `subject` is the property, `object` the class.
/// * Restrictions: `subject` is the restricted class, `predicate` the property,
///   `object` the value or filler class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct OwlAxiom {
    pub subject: u32,
    pub predicate: PropertyId,
    pub object: u32,
    pub flags: u32,
    pub cardinality: u32,
}

impl OwlAxiom {
    pub fn subclass_of(sub: ClassId, sup: ClassId) -> Self {
        Self::binary(axiom_flags::SUBCLASS_OF, sub, sup)
    }

    pub fn equivalent_class(a: ClassId, b: ClassId) -> Self {
        Self::binary(axiom_flags::EQUIVALENT_CLASS, a, b)
    }

    pub fn disjoint_with(a: ClassId, b: ClassId) -> Self {
        Self::binary(axiom_flags::DISJOINT_WITH, a, b)
    }

    pub fn subproperty_of(sub: PropertyId, sup: PropertyId) -> Self {
        Self::binary(axiom_flags::SUBPROPERTY_OF, sub, sup)
    }

    pub fn inverse_of(p: PropertyId, q: PropertyId) -> Self {
        Self::binary(axiom_flags::INVERSE_OF, p, q)
    }

    pub fn characteristic(prop: PropertyId, characteristic: Characteristic) -> Self {
        Self::binary(characteristic.flag(), prop, prop)
    }

    pub fn domain(prop: PropertyId, class: ClassId) -> Self {
        Self::binary(axiom_flags::DOMAIN, prop, class)
    }

    pub fn range(prop: PropertyId, class: ClassId) -> Self {
        Self::binary(axiom_flags::RANGE, prop, class)
    }

    pub fn has_value(class: ClassId, prop: PropertyId, value: u32) -> Self {
        Self::restriction(axiom_flags::HAS_VALUE, class, prop, value, 0)
    }

    pub fn some_values_from(class: ClassId, prop: PropertyId, filler: ClassId) -> Self {
        Self::restriction(axiom_flags::SOME_VALUES_FROM, class, prop, filler, 0)
    }

    pub fn all_values_from(class: ClassId, prop: PropertyId, filler: ClassId) -> Self {
        Self::restriction(axiom_flags::ALL_VALUES_FROM, class, prop, filler, 0)
    }

    pub fn cardinality(class: ClassId, prop: PropertyId, kind: Cardinality, n: u32) -> Self {
        Self::restriction(kind.flag(), class, prop, 0, n)
    }

    fn binary(flags: u32, subject: u32, object: u32) -> Self {
        Self {
            subject,
            predicate: 0,
            object,
            flags,
            cardinality: 0,
        }
    }

    fn restriction(flags: u32, class: ClassId, prop: PropertyId, object: u32, n: u32) -> Self {
        Self {
            subject: class,
            predicate: prop,
            object,
            flags,
            cardinality: n,
        }
    }

    #[inline]
    pub fn is(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// The cardinality kind of a cardinality axiom.
    pub fn cardinality_kind(&self) -> Option<Cardinality> {
        if self.is(axiom_flags::EXACT_CARDINALITY) {
            Some(Cardinality::Exact)
        } else if self.is(axiom_flags::MAX_CARDINALITY) {
            Some(Cardinality::Max)
        } else if self.is(axiom_flags::MIN_CARDINALITY) {
            Some(Cardinality::Min)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characteristic_flags_roundtrip() {
        for (i, c) in Characteristic::ALL.into_iter().enumerate() {
            assert_eq!(Characteristic::from_flag(c.flag()), Some(c));
            assert_eq!(c.index(), i);
            assert_ne!(c.flag() & axiom_flags::CHARACTERISTICS, 0);
        }
        assert_eq!(Characteristic::from_flag(axiom_flags::DOMAIN), None);
    }

    #[test]
    fn test_axiom_constructors() {
        let a = OwlAxiom::cardinality(3, 7, Cardinality::Exact, 1);
        assert_eq!((a.subject, a.predicate, a.cardinality), (3, 7, 1));
        assert_eq!(a.cardinality_kind(), Some(Cardinality::Exact));
        assert_eq!(Cardinality::Min.max_bound(2), None);
        assert!(OwlAxiom::subclass_of(1, 2).is(axiom_flags::SUBCLASS_OF));
        assert_eq!(OwlAxiom::domain(4, 9).object, 9);
    }
}
