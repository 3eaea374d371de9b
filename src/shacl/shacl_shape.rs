use bincode::{Decode, Encode};

use crate::{
    errors::TickError,
    ids::{ClassId, PropertyId},
    shacl::shacl_pattern::{PatternDfa, PatternTable},
};

/// Bits of `CompiledShape::constraint_flags`.
pub mod constraint {
    pub const TARGET_CLASS: u32 = 1 << 0;
    pub const PROPERTY: u32 = 1 << 1;
    pub const FORBIDDEN: u32 = 1 << 2;
    pub const DATATYPE: u32 = 1 << 3;
    pub const CARDINALITY: u32 = 1 << 4;
    pub const PATTERN: u32 = 1 << 5;
    pub const LITERAL_SET: u32 = 1 << 6;
    /// Pattern rejects the empty string.
    pub const PATTERN_NON_EMPTY: u32 = 1 << 7;

    /// Constraints evaluated after the target/required fast path.
    pub const OPTIONAL: u32 = DATATYPE | CARDINALITY | PATTERN | LITERAL_SET;
}

/// Fixed-size compiled SHACL shape.
/// * Class masks refer to class chunk `class_chunk` (ids `64 * class_chunk ..`).
/// * Property masks refer to property chunk `property_chunk`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub struct CompiledShape {
    pub target_class_mask: u64,
    pub required_property_mask: u64,
    pub forbidden_property_mask: u64,
    pub datatype_mask: u64,
    pub cardinality_mask: u64,
    pub literal_set_mask: u64,
    pub pattern_dfa: PatternTable,
    pub constraint_flags: u32,
    pub min_count: u32,
    pub max_count: u32,
    pub class_chunk: u32,
    pub property_chunk: u32,
}

impl Default for CompiledShape {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl CompiledShape {
    /// Targets nothing, so every node is vacuously valid.
    pub const EMPTY: CompiledShape = CompiledShape {
        target_class_mask: 0,
        required_property_mask: 0,
        forbidden_property_mask: 0,
        datatype_mask: 0,
        cardinality_mask: 0,
        literal_set_mask: 0,
        pattern_dfa: [0; 256],
        constraint_flags: 0,
        min_count: 0,
        max_count: u32::MAX,
        class_chunk: 0,
        property_chunk: 0,
    };

    pub fn builder() -> ShapeBuilder {
        ShapeBuilder::default()
    }

    #[inline]
    pub fn has(&self, flag: u32) -> bool {
        self.constraint_flags & flag != 0
    }

    pub fn pattern(&self) -> Option<PatternDfa> {
        self.has(constraint::PATTERN).then(|| PatternDfa {
            table: self.pattern_dfa,
            non_empty: self.has(constraint::PATTERN_NON_EMPTY),
        })
    }
}

/// Collects class/property ids and folds them into a `CompiledShape`.
/// * All target classes must share one 64-id chunk, as must all constrained properties.
#[derive(Default)]
pub struct ShapeBuilder {
    target_classes: Vec<ClassId>,
    required: Vec<PropertyId>,
    forbidden: Vec<PropertyId>,
    counted: Vec<PropertyId>,
    datatypes: Vec<u32>,
    literals: Vec<u32>,
    count_range: Option<(u32, u32)>,
    pattern: Option<PatternDfa>,
}

impl ShapeBuilder {
    pub fn target_class(&mut self, class: ClassId) -> &mut Self {
        self.target_classes.push(class);
        self
    }

    pub fn require_property(&mut self, prop: PropertyId) -> &mut Self {
        self.required.push(prop);
        self
    }

    pub fn forbid_property(&mut self, prop: PropertyId) -> &mut Self {
        self.forbidden.push(prop);
        self
    }

    /// Allowed datatype ids, matched mod 64.
    pub fn datatype(&mut self, datatype: u32) -> &mut Self {
        self.datatypes.push(datatype);
        self
    }

    /// Allowed literal value ids, matched mod 64.
    pub fn literal_value(&mut self, value: u32) -> &mut Self {
        self.literals.push(value);
        self
    }

    /// Property count bounds. Counted properties narrow the count to a subset.
    pub fn count_range(&mut self, min: u32, max: u32) -> &mut Self {
        self.count_range = Some((min, max));
        self
    }

    pub fn count_property(&mut self, prop: PropertyId) -> &mut Self {
        self.counted.push(prop);
        self
    }

    pub fn pattern(&mut self, pattern: &str) -> Result<&mut Self, TickError> {
        self.pattern = Some(PatternDfa::compile(pattern)?);
        Ok(self)
    }

    pub fn build(&self) -> Result<CompiledShape, TickError> {
        let mut shape = CompiledShape::EMPTY;

        if !self.target_classes.is_empty() {
            let (chunk, mask) = fold_chunk("target classes", &self.target_classes)?;
            shape.class_chunk = chunk;
            shape.target_class_mask = mask;
            shape.constraint_flags |= constraint::TARGET_CLASS;
        }

        let all_props: Vec<PropertyId> = self
            .required
            .iter()
            .chain(&self.forbidden)
            .chain(&self.counted)
            .copied()
            .collect();
        if !all_props.is_empty() {
            let (chunk, _) = fold_chunk("properties", &all_props)?;
            shape.property_chunk = chunk;
        }
        if !self.required.is_empty() {
            shape.required_property_mask = fold_chunk("properties", &self.required)?.1;
            shape.constraint_flags |= constraint::PROPERTY;
        }
        if !self.forbidden.is_empty() {
            shape.forbidden_property_mask = fold_chunk("properties", &self.forbidden)?.1;
            shape.constraint_flags |= constraint::FORBIDDEN;
        }
        if shape.required_property_mask & shape.forbidden_property_mask != 0 {
            return Err(TickError::InvalidShape(
                "a property is both required and forbidden".into(),
            ));
        }

        if !self.datatypes.is_empty() {
            shape.datatype_mask = self.datatypes.iter().fold(0, |m, d| m | 1u64 << (d & 63));
            shape.constraint_flags |= constraint::DATATYPE;
        }
        if !self.literals.is_empty() {
            shape.literal_set_mask = self.literals.iter().fold(0, |m, v| m | 1u64 << (v & 63));
            shape.constraint_flags |= constraint::LITERAL_SET;
        }
        if let Some((min, max)) = self.count_range {
            if min > max {
                return Err(TickError::InvalidShape(format!(
                    "min count {min} exceeds max count {max}"
                )));
            }
            shape.min_count = min;
            shape.max_count = max;
            if !self.counted.is_empty() {
                shape.cardinality_mask = fold_chunk("properties", &self.counted)?.1;
            }
            shape.constraint_flags |= constraint::CARDINALITY;
        }
        if let Some(dfa) = self.pattern {
            shape.pattern_dfa = dfa.table;
            shape.constraint_flags |= constraint::PATTERN;
            if dfa.non_empty {
                shape.constraint_flags |= constraint::PATTERN_NON_EMPTY;
            }
        }
        Ok(shape)
    }
}

/// Folds ids of a single chunk into `(chunk, mask)`.
fn fold_chunk(what: &str, ids: &[u32]) -> Result<(u32, u64), TickError> {
    let chunk = ids[0] / 64;
    let mut mask = 0u64;
    for id in ids {
        if id / 64 != chunk {
            return Err(TickError::InvalidShape(format!(
                "{what} span more than one 64-id chunk"
            )));
        }
        mask |= 1u64 << (id % 64);
    }
    Ok((chunk, mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_folds_masks() {
        let shape = CompiledShape::builder()
            .target_class(1)
            .require_property(7)
            .forbid_property(9)
            .build()
            .unwrap();
        assert_eq!(shape.target_class_mask, 1 << 1);
        assert_eq!(shape.required_property_mask, 1 << 7);
        assert_eq!(shape.forbidden_property_mask, 1 << 9);
        assert_eq!(
            shape.constraint_flags,
            constraint::TARGET_CLASS | constraint::PROPERTY | constraint::FORBIDDEN
        );
        assert!(shape.pattern().is_none());
    }

    #[test]
    fn test_builder_selects_chunk() {
        let shape = CompiledShape::builder()
            .target_class(130)
            .target_class(131)
            .require_property(65)
            .build()
            .unwrap();
        assert_eq!(shape.class_chunk, 2);
        assert_eq!(shape.target_class_mask, 0b1100);
        assert_eq!(shape.property_chunk, 1);
        assert_eq!(shape.required_property_mask, 0b10);
    }

    #[test]
    fn test_builder_rejects_bad_shapes() {
        assert!(
            CompiledShape::builder()
                .target_class(1)
                .target_class(64)
                .build()
                .is_err()
        );
        assert!(
            CompiledShape::builder()
                .require_property(3)
                .forbid_property(3)
                .build()
                .is_err()
        );
        assert!(CompiledShape::builder().count_range(3, 1).build().is_err());
        assert!(CompiledShape::builder().pattern("[a-").is_err());
    }

    #[test]
    fn test_optional_constraints_set_flags() {
        let shape = CompiledShape::builder()
            .datatype(3)
            .literal_value(70)
            .count_range(1, 2)
            .pattern("[a-z]+")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(shape.datatype_mask, 1 << 3);
        assert_eq!(shape.literal_set_mask, 1 << 6);
        assert_eq!((shape.min_count, shape.max_count), (1, 2));
        assert!(shape.has(constraint::PATTERN_NON_EMPTY));
        assert_eq!(shape.constraint_flags & constraint::OPTIONAL, constraint::OPTIONAL);
        assert!(shape.pattern().unwrap().matches(b"abc"));
    }
}
