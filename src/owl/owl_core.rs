use rayon::iter::ParallelIterator;

use crate::{
    errors::TickError,
    ids::{ClassId, IdKind, PropertyId, check_id},
    owl::owl_axiom::{Cardinality, Characteristic, OwlAxiom, axiom_flags},
    utils::{aligned_slab::BitSlab, bit_vector::BitVec},
};

/// Class counts at or above this close their rows on the rayon pool.
pub const PARALLEL_CLOSURE_THRESHOLD: usize = 512;

/// How reasoning treats a property's transitive/symmetric/inverse consequences.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, bincode::Encode, bincode::Decode)]
pub enum PropertyStrategy {
    /// Traversed inside `ask_with_reasoning`, bounded by the configured depth.
    #[default]
    QueryTime,
    /// Written into the store by `materialize_inferences`, paths bounded by the same depth.
    Materialized,
}

/// Summary of one `compute_closures` run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClosureStats {
    pub classes: usize,
    pub properties: usize,
    pub subclass_edges: usize,
    pub subproperty_edges: usize,
    pub parallel: bool,
}

/// Axiom store, characteristic vectors and the two closure matrices.
/// * Closures start reflexive, every row has its own diagonal bit.
/// * Adding an axiom marks closures stale until `compute_closures` runs.
#[derive(Clone, Debug)]
pub struct OwlCore {
    num_classes: u32,
    num_properties: u32,
    axioms: Vec<OwlAxiom>,
    subclass: BitSlab,
    subproperty: BitSlab,
    characteristics: [BitVec; 7],
    inverses: Vec<Vec<PropertyId>>,
    strategies: Vec<PropertyStrategy>,
    closures_valid: bool,
}

impl OwlCore {
    pub fn new(num_classes: u32, num_properties: u32) -> Self {
        let c = num_classes as usize;
        let pp = num_properties as usize;
        let mut subclass = BitSlab::new(c, c);
        let mut subproperty = BitSlab::new(pp, pp);
        for i in 0..c {
            subclass.set(i, i);
        }
        for i in 0..pp {
            subproperty.set(i, i);
        }
        Self {
            num_classes,
            num_properties,
            axioms: vec![],
            subclass,
            subproperty,
            characteristics: std::array::from_fn(|_| BitVec::new(pp)),
            inverses: vec![vec![]; pp],
            strategies: vec![PropertyStrategy::default(); pp],
            closures_valid: true,
        }
    }

    /// Rebuilds the core by replaying axioms.
    pub fn from_axioms(
        num_classes: u32,
        num_properties: u32,
        axioms: &[OwlAxiom],
    ) -> Result<Self, TickError> {
        let mut core = Self::new(num_classes, num_properties);
        for axiom in axioms {
            core.add_axiom(*axiom)?;
        }
        Ok(core)
    }

    pub fn num_classes(&self) -> u32 {
        self.num_classes
    }

    pub fn num_properties(&self) -> u32 {
        self.num_properties
    }

    pub fn axioms(&self) -> &[OwlAxiom] {
        &self.axioms
    }

    pub fn closures_computed(&self) -> bool {
        self.closures_valid
    }

    fn check_class(&self, class: ClassId) -> Result<(), TickError> {
        check_id(IdKind::Class, class, self.num_classes)
    }

    fn check_property(&self, prop: PropertyId) -> Result<(), TickError> {
        check_id(IdKind::Property, prop, self.num_properties)
    }

    /// Validates and stores any axiom.
    /// * Every id is checked before anything is written.
    pub fn add_axiom(&mut self, axiom: OwlAxiom) -> Result<(), TickError> {
        use axiom_flags::*;
        let kind = axiom.flags;
        if kind.count_ones() != 1 || kind > EXACT_CARDINALITY {
            return Err(TickError::InvalidConfig(format!(
                "axiom flags {kind:#x} must name exactly one kind"
            )));
        }
        match kind {
            SUBCLASS_OF | EQUIVALENT_CLASS | DISJOINT_WITH => {
                self.check_class(axiom.subject)?;
                self.check_class(axiom.object)?;
            }
            SUBPROPERTY_OF | INVERSE_OF => {
                self.check_property(axiom.subject)?;
                self.check_property(axiom.object)?;
            }
            DOMAIN | RANGE => {
                self.check_property(axiom.subject)?;
                self.check_class(axiom.object)?;
            }
            SOME_VALUES_FROM | ALL_VALUES_FROM => {
                self.check_class(axiom.subject)?;
                self.check_property(axiom.predicate)?;
                self.check_class(axiom.object)?;
            }
            HAS_VALUE | MIN_CARDINALITY | MAX_CARDINALITY | EXACT_CARDINALITY => {
                self.check_class(axiom.subject)?;
                self.check_property(axiom.predicate)?;
            }
            _ => self.check_property(axiom.subject)?,
        }

        let (s, o) = (axiom.subject as usize, axiom.object as usize);
        match kind {
            SUBCLASS_OF => self.link(true, s, o),
            EQUIVALENT_CLASS => {
                self.link(true, s, o);
                self.link(true, o, s);
            }
            SUBPROPERTY_OF => self.link(false, s, o),
            INVERSE_OF => {
                add_inverse(&mut self.inverses[s], axiom.object);
                add_inverse(&mut self.inverses[o], axiom.subject);
            }
            flag => {
                if let Some(c) = Characteristic::from_flag(flag) {
                    self.characteristics[c.index()].insert(axiom.subject);
                }
            }
        }
        self.axioms.push(axiom);
        Ok(())
    }

    fn link(&mut self, classes: bool, sub: usize, sup: usize) {
        let slab = if classes {
            &mut self.subclass
        } else {
            &mut self.subproperty
        };
        if slab.set(sub, sup) {
            self.closures_valid = false;
        }
    }

    pub fn add_subclass(&mut self, sub: ClassId, sup: ClassId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::subclass_of(sub, sup))
    }

    /// Stored as two sub-class edges.
    pub fn add_equivalent_class(&mut self, a: ClassId, b: ClassId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::equivalent_class(a, b))
    }

    pub fn add_disjoint(&mut self, a: ClassId, b: ClassId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::disjoint_with(a, b))
    }

    pub fn add_subproperty(&mut self, sub: PropertyId, sup: PropertyId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::subproperty_of(sub, sup))
    }

    pub fn add_inverse_of(&mut self, p: PropertyId, q: PropertyId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::inverse_of(p, q))
    }

    pub fn set_characteristic(
        &mut self,
        prop: PropertyId,
        characteristic: Characteristic,
    ) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::characteristic(prop, characteristic))
    }

    pub fn set_transitive(&mut self, prop: PropertyId) -> Result<(), TickError> {
        self.set_characteristic(prop, Characteristic::Transitive)
    }

    pub fn set_symmetric(&mut self, prop: PropertyId) -> Result<(), TickError> {
        self.set_characteristic(prop, Characteristic::Symmetric)
    }

    pub fn set_functional(&mut self, prop: PropertyId) -> Result<(), TickError> {
        self.set_characteristic(prop, Characteristic::Functional)
    }

    pub fn set_inverse_functional(&mut self, prop: PropertyId) -> Result<(), TickError> {
        self.set_characteristic(prop, Characteristic::InverseFunctional)
    }

    pub fn add_domain(&mut self, prop: PropertyId, class: ClassId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::domain(prop, class))
    }

    pub fn add_range(&mut self, prop: PropertyId, class: ClassId) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::range(prop, class))
    }

    pub fn add_has_value(
        &mut self,
        class: ClassId,
        prop: PropertyId,
        value: u32,
    ) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::has_value(class, prop, value))
    }

    pub fn add_some_values_from(
        &mut self,
        class: ClassId,
        prop: PropertyId,
        filler: ClassId,
    ) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::some_values_from(class, prop, filler))
    }

    pub fn add_all_values_from(
        &mut self,
        class: ClassId,
        prop: PropertyId,
        filler: ClassId,
    ) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::all_values_from(class, prop, filler))
    }

    pub fn add_cardinality(
        &mut self,
        class: ClassId,
        prop: PropertyId,
        kind: Cardinality,
        n: u32,
    ) -> Result<(), TickError> {
        self.add_axiom(OwlAxiom::cardinality(class, prop, kind, n))
    }

    /// Record how reasoning handles `prop`.
    pub fn set_strategy(
        &mut self,
        prop: PropertyId,
        strategy: PropertyStrategy,
    ) -> Result<(), TickError> {
        self.check_property(prop)?;
        self.strategies[prop as usize] = strategy;
        Ok(())
    }

    pub fn strategy(&self, prop: PropertyId) -> PropertyStrategy {
        self.strategies
            .get(prop as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Properties whose strategy is not the default.
    pub(crate) fn strategy_overrides(&self) -> Vec<(PropertyId, PropertyStrategy)> {
        self.strategies
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != PropertyStrategy::default())
            .map(|(p, s)| (p as PropertyId, *s))
            .collect()
    }

    #[inline]
    pub fn has_characteristic(&self, prop: PropertyId, characteristic: Characteristic) -> bool {
        self.characteristics[characteristic.index()].contains(prop)
    }

    pub fn characteristic_vector(&self, characteristic: Characteristic) -> &BitVec {
        &self.characteristics[characteristic.index()]
    }

    #[inline]
    pub fn is_transitive(&self, prop: PropertyId) -> bool {
        self.has_characteristic(prop, Characteristic::Transitive)
    }

    #[inline]
    pub fn is_symmetric(&self, prop: PropertyId) -> bool {
        self.has_characteristic(prop, Characteristic::Symmetric)
    }

    #[inline]
    pub fn is_functional(&self, prop: PropertyId) -> bool {
        self.has_characteristic(prop, Characteristic::Functional)
    }

    #[inline]
    pub fn is_inverse_functional(&self, prop: PropertyId) -> bool {
        self.has_characteristic(prop, Characteristic::InverseFunctional)
    }

    /// Every property declared inverse to `prop`, ascending.
    pub fn inverses(&self, prop: PropertyId) -> &[PropertyId] {
        self.inverses.get(prop as usize).map_or(&[], Vec::as_slice)
    }

    pub fn axioms_of(&self, flag: u32) -> impl Iterator<Item = &OwlAxiom> + '_ {
        self.axioms.iter().filter(move |a| a.is(flag))
    }

    /// Bit-parallel Floyd-Warshall over both closure matrices.
    pub fn compute_closures(&mut self) -> ClosureStats {
        let parallel = self.num_classes as usize >= PARALLEL_CLOSURE_THRESHOLD;
        close(&mut self.subclass, parallel);
        close(&mut self.subproperty, false);
        self.closures_valid = true;

        let stats = ClosureStats {
            classes: self.num_classes as usize,
            properties: self.num_properties as usize,
            subclass_edges: popcount_slab(&self.subclass),
            subproperty_edges: popcount_slab(&self.subproperty),
            parallel,
        };
        tracing::info!(
            classes = stats.classes,
            properties = stats.properties,
            subclass_edges = stats.subclass_edges,
            subproperty_edges = stats.subproperty_edges,
            parallel,
            "computed OWL closures"
        );
        stats
    }

    pub(crate) fn require_closures(&self) -> Result<(), TickError> {
        if self.closures_valid {
            Ok(())
        } else {
            Err(TickError::ClosureNotComputed)
        }
    }

    /// Is `sub` a (reflexive, transitive) subclass of `sup`. Out of range answers false.
    #[inline]
    pub fn check_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        sub < self.num_classes
            && sup < self.num_classes
            && self.subclass.test(sub as usize, sup as usize)
    }

    pub fn try_check_subclass(&self, sub: ClassId, sup: ClassId) -> Result<bool, TickError> {
        self.require_closures()?;
        self.check_class(sub)?;
        self.check_class(sup)?;
        Ok(self.check_subclass(sub, sup))
    }

    #[inline]
    pub fn check_subproperty(&self, sub: PropertyId, sup: PropertyId) -> bool {
        sub < self.num_properties
            && sup < self.num_properties
            && self.subproperty.test(sub as usize, sup as usize)
    }

    /// Row `class` of the subclass closure.
    pub fn get_all_superclasses(&self, class: ClassId) -> Result<BitVec, TickError> {
        self.require_closures()?;
        self.check_class(class)?;
        Ok(self.subclass.row(class as usize).to_bit_vec())
    }

    /// Column `class` of the subclass closure.
    pub fn get_all_subclasses(&self, class: ClassId) -> Result<BitVec, TickError> {
        self.require_closures()?;
        self.check_class(class)?;
        Ok(column(&self.subclass, class as usize))
    }

    pub fn get_all_superproperties(&self, prop: PropertyId) -> Result<BitVec, TickError> {
        self.require_closures()?;
        self.check_property(prop)?;
        Ok(self.subproperty.row(prop as usize).to_bit_vec())
    }

    pub fn get_all_subproperties(&self, prop: PropertyId) -> Result<BitVec, TickError> {
        self.require_closures()?;
        self.check_property(prop)?;
        Ok(column(&self.subproperty, prop as usize))
    }

    pub(crate) fn subclass_closure(&self) -> &BitSlab {
        &self.subclass
    }

    pub(crate) fn subproperty_closure(&self) -> &BitSlab {
        &self.subproperty
    }
}

fn add_inverse(list: &mut Vec<PropertyId>, prop: PropertyId) {
    if let Err(at) = list.binary_search(&prop) {
        list.insert(at, prop);
    }
}

/// `for k, for i: if row[i] has k then row[i] |= row[k]`.
fn close(slab: &mut BitSlab, parallel: bool) {
    let n = slab.rows();
    if !parallel {
        for k in 0..n {
            for i in 0..n {
                if slab.test(i, k) {
                    slab.or_row_into(k, i);
                }
            }
        }
        return;
    }
    let stride = slab.stride();
    for k in 0..n {
        let pivot = slab.row_words(k).to_vec();
        let (word, mask) = (k >> 6, 1u64 << (k & 63));
        slab.par_rows_mut().for_each(|row| {
            if row[word] & mask != 0 {
                for (d, s) in row[..stride].iter_mut().zip(&pivot) {
                    *d |= s;
                }
            }
        });
    }
}

fn column(slab: &BitSlab, col: usize) -> BitVec {
    BitVec::from_ids(
        slab.rows(),
        (0..slab.rows())
            .filter(|i| slab.test(*i, col))
            .map(|i| i as u32),
    )
}

fn popcount_slab(slab: &BitSlab) -> usize {
    (0..slab.rows()).map(|r| slab.row(r).cardinality()).sum()
}
