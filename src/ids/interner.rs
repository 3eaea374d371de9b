use std::collections::HashMap;

use rapidhash::v3::rapidhash_v3;

/// Append-only name to id mapping.
/// * Ids are dense and start at 1, id 0 is the pattern wildcard.
/// * Ids are never renumbered.
/// * Names hash into buckets, collisions resolve by exact string equality.
#[derive(Debug, Clone)]
pub struct Interner {
    names: Vec<Box<str>>,
    buckets: HashMap<u64, Vec<u32>>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        Self {
            names: vec!["".into()], // slot 0 is the wildcard
            buckets: HashMap::new(),
        }
    }

    /// Rebuilds an interner from names in id order (id 1 first).
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut interner = Self::new();
        for name in names {
            interner.intern(name.as_ref());
        }
        interner
    }

    /// Return the id for the name, assigning the next id if it is new.
    pub fn intern(&mut self, name: &str) -> u32 {
        let hash = rapidhash_v3(name.as_bytes());
        if let Some(id) = self.find(hash, name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.into());
        self.buckets.entry(hash).or_default().push(id);
        id
    }

    /// Look up a name without assigning.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.find(rapidhash_v3(name.as_bytes()), name)
    }

    /// Get the name for an id.
    pub fn resolve(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.names.get(id as usize).map(|n| n.as_ref())
    }

    /// Number of interned names (the wildcard slot is not counted).
    pub fn count(&self) -> usize {
        self.names.len() - 1
    }

    /// Names in id order, starting at id 1.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().skip(1).map(|n| n.as_ref())
    }

    fn find(&self, hash: u64, name: &str) -> Option<u32> {
        self.buckets
            .get(&hash)?
            .iter()
            .copied()
            .find(|id| &*self.names[*id as usize] == name)
    }
}

/// The engine's id tables.
/// * `nodes` covers subjects, objects and classes, so a class id can be the object of an `rdf:type` triple.
/// * `predicates` covers predicates and OWL properties.
/// * `shapes` covers SHACL shapes.
#[derive(Debug, Clone, Default)]
pub struct IdSpace {
    pub nodes: Interner,
    pub predicates: Interner,
    pub shapes: Interner,
}

impl IdSpace {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_dense_and_stable() {
        let mut i = Interner::new();
        assert_eq!(i.count(), 0);
        let a = i.intern("ex:alice");
        let b = i.intern("ex:bob");
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(i.intern("ex:alice"), a);
        assert_eq!(i.count(), 2);
        assert_eq!(i.resolve(b), Some("ex:bob"));
        assert_eq!(i.resolve(0), None);
        assert_eq!(i.resolve(3), None);
        assert_eq!(i.lookup("ex:carol"), None);
    }

    #[test]
    fn test_from_names_preserves_ids() {
        let mut i = Interner::new();
        for n in ["a", "b", "c"] {
            i.intern(n);
        }
        let rebuilt = Interner::from_names(i.names());
        assert_eq!(rebuilt.lookup("c"), Some(3));
        assert_eq!(rebuilt.count(), 3);
    }
}
