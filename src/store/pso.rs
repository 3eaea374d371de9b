use std::fmt;

use bincode::{Decode, Encode};

use crate::{errors::TickError, ids::ObjectId};

/// Physical form of the (predicate, subject) -> object map, fixed at engine creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Encode, Decode)]
pub enum PsoLayout {
    /// One object per cell, a second distinct object is a `LayoutMismatch`.
    SingleObject,
    /// Cells hold one object inline or a handle to a sorted list.
    #[default]
    MultiObject,
}

impl PsoLayout {
    pub fn name(&self) -> &'static str {
        match self {
            PsoLayout::SingleObject => "single-object",
            PsoLayout::MultiObject => "multi-object",
        }
    }
}

impl fmt::Display for PsoLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Index of a list inside the `ObjectListArena`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct ListHandle(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Encode, Decode)]
pub enum PsoCell {
    #[default]
    Empty,
    Single(ObjectId),
    Many(ListHandle),
}

/// Owns every multi-object list, lists are kept sorted and deduplicated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ObjectListArena {
    lists: Vec<Vec<ObjectId>>,
}

impl ObjectListArena {
    fn alloc(&mut self, objects: Vec<ObjectId>) -> ListHandle {
        let handle = ListHandle(self.lists.len() as u32);
        self.lists.push(objects);
        handle
    }

    #[inline]
    pub fn get(&self, handle: ListHandle) -> &[ObjectId] {
        &self.lists[handle.0 as usize]
    }

    /// Inserts in order, returns true if the object was new.
    fn insert(&mut self, handle: ListHandle, object: ObjectId) -> bool {
        let list = &mut self.lists[handle.0 as usize];
        match list.binary_search(&object) {
            Ok(_) => false,
            Err(pos) => {
                list.insert(pos, object);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    fn footprint_bytes(&self) -> usize {
        self.lists
            .iter()
            .map(|l| l.capacity() * size_of::<ObjectId>())
            .sum()
    }
}

/// The PS->O map, `predicates * subjects` cells indexed by `p * S + s`.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub enum PsoMap {
    /// Cell validity comes from the predicate slab bit.
    Single { objects: Vec<ObjectId> },
    Multi {
        cells: Vec<PsoCell>,
        arena: ObjectListArena,
    },
}

impl PsoMap {
    pub fn new(layout: PsoLayout, cells: usize) -> Self {
        match layout {
            PsoLayout::SingleObject => PsoMap::Single {
                objects: vec![0; cells],
            },
            PsoLayout::MultiObject => PsoMap::Multi {
                cells: vec![PsoCell::Empty; cells],
                arena: ObjectListArena::default(),
            },
        }
    }

    pub fn cell_count(&self) -> usize {
        match self {
            PsoMap::Single { objects } => objects.len(),
            PsoMap::Multi { cells, .. } => cells.len(),
        }
    }

    pub fn layout(&self) -> PsoLayout {
        match self {
            PsoMap::Single { .. } => PsoLayout::SingleObject,
            PsoMap::Multi { .. } => PsoLayout::MultiObject,
        }
    }

    /// Decide whether inserting `object` would change the cell, without touching it.
    /// * `present` is the predicate slab bit for the cell.
    pub fn check_insert(
        &self,
        idx: usize,
        present: bool,
        object: ObjectId,
    ) -> Result<bool, TickError> {
        match self {
            PsoMap::Single { objects } => {
                if !present {
                    Ok(true)
                } else if objects[idx] == object {
                    Ok(false)
                } else {
                    Err(TickError::LayoutMismatch {
                        layout: PsoLayout::SingleObject.name(),
                        operation: "a second object for one (predicate, subject) pair",
                    })
                }
            }
            PsoMap::Multi { cells, arena } => Ok(match cells[idx] {
                PsoCell::Empty => true,
                PsoCell::Single(existing) => existing != object,
                PsoCell::Many(handle) => arena.get(handle).binary_search(&object).is_err(),
            }),
        }
    }

    /// Stores the object, caller has already run `check_insert`.
    pub fn insert(&mut self, idx: usize, object: ObjectId) -> bool {
        match self {
            PsoMap::Single { objects } => {
                objects[idx] = object;
                true
            }
            PsoMap::Multi { cells, arena } => match cells[idx] {
                PsoCell::Empty => {
                    cells[idx] = PsoCell::Single(object);
                    true
                }
                PsoCell::Single(existing) if existing == object => false,
                PsoCell::Single(existing) => {
                    let mut list = vec![existing, object];
                    list.sort_unstable();
                    cells[idx] = PsoCell::Many(arena.alloc(list));
                    true
                }
                PsoCell::Many(handle) => arena.insert(handle, object),
            },
        }
    }

    /// Does the cell hold `object`. Single form trusts the caller's presence test.
    #[inline]
    pub fn contains(&self, idx: usize, object: ObjectId) -> bool {
        match self {
            PsoMap::Single { objects } => objects[idx] == object,
            PsoMap::Multi { cells, arena } => match cells[idx] {
                PsoCell::Empty => false,
                PsoCell::Single(existing) => existing == object,
                PsoCell::Many(handle) => arena.get(handle).contains(&object),
            },
        }
    }

    /// Objects of a cell in ascending order.
    pub fn objects(&self, idx: usize, present: bool) -> &[ObjectId] {
        if !present {
            return &[];
        }
        match self {
            PsoMap::Single { objects } => std::slice::from_ref(&objects[idx]),
            PsoMap::Multi { cells, arena } => match &cells[idx] {
                PsoCell::Empty => &[],
                PsoCell::Single(object) => std::slice::from_ref(object),
                PsoCell::Many(handle) => arena.get(*handle),
            },
        }
    }

    /// Number of cells holding more than one object.
    pub fn multi_object_cells(&self) -> usize {
        match self {
            PsoMap::Single { .. } => 0,
            PsoMap::Multi { arena, .. } => arena.len(),
        }
    }

    pub fn footprint_bytes(&self) -> usize {
        match self {
            PsoMap::Single { objects } => objects.len() * size_of::<ObjectId>(),
            PsoMap::Multi { cells, arena } => {
                cells.len() * size_of::<PsoCell>() + arena.footprint_bytes()
            }
        }
    }
}
