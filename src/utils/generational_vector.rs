/// Slot index plus the generation it was issued under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pub(crate) generation: u32,
    pub(crate) index: u32,
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: u32,
}

/// Slot vector with generational handles.
/// * Freed slots are reused before the vector grows.
/// * A freed slot bumps its generation, so stale handles never reach the new occupant.
#[derive(Debug)]
pub struct SlotVec<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for SlotVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotVec<T> {
    pub fn new() -> Self {
        Self {
            slots: vec![],
            free: vec![],
        }
    }

    pub fn insert(&mut self, value: T) -> SlotHandle {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                SlotHandle {
                    generation: slot.generation,
                    index,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    value: Some(value),
                    generation: 0,
                });
                SlotHandle {
                    generation: 0,
                    index,
                }
            }
        }
    }

    /// `None` when the handle is stale or was never issued.
    pub fn remove(&mut self, handle: SlotHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        slot.value.take()
    }

    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live values in slot order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}
